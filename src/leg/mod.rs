// Hexapod legs
//
// A leg combines a kinematics solver with the three joints that drive it
// (shoulder, main, foot) and maps kinematic angles into servo angle space.

pub mod kinematics;

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use kinematics::{JointAngles, Kinematics, KinematicsError, Position};

/// Mounting position of a leg on the body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegPosition {
    LeftFront,
    LeftMiddle,
    LeftBack,
    RightFront,
    RightMiddle,
    RightBack,
}

impl LegPosition {
    pub const ALL: [LegPosition; 6] = [
        LegPosition::LeftFront,
        LegPosition::LeftMiddle,
        LegPosition::LeftBack,
        LegPosition::RightFront,
        LegPosition::RightMiddle,
        LegPosition::RightBack,
    ];

    pub const RIGHT: [LegPosition; 3] = [
        LegPosition::RightFront,
        LegPosition::RightMiddle,
        LegPosition::RightBack,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Two letter code used in joint names, eg. "rf"
    pub fn code(self) -> &'static str {
        match self {
            LegPosition::LeftFront => "lf",
            LegPosition::LeftMiddle => "lm",
            LegPosition::LeftBack => "lb",
            LegPosition::RightFront => "rf",
            LegPosition::RightMiddle => "rm",
            LegPosition::RightBack => "rb",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|pos| pos.code() == code)
    }
}

/// The three joints of a leg, from body to foot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Shoulder,
    Main,
    Foot,
}

impl Joint {
    pub const ALL: [Joint; 3] = [Joint::Shoulder, Joint::Main, Joint::Foot];

    pub fn code(self) -> char {
        match self {
            Joint::Shoulder => 's',
            Joint::Main => 'm',
            Joint::Foot => 'f',
        }
    }
}

/// Identifies one joint of one leg, displayed as eg. "rfs" (right front shoulder)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointId {
    pub leg: LegPosition,
    pub joint: Joint,
}

impl JointId {
    pub fn new(leg: LegPosition, joint: Joint) -> Self {
        Self { leg, joint }
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.leg.code(), self.joint.code())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("Invalid joint name: {0:?}")]
pub struct ParseJointIdError(String);

impl FromStr for JointId {
    type Err = ParseJointIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseJointIdError(s.to_string());
        if s.len() != 3 || !s.is_ascii() {
            return Err(err());
        }

        let leg = LegPosition::from_code(&s[..2]).ok_or_else(err)?;
        let joint = Joint::ALL
            .into_iter()
            .find(|j| s[2..].starts_with(j.code()))
            .ok_or_else(err)?;
        Ok(Self { leg, joint })
    }
}

/// Direction a servo turns relative to the kinematic angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Direct,
    Inverted,
}

impl Orientation {
    fn sign(self) -> f64 {
        match self {
            Orientation::Direct => 1.0,
            Orientation::Inverted => -1.0,
        }
    }
}

/// servo = offset ± angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearMapping {
    pub offset: f64,
    pub orientation: Orientation,
}

impl LinearMapping {
    pub fn apply(&self, angle: f64) -> f64 {
        self.offset + self.orientation.sign() * angle
    }
}

/// servo = offset ± (angle + bias [+ fold when angle < fold_below])
///
/// The fold keeps the foot servo continuous when the foot swings past the
/// horn's mounting angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldedMapping {
    pub offset: f64,
    pub orientation: Orientation,
    pub bias: f64,
    pub fold_below: f64,
    pub fold: f64,
}

impl FoldedMapping {
    pub fn apply(&self, angle: f64) -> f64 {
        let folded = if angle < self.fold_below {
            angle + self.bias + self.fold
        } else {
            angle + self.bias
        };
        self.offset + self.orientation.sign() * folded
    }
}

/// Mechanical mapping from kinematic angles to servo angles for one leg
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointMapping {
    /// Driven by t2
    pub shoulder: LinearMapping,
    /// Driven by t3
    pub main: LinearMapping,
    /// Driven by t1
    pub foot: FoldedMapping,
}

impl Default for JointMapping {
    fn default() -> Self {
        Self {
            shoulder: LinearMapping {
                offset: 10.0,
                orientation: Orientation::Inverted,
            },
            main: LinearMapping {
                offset: 90.0,
                orientation: Orientation::Inverted,
            },
            foot: FoldedMapping {
                offset: 180.0,
                orientation: Orientation::Inverted,
                bias: 45.0,
                fold_below: -45.0,
                fold: 180.0,
            },
        }
    }
}

impl JointMapping {
    pub fn apply(&self, angles: JointAngles) -> ServoAngles {
        ServoAngles {
            shoulder: self.shoulder.apply(angles.t2),
            main: self.main.apply(angles.t3),
            foot: self.foot.apply(angles.t1),
        }
    }
}

/// Target angles in servo space (degrees, expected within 0..=180)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServoAngles {
    pub shoulder: f64,
    pub main: f64,
    pub foot: f64,
}

impl ServoAngles {
    pub fn get(&self, joint: Joint) -> f64 {
        match joint {
            Joint::Shoulder => self.shoulder,
            Joint::Main => self.main,
            Joint::Foot => self.foot,
        }
    }
}

/// One leg: kinematics plus servo mapping
#[derive(Debug, Clone)]
pub struct Leg {
    position: LegPosition,
    kinematics: Kinematics,
    mapping: JointMapping,
}

impl Leg {
    pub fn new(position: LegPosition, l1: f64, l2: f64, mapping: JointMapping) -> Self {
        Self {
            position,
            kinematics: Kinematics::new(l1, l2),
            mapping,
        }
    }

    pub fn position(&self) -> LegPosition {
        self.position
    }

    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    /// Chain entry id of one of this leg's joints
    pub fn joint(&self, joint: Joint) -> JointId {
        JointId::new(self.position, joint)
    }

    /// Solve for a foot position and return the servo angles that reach it
    ///
    /// Servo angles are not clamped; callers keep their targets inside the
    /// range the servos accept.
    pub fn move_leg(&mut self, x: f64, y: f64, z: f64) -> Result<ServoAngles, KinematicsError> {
        let angles = self.kinematics.move_to_position(x, y, z)?;
        Ok(self.mapping.apply(angles))
    }
}

/// All six legs, indexed by mounting position
#[derive(Debug, Clone)]
pub struct Legs([Leg; 6]);

impl Legs {
    /// Build each leg from its position
    pub fn from_fn(mut build: impl FnMut(LegPosition) -> Leg) -> Self {
        Self(std::array::from_fn(|i| {
            let position = LegPosition::ALL[i];
            let mut leg = build(position);
            leg.position = position;
            leg
        }))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Leg> {
        self.0.iter()
    }
}

impl Index<LegPosition> for Legs {
    type Output = Leg;

    fn index(&self, position: LegPosition) -> &Leg {
        &self.0[position.index()]
    }
}

impl IndexMut<LegPosition> for Legs {
    fn index_mut(&mut self, position: LegPosition) -> &mut Leg {
        &mut self.0[position.index()]
    }
}
