// Gait library
//
// Every gait is a stateless choreography over the legs and the chain. A gait
// is picked by (action, posture), eg. ("move", "walk") -> MoveWalk, and returns
// whether it should be run again (cyclic gaits under a non-zero speed).

pub mod phase;
mod posture;
mod tripod;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chain::ChainError;
use crate::leg::{Joint, KinematicsError, LegPosition};
use crate::sequencer::Rig;

pub use phase::{JointTimings, LegMove, Phase, SolvedPhase, Timing};
pub use posture::{sit_phases, stance_phases};
pub use tripod::tripod_phases;

#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("{leg:?} cannot reach its target: {source}")]
    Reach {
        leg: LegPosition,
        #[source]
        source: KinematicsError,
    },

    #[error("{leg:?} {joint:?} servo would need {angle:.2}, outside 0-180")]
    ServoRange { leg: LegPosition, joint: Joint, angle: f64 },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Speed references from the operator, conventionally within -15..=15
///
/// With the stock gait constants every walk, crab and run target is reachable
/// while both |x| and |y| stay within `STOCK_SPEED_LIMIT`. Past that a pass may
/// be refused before it moves (eg. run at x = 6 overreaches the middle leg, and
/// x <= -7 swings the front and back feet behind their mounts).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveParams {
    pub x: f64,
    pub y: f64,
}

/// Largest speed magnitude every stock gait can perform
pub const STOCK_SPEED_LIMIT: f64 = 5.0;

impl MoveParams {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Posture,
    Move,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Posture {
    Sit,
    Walk,
    Crab,
    Run,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceName {
    Stop,
    PostureSit,
    PostureWalk,
    PostureCrab,
    PostureRun,
    MoveWalk,
    MoveCrab,
    MoveRun,
}

/// "wALK" -> "Walk"
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match capitalize(s).as_str() {
            "Posture" => Ok(Action::Posture),
            "Move" => Ok(Action::Move),
            "Stop" => Ok(Action::Stop),
            _ => Err(()),
        }
    }
}

impl FromStr for Posture {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match capitalize(s).as_str() {
            "Sit" => Ok(Posture::Sit),
            "Walk" => Ok(Posture::Walk),
            "Crab" => Ok(Posture::Crab),
            "Run" => Ok(Posture::Run),
            _ => Err(()),
        }
    }
}

impl SequenceName {
    pub const ALL: [SequenceName; 8] = [
        SequenceName::Stop,
        SequenceName::PostureSit,
        SequenceName::PostureWalk,
        SequenceName::PostureCrab,
        SequenceName::PostureRun,
        SequenceName::MoveWalk,
        SequenceName::MoveCrab,
        SequenceName::MoveRun,
    ];

    pub fn from_parts(action: Action, posture: Option<Posture>) -> Option<Self> {
        match (action, posture) {
            (Action::Stop, None) => Some(SequenceName::Stop),
            (Action::Posture, Some(Posture::Sit)) => Some(SequenceName::PostureSit),
            (Action::Posture, Some(Posture::Walk)) => Some(SequenceName::PostureWalk),
            (Action::Posture, Some(Posture::Crab)) => Some(SequenceName::PostureCrab),
            (Action::Posture, Some(Posture::Run)) => Some(SequenceName::PostureRun),
            (Action::Move, Some(Posture::Walk)) => Some(SequenceName::MoveWalk),
            (Action::Move, Some(Posture::Crab)) => Some(SequenceName::MoveCrab),
            (Action::Move, Some(Posture::Run)) => Some(SequenceName::MoveRun),
            (Action::Move, Some(Posture::Sit)) | (Action::Move | Action::Posture, None) | (Action::Stop, Some(_)) => None,
        }
    }

    /// Resolve loosely cased parts, eg. ("MOVE", "walk"). An empty posture means none.
    pub fn resolve(action: &str, posture: &str) -> Option<Self> {
        let action = action.parse().ok()?;
        let posture = if posture.is_empty() {
            None
        } else {
            Some(posture.parse().ok()?)
        };
        Self::from_parts(action, posture)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SequenceName::Stop => "Stop",
            SequenceName::PostureSit => "PostureSit",
            SequenceName::PostureWalk => "PostureWalk",
            SequenceName::PostureCrab => "PostureCrab",
            SequenceName::PostureRun => "PostureRun",
            SequenceName::MoveWalk => "MoveWalk",
            SequenceName::MoveCrab => "MoveCrab",
            SequenceName::MoveRun => "MoveRun",
        }
    }

    /// Phases for one pass of this gait; empty when there is nothing to do
    pub fn phases(self, gaits: &GaitConfig, params: MoveParams) -> Vec<Phase> {
        match self {
            SequenceName::Stop => Vec::new(),
            SequenceName::PostureSit => sit_phases(&gaits.sit),
            SequenceName::PostureWalk => stance_phases(&gaits.walk),
            SequenceName::PostureCrab => stance_phases(&gaits.crab),
            SequenceName::PostureRun => stance_phases(&gaits.run),
            SequenceName::MoveWalk => tripod_phases(&gaits.walk, &gaits.speed, params),
            SequenceName::MoveCrab => tripod_phases(&gaits.crab, &gaits.speed, params),
            SequenceName::MoveRun => tripod_phases(&gaits.run, &gaits.speed, params),
        }
    }

    /// Whether a completed pass should be followed by another one
    pub fn repeats(self, params: MoveParams) -> bool {
        match self {
            SequenceName::MoveWalk | SequenceName::MoveCrab | SequenceName::MoveRun => !params.is_zero(),
            _ => false,
        }
    }

    /// Perform one pass and return the repeat signal
    pub fn run(self, rig: &mut Rig, params: MoveParams) -> Result<bool, SequenceError> {
        let phases = self.phases(&rig.gaits, params);
        phase::perform_all(&phases, &mut rig.legs, &mut rig.chain)?;
        Ok(self.repeats(params))
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SequenceName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        Self::ALL.into_iter().find(|name| name.as_str() == s).ok_or(())
    }
}

/// Stride scaling shared by the moving gaits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedScaling {
    /// Forward travel per unit of x speed
    pub stride: f64,
    /// Lateral offset applied as soon as y speed is non-zero
    pub lateral_base: f64,
    /// Lateral travel per unit of y speed
    pub lateral_gain: f64,
}

impl Default for SpeedScaling {
    fn default() -> Self {
        Self {
            stride: 10.0,
            lateral_base: 15.0,
            lateral_gain: 2.0,
        }
    }
}

impl SpeedScaling {
    pub fn forward_offset(&self, sx: f64) -> f64 {
        sx * self.stride
    }

    /// 15 + 2s for s > 0, -15 + 2s for s < 0, 0 at rest
    pub fn lateral_offset(&self, sy: f64) -> f64 {
        if sy > 0.0 {
            self.lateral_base + sy * self.lateral_gain
        } else if sy < 0.0 {
            -self.lateral_base + sy * self.lateral_gain
        } else {
            0.0
        }
    }
}

/// Foot position on the ground plane, relative to the leg mount
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Foothold {
    pub x: f64,
    pub y: f64,
}

/// Geometry and timing of a standing family (walk, crab, run)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StanceProfile {
    pub front: Foothold,
    pub middle: Foothold,
    pub back: Foothold,
    /// Foot height while a leg is in the air
    pub lift_z: f64,
    /// Foot height while striding
    pub stride_z: f64,
    /// Foot height while standing in the posture
    pub stand_z: f64,
    /// Swing time of a stride (ms)
    pub swing_ms: u64,
    /// Time to plant and re-centre a leg (ms)
    pub settle_ms: u64,
    /// Time of each posture step (ms)
    pub posture_ms: u64,
}

impl StanceProfile {
    pub fn walk() -> Self {
        Self {
            front: Foothold { x: 63.0, y: 63.0 },
            middle: Foothold { x: 90.0, y: 0.0 },
            back: Foothold { x: 63.0, y: -63.0 },
            lift_z: -40.0,
            stride_z: -70.0,
            stand_z: -90.0,
            swing_ms: 200,
            settle_ms: 100,
            posture_ms: 200,
        }
    }

    pub fn crab() -> Self {
        let straight = Foothold { x: 90.0, y: 0.0 };
        Self {
            front: straight,
            middle: straight,
            back: straight,
            ..Self::walk()
        }
    }

    pub fn run() -> Self {
        Self {
            lift_z: -100.0,
            stride_z: -130.0,
            stand_z: -130.0,
            swing_ms: 100,
            settle_ms: 50,
            ..Self::walk()
        }
    }

    pub fn foothold(&self, leg: LegPosition) -> Foothold {
        match leg {
            LegPosition::LeftFront | LegPosition::RightFront => self.front,
            LegPosition::LeftMiddle | LegPosition::RightMiddle => self.middle,
            LegPosition::LeftBack | LegPosition::RightBack => self.back,
        }
    }
}

/// Resting pose with the body on the ground
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SitProfile {
    pub foothold: Foothold,
    pub z: f64,
    pub posture_ms: u64,
}

impl Default for SitProfile {
    fn default() -> Self {
        Self {
            foothold: Foothold { x: 90.0, y: 0.0 },
            z: 0.0,
            posture_ms: 200,
        }
    }
}

/// Numeric constants of every gait
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitConfig {
    pub speed: SpeedScaling,
    pub sit: SitProfile,
    pub walk: StanceProfile,
    pub crab: StanceProfile,
    pub run: StanceProfile,
}

impl Default for GaitConfig {
    fn default() -> Self {
        Self {
            speed: SpeedScaling::default(),
            sit: SitProfile::default(),
            walk: StanceProfile::walk(),
            crab: StanceProfile::crab(),
            run: StanceProfile::run(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RobotConfig;
    use crate::motor::{SimulatedDriver, WriteLog};

    fn rig() -> (Rig, WriteLog) {
        let driver = SimulatedDriver::new();
        let log = driver.log();
        let mut rig = Rig::assemble(&RobotConfig::default(), Box::new(driver), Box::new(ManualClock::new())).unwrap();
        rig.chain.reset();
        (rig, log)
    }

    #[test]
    fn test_resolve_normalizes_case() {
        assert_eq!(SequenceName::resolve("move", "walk"), Some(SequenceName::MoveWalk));
        assert_eq!(SequenceName::resolve("POSTURE", "sIT"), Some(SequenceName::PostureSit));
        assert_eq!(SequenceName::resolve("stop", ""), Some(SequenceName::Stop));
        assert_eq!(SequenceName::resolve("Move", "Crab"), Some(SequenceName::MoveCrab));
    }

    #[test]
    fn test_resolve_unknown_is_none() {
        assert_eq!(SequenceName::resolve("move", "sit"), None);
        assert_eq!(SequenceName::resolve("dance", "walk"), None);
        assert_eq!(SequenceName::resolve("stop", "walk"), None);
        assert_eq!(SequenceName::resolve("posture", ""), None);
        assert_eq!(SequenceName::resolve("", ""), None);
    }

    #[test]
    fn test_names_round_trip_through_strings() {
        for name in SequenceName::ALL {
            assert_eq!(name.to_string().parse::<SequenceName>(), Ok(name));
        }
        assert!("movewalk".parse::<SequenceName>().is_err());
    }

    #[test]
    fn test_lateral_offset() {
        let speed = SpeedScaling::default();
        assert_eq!(speed.lateral_offset(2.0), 19.0);
        assert_eq!(speed.lateral_offset(-2.0), -19.0);
        assert_eq!(speed.lateral_offset(0.0), 0.0);
        assert_eq!(speed.lateral_offset(15.0), 45.0);
        assert_eq!(speed.forward_offset(-1.5), -15.0);
    }

    #[test]
    fn test_repeat_signal() {
        let moving = MoveParams::new(0.0, 2.0);
        let idle = MoveParams::default();
        assert!(SequenceName::MoveWalk.repeats(moving));
        assert!(SequenceName::MoveRun.repeats(MoveParams::new(-1.0, 0.0)));
        assert!(!SequenceName::MoveCrab.repeats(idle));
        assert!(!SequenceName::PostureWalk.repeats(moving));
        assert!(!SequenceName::Stop.repeats(moving));
    }

    #[test]
    fn test_idle_move_and_stop_have_no_phases() {
        let gaits = GaitConfig::default();
        assert!(SequenceName::MoveWalk.phases(&gaits, MoveParams::default()).is_empty());
        assert!(SequenceName::Stop.phases(&gaits, MoveParams::new(3.0, 3.0)).is_empty());
    }

    #[test]
    fn test_profiles_follow_reference_constants() {
        let run = StanceProfile::run();
        assert_eq!(run.front, Foothold { x: 63.0, y: 63.0 });
        assert_eq!((run.lift_z, run.stride_z, run.stand_z), (-100.0, -130.0, -130.0));
        assert_eq!((run.swing_ms, run.settle_ms, run.posture_ms), (100, 50, 200));

        let crab = StanceProfile::crab();
        assert_eq!(crab.back, Foothold { x: 90.0, y: 0.0 });
        assert_eq!((crab.lift_z, crab.stride_z, crab.stand_z), (-40.0, -70.0, -90.0));
    }

    #[test]
    fn test_overreaching_pass_fails_before_moving() {
        let (mut rig, log) = rig();
        let homed = log.len();

        let err = SequenceName::MoveRun.run(&mut rig, MoveParams::new(6.0, 0.0)).unwrap_err();
        assert!(matches!(err, SequenceError::Reach { leg: LegPosition::RightMiddle, .. }));
        assert_eq!(log.len(), homed);
    }

    #[test]
    fn test_stock_gaits_cover_the_speed_limit() {
        let (mut rig, _log) = rig();
        let limit = STOCK_SPEED_LIMIT;
        for name in [SequenceName::MoveWalk, SequenceName::MoveCrab, SequenceName::MoveRun] {
            for (x, y) in [(limit, limit), (-limit, limit), (limit, -limit), (-limit, -limit)] {
                assert!(name.run(&mut rig, MoveParams::new(x, y)).unwrap(), "{} at ({}, {})", name, x, y);
            }
        }
    }
}
