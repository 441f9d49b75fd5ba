// Two-segment leg kinematics for the hexapod
// Converts between joint angles (t1, t2, t3 in degrees) and foot position (x, y, z).
//
// t1 lifts the first segment, t2 bends the second segment relative to the first,
// t3 yaws the whole leg around the vertical axis at the mount.

/// Joint angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointAngles {
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
}

/// Foot position relative to the leg mount
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum KinematicsError {
    #[error(
        "Inverse kinematics target unreachable: distance {distance:.3} outside [{min:.3}, {max:.3}]"
    )]
    Unreachable { distance: f64, min: f64, max: f64 },

    // Legs are mounted facing outward; targets at or behind the mount plane are refused
    #[error("Target ({x:.3}, {y:.3}) is outside the leg's yaw range (x must be > 0)")]
    YawOutOfRange { x: f64, y: f64 },

    #[error("Non-finite kinematics input")]
    NonFinite,
}

/// Forward/inverse kinematics solver for one leg
#[derive(Debug, Clone)]
pub struct Kinematics {
    l1: f64,
    l2: f64,
    angles: JointAngles,
    position: Position,
}

impl Kinematics {
    /// Create a solver for segment lengths `l1` (shoulder side) and `l2` (foot side)
    ///
    /// Starts with the first segment vertical and the second horizontal.
    pub fn new(l1: f64, l2: f64) -> Self {
        Self {
            l1,
            l2,
            angles: JointAngles {
                t1: 90.0,
                t2: -90.0,
                t3: 0.0,
            },
            position: Position::new(l2, 0.0, l1),
        }
    }

    pub fn lengths(&self) -> (f64, f64) {
        (self.l1, self.l2)
    }

    /// Angles written by the last solve
    pub fn angles(&self) -> JointAngles {
        self.angles
    }

    /// Position written by the last solve
    pub fn position(&self) -> Position {
        self.position
    }

    /// Forward kinematics: set joint angles and compute the foot position
    pub fn move_to_angle(&mut self, t1: f64, t2: f64, t3: f64) -> Position {
        let (r1, r12, r3) = (t1.to_radians(), (t1 + t2).to_radians(), t3.to_radians());

        let x_prime = self.l1 * r1.cos() + self.l2 * r12.cos();
        let z = self.l1 * r1.sin() + self.l2 * r12.sin();

        self.angles = JointAngles { t1, t2, t3 };
        self.position = Position::new(x_prime * r3.cos(), x_prime * r3.sin(), z);
        self.position
    }

    /// Inverse kinematics (elbow-down branch): set the foot position and compute joint angles
    ///
    /// Fails without touching the current state when the target cannot be reached.
    pub fn move_to_position(&mut self, x: f64, y: f64, z: f64) -> Result<JointAngles, KinematicsError> {
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(KinematicsError::NonFinite);
        }
        if x <= 0.0 {
            return Err(KinematicsError::YawOutOfRange { x, y });
        }

        let x_prime = x.hypot(y);
        let distance = x_prime.hypot(z);
        let (min, max) = ((self.l1 - self.l2).abs(), self.l1 + self.l2);

        let cos_t2 = (distance.powi(2) - self.l1.powi(2) - self.l2.powi(2)) / (2.0 * self.l1 * self.l2);
        if !(-1.0..=1.0).contains(&cos_t2) {
            return Err(KinematicsError::Unreachable { distance, min, max });
        }

        let t3 = y.atan2(x);
        let t2 = -cos_t2.acos();
        let t1 = z.atan2(x_prime) - (self.l2 * t2.sin()).atan2(self.l1 + self.l2 * t2.cos());

        self.angles = JointAngles {
            t1: t1.to_degrees(),
            t2: t2.to_degrees(),
            t3: t3.to_degrees(),
        };
        self.position = Position::new(x, y, z);
        Ok(self.angles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < EPS, "{} != {}", a, b);
    }

    #[test]
    fn test_initial_pose_is_consistent() {
        let mut k = Kinematics::new(72.0, 125.0);
        let start = k.position();
        let p = k.move_to_angle(90.0, -90.0, 0.0);
        assert_close(p.x, start.x);
        assert_close(p.y, start.y);
        assert_close(p.z, start.z);
    }

    #[test]
    fn test_forward_kinematics_straight_leg() {
        let mut k = Kinematics::new(72.0, 125.0);
        let p = k.move_to_angle(0.0, 0.0, 0.0);
        assert_close(p.x, 197.0);
        assert_close(p.y, 0.0);
        assert_close(p.z, 0.0);

        let p = k.move_to_angle(0.0, 0.0, 90.0);
        assert_close(p.x, 0.0);
        assert_close(p.y, 197.0);
    }

    #[test]
    fn test_round_trip_over_mechanical_range() {
        let mut k = Kinematics::new(72.0, 125.0);

        for t1 in (-60..=120).step_by(15) {
            for t2 in (-170..=-10).step_by(20) {
                for t3 in (-80..=80).step_by(20) {
                    let (t1, t2, t3) = (t1 as f64, t2 as f64, t3 as f64);
                    let p = k.move_to_angle(t1, t2, t3);
                    if p.x <= 0.0 {
                        // foot folded behind the mount, not a reachable pose for this leg
                        continue;
                    }
                    let angles = k.move_to_position(p.x, p.y, p.z).unwrap();
                    assert_close(angles.t1, t1);
                    assert_close(angles.t2, t2);
                    assert_close(angles.t3, t3);
                }
            }
        }
    }

    #[test]
    fn test_sit_pose_matches_reference_values() {
        let mut k = Kinematics::new(72.0, 125.0);
        let a = k.move_to_position(90.0, 0.0, 0.0).unwrap();

        // law of cosines on the 72/125/90 triangle
        let expected_t2 = -((90.0f64.powi(2) - 72.0f64.powi(2) - 125.0f64.powi(2)) / (2.0 * 72.0 * 125.0))
            .acos()
            .to_degrees();
        assert_close(a.t2, expected_t2);
        assert_close(a.t3, 0.0);
        assert!(a.t1 > 90.0 && a.t1 < 180.0, "t1 = {}", a.t1);
        assert_eq!(k.position(), Position::new(90.0, 0.0, 0.0));
    }

    #[test]
    fn test_too_far_is_unreachable() {
        let mut k = Kinematics::new(72.0, 125.0);
        let before = k.angles();
        let err = k.move_to_position(150.0, 0.0, -150.0).unwrap_err();
        assert!(matches!(err, KinematicsError::Unreachable { max, .. } if max == 197.0));
        assert_eq!(k.angles(), before);
    }

    #[test]
    fn test_too_close_is_unreachable() {
        let mut k = Kinematics::new(72.0, 125.0);
        let err = k.move_to_position(20.0, 0.0, -20.0).unwrap_err();
        assert!(matches!(err, KinematicsError::Unreachable { min, .. } if min == 53.0));
    }

    #[test]
    fn test_envelope_edges_are_reachable() {
        let mut k = Kinematics::new(72.0, 125.0);
        let a = k.move_to_position(197.0, 0.0, 0.0).unwrap();
        assert_close(a.t2, 0.0);
        let a = k.move_to_position(53.0, 0.0, 0.0).unwrap();
        assert_close(a.t2, -180.0);
    }

    #[test]
    fn test_backward_target_is_refused() {
        let mut k = Kinematics::new(72.0, 125.0);
        assert_eq!(
            k.move_to_position(-90.0, 10.0, 0.0),
            Err(KinematicsError::YawOutOfRange { x: -90.0, y: 10.0 })
        );
        assert!(matches!(
            k.move_to_position(0.0, 90.0, 0.0),
            Err(KinematicsError::YawOutOfRange { .. })
        ));
    }

    #[test]
    fn test_nan_is_refused() {
        let mut k = Kinematics::new(72.0, 125.0);
        assert_eq!(
            k.move_to_position(f64::NAN, 0.0, 0.0),
            Err(KinematicsError::NonFinite)
        );
    }
}
