// Gait phases as data
//
// A phase lists the legs that move, where each foot goes and how each joint is
// timed. Performing a phase solves every leg, stages the servo targets on the
// chain and plays them to completion.

use std::time::Duration;

use crate::chain::{Chain, ChainError};
use crate::leg::{Joint, JointId, LegPosition, Legs, Position, ServoAngles};
use crate::motor::{MAX_ANGLE, MIN_ANGLE};

use super::SequenceError;

/// Start delay and travel time of one joint within a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub delay: Duration,
    pub duration: Duration,
}

impl Timing {
    pub fn ms(delay: u64, duration: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay),
            duration: Duration::from_millis(duration),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointTimings {
    pub shoulder: Timing,
    pub main: Timing,
    pub foot: Timing,
}

impl JointTimings {
    /// Every joint starts at once and takes `ms`
    pub fn together(ms: u64) -> Self {
        let t = Timing::ms(0, ms);
        Self {
            shoulder: t,
            main: t,
            foot: t,
        }
    }

    /// Main and foot move first, the shoulder follows once they are done
    pub fn shoulder_last(ms: u64) -> Self {
        Self {
            shoulder: Timing::ms(ms, ms),
            ..Self::together(ms)
        }
    }

    /// Shoulder and foot take `ms`, main waits `main_ms` then takes `main_ms`
    pub fn main_late(ms: u64, main_ms: u64) -> Self {
        Self {
            main: Timing::ms(main_ms, main_ms),
            ..Self::together(ms)
        }
    }

    pub fn get(&self, joint: Joint) -> Timing {
        match joint {
            Joint::Shoulder => self.shoulder,
            Joint::Main => self.main,
            Joint::Foot => self.foot,
        }
    }
}

/// One leg's foot target within a phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegMove {
    pub leg: LegPosition,
    pub target: Position,
    pub timing: JointTimings,
}

impl LegMove {
    pub fn new(leg: LegPosition, (x, y, z): (f64, f64, f64), timing: JointTimings) -> Self {
        Self {
            leg,
            target: Position::new(x, y, z),
            timing,
        }
    }
}

/// One atomic, fully interpolated motion of several legs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Phase {
    pub moves: Vec<LegMove>,
}

impl Phase {
    pub fn new(moves: Vec<LegMove>) -> Self {
        Self { moves }
    }

    pub fn target(&self, leg: LegPosition) -> Option<Position> {
        self.moves.iter().find(|m| m.leg == leg).map(|m| m.target)
    }

    /// Solve, stage and play this phase
    pub fn perform(&self, legs: &mut Legs, chain: &mut Chain) -> Result<(), SequenceError> {
        perform_all(std::slice::from_ref(self), legs, chain)
    }

    /// Servo angles for every move, updating each leg's kinematic state
    ///
    /// Fails on a target out of reach or one the servos cannot hold.
    pub fn solve(&self, legs: &mut Legs) -> Result<SolvedPhase, SequenceError> {
        let mut moves = Vec::with_capacity(self.moves.len());
        for m in &self.moves {
            let Position { x, y, z } = m.target;
            let angles = legs[m.leg]
                .move_leg(x, y, z)
                .map_err(|source| SequenceError::Reach { leg: m.leg, source })?;
            for joint in Joint::ALL {
                let angle = angles.get(joint);
                if !(MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
                    return Err(SequenceError::ServoRange { leg: m.leg, joint, angle });
                }
            }
            moves.push((*m, angles));
        }
        Ok(SolvedPhase { moves })
    }
}

/// A phase with its servo angles worked out
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedPhase {
    moves: Vec<(LegMove, ServoAngles)>,
}

impl SolvedPhase {
    /// Stage every joint and play the phase; a staging error leaves nothing staged
    pub fn play(&self, chain: &mut Chain) -> Result<(), SequenceError> {
        if let Err(e) = self.stage(chain) {
            chain.clear();
            return Err(e.into());
        }
        chain.play()?;
        Ok(())
    }

    fn stage(&self, chain: &mut Chain) -> Result<(), ChainError> {
        for (m, angles) in &self.moves {
            for joint in Joint::ALL {
                let timing = m.timing.get(joint);
                chain.load(JointId::new(m.leg, joint), angles.get(joint), timing.delay, timing.duration)?;
            }
        }
        Ok(())
    }
}

/// Perform phases in order, each one finishing before the next starts
///
/// The whole pass is solved before the first phase plays, so a target out of
/// reach anywhere in it fails the pass without moving a servo or changing the legs.
pub fn perform_all(phases: &[Phase], legs: &mut Legs, chain: &mut Chain) -> Result<(), SequenceError> {
    let mut planned = legs.clone();
    let solved = phases
        .iter()
        .map(|phase| phase.solve(&mut planned))
        .collect::<Result<Vec<_>, _>>()?;
    *legs = planned;

    for phase in &solved {
        phase.play(chain)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ActuatorBinding;
    use crate::clock::ManualClock;
    use crate::config::PlaybackConfig;
    use crate::leg::{JointMapping, Leg};
    use crate::motor::{SimulatedDriver, WriteLog};

    fn rig() -> (Legs, Chain) {
        let (legs, chain, _) = logged_rig();
        (legs, chain)
    }

    fn logged_rig() -> (Legs, Chain, WriteLog) {
        let legs = Legs::from_fn(|p| Leg::new(p, 72.0, 125.0, JointMapping::default()));
        let driver = SimulatedDriver::new();
        let log = driver.log();
        let mut chain = Chain::new(
            Box::new(driver),
            Box::new(ManualClock::new()),
            PlaybackConfig::default(),
        );
        for (i, joint) in Joint::ALL.into_iter().enumerate() {
            let id = JointId::new(LegPosition::RightFront, joint);
            chain.register(id, ActuatorBinding { channel: i as u8, home: 90.0 }).unwrap();
        }
        chain.reset();
        (legs, chain, log)
    }

    #[test]
    fn test_timing_shapes() {
        let t = JointTimings::shoulder_last(200);
        assert_eq!(t.shoulder, Timing::ms(200, 200));
        assert_eq!(t.main, Timing::ms(0, 200));

        let t = JointTimings::main_late(200, 100);
        assert_eq!(t.main, Timing::ms(100, 100));
        assert_eq!(t.foot, Timing::ms(0, 200));
    }

    #[test]
    fn test_perform_moves_leg_to_solution() {
        let (mut legs, mut chain) = rig();
        let phase = Phase::new(vec![LegMove::new(
            LegPosition::RightFront,
            (90.0, 0.0, -40.0),
            JointTimings::together(100),
        )]);

        phase.perform(&mut legs, &mut chain).unwrap();

        let mut reference = Leg::new(LegPosition::RightFront, 72.0, 125.0, JointMapping::default());
        let expected = reference.move_leg(90.0, 0.0, -40.0).unwrap();
        for joint in Joint::ALL {
            let id = JointId::new(LegPosition::RightFront, joint);
            assert_eq!(chain.angle(id), Some(expected.get(joint)));
        }
    }

    #[test]
    fn test_unreachable_target_stages_nothing() {
        let (mut legs, mut chain) = rig();
        let phase = Phase::new(vec![
            LegMove::new(LegPosition::RightFront, (90.0, 0.0, -40.0), JointTimings::together(100)),
            LegMove::new(LegPosition::RightFront, (400.0, 0.0, 0.0), JointTimings::together(100)),
        ]);

        let err = phase.perform(&mut legs, &mut chain).unwrap_err();
        assert!(matches!(err, SequenceError::Reach { leg: LegPosition::RightFront, .. }));
        let rfs = JointId::new(LegPosition::RightFront, Joint::Shoulder);
        assert_eq!(chain.staged_target(rfs), None);
        assert_eq!(chain.angle(rfs), Some(90.0));
    }

    #[test]
    fn test_unbound_leg_clears_partial_stage() {
        let (mut legs, mut chain) = rig();
        let phase = Phase::new(vec![
            LegMove::new(LegPosition::RightFront, (90.0, 0.0, -40.0), JointTimings::together(100)),
            LegMove::new(LegPosition::RightMiddle, (90.0, 0.0, -40.0), JointTimings::together(100)),
        ]);

        let err = phase.perform(&mut legs, &mut chain).unwrap_err();
        assert!(matches!(err, SequenceError::Chain(_)));
        let rfs = JointId::new(LegPosition::RightFront, Joint::Shoulder);
        assert_eq!(chain.staged_target(rfs), None);
    }

    #[test]
    fn test_unreachable_later_phase_moves_nothing() {
        let (mut legs, mut chain, log) = logged_rig();
        let homed = log.len();
        let phases = [
            Phase::new(vec![LegMove::new(
                LegPosition::RightFront,
                (90.0, 0.0, -40.0),
                JointTimings::together(100),
            )]),
            Phase::new(vec![LegMove::new(
                LegPosition::RightFront,
                (150.0, 0.0, -130.0),
                JointTimings::together(100),
            )]),
        ];

        let err = perform_all(&phases, &mut legs, &mut chain).unwrap_err();
        assert!(matches!(err, SequenceError::Reach { leg: LegPosition::RightFront, .. }));
        assert_eq!(log.len(), homed);
        assert_eq!(chain.angle(JointId::new(LegPosition::RightFront, Joint::Main)), Some(90.0));

        // the legs keep the state they had before the pass
        let start = Legs::from_fn(|p| Leg::new(p, 72.0, 125.0, JointMapping::default()));
        assert_eq!(
            legs[LegPosition::RightFront].kinematics().position(),
            start[LegPosition::RightFront].kinematics().position()
        );
    }

    #[test]
    fn test_servo_range_checked_before_playing() {
        let (mut legs, mut chain, log) = logged_rig();
        let homed = log.len();
        let phases = [
            Phase::new(vec![LegMove::new(
                LegPosition::RightFront,
                (90.0, 0.0, -40.0),
                JointTimings::together(100),
            )]),
            // reachable, but the shoulder would have to pass 180
            Phase::new(vec![LegMove::new(
                LegPosition::RightFront,
                (20.0, 0.0, -50.0),
                JointTimings::together(100),
            )]),
        ];

        let err = perform_all(&phases, &mut legs, &mut chain).unwrap_err();
        assert!(matches!(err, SequenceError::ServoRange { joint: Joint::Shoulder, .. }));
        assert_eq!(log.len(), homed);
    }
}
