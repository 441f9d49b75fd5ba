// Moving gaits (walk, crab, run)
//
// The front and back legs swing together while the middle leg swings the
// opposite way; one pass is lift + swing, plant + centre, then push through.

use crate::leg::LegPosition;

use super::phase::{JointTimings, LegMove, Phase};
use super::{MoveParams, SpeedScaling, StanceProfile};

/// Legs that swing in the direction of travel during the lift phase
const LEAD: [LegPosition; 2] = [LegPosition::RightFront, LegPosition::RightBack];

fn direction(leg: LegPosition) -> f64 {
    if LEAD.contains(&leg) { 1.0 } else { -1.0 }
}

/// One stride of a moving gait; empty when both speeds are zero
pub fn tripod_phases(profile: &StanceProfile, speed: &SpeedScaling, params: MoveParams) -> Vec<Phase> {
    if params.is_zero() {
        return Vec::new();
    }

    let dx = speed.forward_offset(params.x);
    let dy = speed.lateral_offset(params.y);

    let step = |z: f64, sign: f64, timing: JointTimings| {
        Phase::new(
            LegPosition::RIGHT
                .into_iter()
                .map(|leg| {
                    let home = profile.foothold(leg);
                    let s = sign * direction(leg);
                    LegMove::new(leg, (home.x + s * dx, home.y + s * dy, z), timing)
                })
                .collect(),
        )
    };

    vec![
        // lift and swing
        step(profile.lift_z, 1.0, JointTimings::together(profile.swing_ms)),
        // plant and centre
        step(profile.stride_z, 0.0, JointTimings::shoulder_last(profile.settle_ms)),
        // push through
        step(
            profile.stride_z,
            -1.0,
            JointTimings::main_late(profile.swing_ms, profile.settle_ms),
        ),
    ]
}
