// Static postures (sit, and the standing stance of each moving gait)

use crate::leg::LegPosition;

use super::phase::{JointTimings, LegMove, Phase};
use super::{SitProfile, StanceProfile};

/// Legs stepped first when taking a stance; the rest follow once these are planted
const FIRST: [LegPosition; 2] = [LegPosition::RightFront, LegPosition::RightBack];
const SECOND: [LegPosition; 1] = [LegPosition::RightMiddle];

/// Lower every leg to the sitting pose in one phase
pub fn sit_phases(profile: &SitProfile) -> Vec<Phase> {
    let timing = JointTimings::shoulder_last(profile.posture_ms);
    let moves = LegPosition::RIGHT
        .into_iter()
        .map(|leg| LegMove::new(leg, (profile.foothold.x, profile.foothold.y, profile.z), timing))
        .collect();
    vec![Phase::new(moves)]
}

/// Step into a stance: odd legs lift over and lower, then the even legs do the same
pub fn stance_phases(profile: &StanceProfile) -> Vec<Phase> {
    let at = |legs: &[LegPosition], z: f64, timing: JointTimings| {
        Phase::new(
            legs.iter()
                .map(|&leg| {
                    let foothold = profile.foothold(leg);
                    LegMove::new(leg, (foothold.x, foothold.y, z), timing)
                })
                .collect(),
        )
    };
    let step = JointTimings::shoulder_last(profile.posture_ms);
    let lower = JointTimings::together(profile.posture_ms);

    vec![
        at(&FIRST, profile.lift_z, step),
        at(&FIRST, profile.stand_z, lower),
        at(&SECOND, profile.lift_z, step),
        at(&SECOND, profile.stand_z, lower),
    ]
}
