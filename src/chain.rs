// Orchestration chain: moves many servos in unison
//
// Each registered joint owns one servo binding. A phase is staged with `load`
// (target, delay, duration per joint) and executed with `play`, which blocks
// until every staged joint has reached its target. All joints are stepped
// against the same clock sample so multi-joint motion stays coordinated.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::PlaybackConfig;
use crate::leg::JointId;
use crate::motor::{ActuatorDriver, MAX_ANGLE, MIN_ANGLE};

/// Hardware channel and resting angle of one servo
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuatorBinding {
    pub channel: u8,
    pub home: f64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ChainError {
    #[error("No chain entry named {0}")]
    UnknownEntry(JointId),

    #[error("Chain entry {0} is already registered")]
    DuplicateEntry(JointId),

    #[error("Home angle {home} for {id} must be 0-180")]
    InvalidHome { id: JointId, home: f64 },

    #[error("Target angle {angle} for {id} must be a finite angle in 0-180")]
    InvalidTarget { id: JointId, angle: f64 },

    #[error("Motion did not complete after {elapsed:?} ({iterations} steps)")]
    MotionTimeout { elapsed: Duration, iterations: u64 },
}

/// A staged move for one entry
#[derive(Debug, Clone, Copy)]
struct Transition {
    target: f64,
    delay: Duration,
    duration: Duration,
    // captured on the first step of the phase
    origin: Option<f64>,
}

impl Transition {
    fn end(&self) -> Duration {
        self.delay + self.duration
    }
}

/// Angle of a linear move from `origin` to `target` at phase time `t`
///
/// Holds at `origin` until `delay` has passed, never travels past `target`,
/// and jumps straight to `target` when `duration` is zero.
pub fn interpolate(origin: f64, target: f64, delay: Duration, duration: Duration, t: Duration) -> f64 {
    if t < delay {
        return origin;
    }
    let elapsed = t - delay;
    if duration.is_zero() || elapsed >= duration {
        return target;
    }

    let rate = (target - origin) / duration.as_secs_f64();
    let angle = origin + rate * elapsed.as_secs_f64();
    if (target > origin && angle > target) || (target < origin && angle < target) {
        target
    } else {
        angle
    }
}

#[derive(Debug, Clone)]
struct ChainEntry {
    id: JointId,
    binding: ActuatorBinding,
    // last commanded angle
    angle: f64,
    staged: Option<Transition>,
}

pub struct Chain {
    entries: Vec<ChainEntry>,
    driver: Box<dyn ActuatorDriver>,
    clock: Box<dyn Clock>,
    playback: PlaybackConfig,
}

impl Chain {
    pub fn new(driver: Box<dyn ActuatorDriver>, clock: Box<dyn Clock>, playback: PlaybackConfig) -> Self {
        Self {
            entries: Vec::new(),
            driver,
            clock,
            playback,
        }
    }

    /// Add a joint to the chain. Its commanded angle starts at home.
    pub fn register(&mut self, id: JointId, binding: ActuatorBinding) -> Result<(), ChainError> {
        if self.entry(id).is_some() {
            return Err(ChainError::DuplicateEntry(id));
        }
        if !(MIN_ANGLE..=MAX_ANGLE).contains(&binding.home) {
            return Err(ChainError::InvalidHome {
                id,
                home: binding.home,
            });
        }

        debug!("Registered {} on channel {}", id, binding.channel);
        self.entries.push(ChainEntry {
            id,
            binding,
            angle: binding.home,
            staged: None,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: JointId) -> bool {
        self.entry(id).is_some()
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = JointId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Last commanded angle of an entry
    pub fn angle(&self, id: JointId) -> Option<f64> {
        self.entry(id).map(|e| e.angle)
    }

    /// Target staged for the next `play`, if any
    pub fn staged_target(&self, id: JointId) -> Option<f64> {
        self.entry(id).and_then(|e| e.staged).map(|t| t.target)
    }

    fn entry(&self, id: JointId) -> Option<&ChainEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Send every servo to its home angle right away and drop anything staged
    pub fn reset(&mut self) {
        info!("Moving {} servos to home", self.entries.len());
        for entry in &mut self.entries {
            entry.staged = None;
            entry.angle = entry.binding.home;
            if let Err(e) = self.driver.set_angle(entry.binding.channel, entry.angle) {
                warn!("Failed to home {} (channel {}): {}", entry.id, entry.binding.channel, e);
            }
        }
    }

    /// Stage a move for one entry, replacing anything already staged for it
    pub fn load(&mut self, id: JointId, angle: f64, delay: Duration, duration: Duration) -> Result<(), ChainError> {
        if !angle.is_finite() || !(MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
            return Err(ChainError::InvalidTarget { id, angle });
        }
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(ChainError::UnknownEntry(id))?;

        entry.staged = Some(Transition {
            target: angle,
            delay,
            duration,
            origin: None,
        });
        Ok(())
    }

    /// Run every staged move to completion
    ///
    /// Blocks until all staged entries sit exactly on their targets, then clears
    /// the staged state. Write failures are logged and skipped. If the phase
    /// overruns its longest move by more than the configured margin, or exceeds
    /// the step budget, the staged state is dropped and `MotionTimeout` returned.
    pub fn play(&mut self) -> Result<(), ChainError> {
        let Some(longest) = self.entries.iter().filter_map(|e| e.staged).map(|t| t.end()).max() else {
            return Ok(());
        };
        let deadline = longest + self.playback.timeout_margin();
        let start = self.clock.now();
        let mut iterations: u64 = 0;

        debug!(
            "Playing phase: {} entries, {:?} long",
            self.entries.iter().filter(|e| e.staged.is_some()).count(),
            longest
        );

        loop {
            let t = self.clock.now().saturating_sub(start);
            let mut done = true;

            for entry in &mut self.entries {
                let Some(transition) = entry.staged.as_mut() else {
                    continue;
                };
                let origin = *transition.origin.get_or_insert(entry.angle);
                let angle = interpolate(origin, transition.target, transition.delay, transition.duration, t);

                if angle != entry.angle {
                    entry.angle = angle;
                    if let Err(e) = self.driver.set_angle(entry.binding.channel, angle) {
                        warn!("Failed to move {} (channel {}) to {:.2}: {}", entry.id, entry.binding.channel, angle, e);
                    }
                }
                done &= entry.angle == transition.target;
            }

            if done {
                break;
            }

            iterations += 1;
            if t > deadline || iterations >= self.playback.max_iterations {
                warn!("Phase timed out after {:?} ({} steps)", t, iterations);
                self.clear();
                return Err(ChainError::MotionTimeout { elapsed: t, iterations });
            }
            self.clock.wait(self.playback.tick());
        }

        self.clear();
        debug!("Phase complete in {:?}", self.clock.now().saturating_sub(start));
        Ok(())
    }

    /// Drop everything staged without moving
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            entry.staged = None;
        }
    }
}
