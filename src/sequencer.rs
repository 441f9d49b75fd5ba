// Sequencer: owns the robot and runs one gait at a time
//
// Uninitialized -> Ready (after reset) -> Running (a gait is cycling) -> Ready
//
// Starting a gait bumps the generation counter and spawns a blocking loop that
// keeps performing the gait while its generation is still the current one.
// Superseding never interrupts a phase: the old loop finishes the pass it is in
// and then sees the newer generation.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chain::{Chain, ChainError};
use crate::clock::Clock;
use crate::config::{RobotConfig, SEGMENT_L1, SEGMENT_L2};
use crate::leg::{Joint, JointId, JointMapping, Leg, Legs};
use crate::motor::ActuatorDriver;
use crate::sequences::{GaitConfig, MoveParams, SequenceName};

/// Identifies one call to `Sequencer::sequence`
pub type Generation = u64;

/// Everything a gait moves: the legs, the servo chain and the gait constants
pub struct Rig {
    pub legs: Legs,
    pub chain: Chain,
    pub gaits: GaitConfig,
}

impl Rig {
    /// Build the legs from the configuration and register every bound joint on the chain
    pub fn assemble(
        config: &RobotConfig,
        driver: Box<dyn ActuatorDriver>,
        clock: Box<dyn Clock>,
    ) -> Result<Self, ChainError> {
        let legs = Legs::from_fn(|position| match config.leg(position) {
            Some(leg) => Leg::new(position, leg.l1, leg.l2, leg.mapping),
            None => Leg::new(position, SEGMENT_L1, SEGMENT_L2, JointMapping::default()),
        });

        let mut chain = Chain::new(driver, clock, config.playback);
        for leg in &config.legs {
            let Some(joints) = leg.joints else {
                debug!("Leg {:?} has no servos bound", leg.position);
                continue;
            };
            for joint in Joint::ALL {
                chain.register(JointId::new(leg.position, joint), joints.get(joint))?;
            }
        }

        Ok(Self {
            legs,
            chain,
            gaits: config.gaits,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    Uninitialized,
    Ready,
    Running,
}

struct Shared {
    rig: Mutex<Rig>,
    generation: AtomicU64,
    ready: AtomicBool,
    // gait loop currently holding the newest generation
    active: Mutex<Option<(Generation, SequenceName)>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn is_current(&self, generation: Generation) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Invalidate every running loop and return the new generation
    fn supersede(&self) -> Generation {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn finish(&self, generation: Generation) {
        let mut active = lock(&self.active);
        if matches!(*active, Some((current, _)) if current == generation) {
            *active = None;
        }
    }

    /// Forget any gait older than `generation`
    fn finish_before(&self, generation: Generation) {
        let mut active = lock(&self.active);
        if matches!(*active, Some((current, _)) if current < generation) {
            *active = None;
        }
    }

    fn run_loop(&self, generation: Generation, name: SequenceName, params: MoveParams) {
        let mut passes: u64 = 0;
        loop {
            if !self.is_current(generation) {
                break;
            }
            let mut rig = lock(&self.rig);
            // a newer sequence may have started while we waited for the rig
            if !self.is_current(generation) {
                break;
            }
            match name.run(&mut rig, params) {
                Ok(true) => passes += 1,
                Ok(false) => {
                    passes += 1;
                    break;
                }
                Err(e) => {
                    warn!("{} (generation {}) failed, stopping: {}", name, generation, e);
                    break;
                }
            }
            drop(rig);
            std::thread::yield_now();
        }

        debug!("{} (generation {}) ended after {} passes", name, generation, passes);
        self.finish(generation);
    }
}

/// Runs gaits on the rig, one at a time
///
/// Cloning gives another handle to the same robot. Gait loops run on the
/// blocking pool of the runtime given to `new`, so `sequence` can be called
/// from any thread.
#[derive(Clone)]
pub struct Sequencer {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl Sequencer {
    pub fn new(rig: Rig, runtime: Handle) -> Self {
        Self {
            runtime,
            shared: Arc::new(Shared {
                rig: Mutex::new(rig),
                generation: AtomicU64::new(0),
                ready: AtomicBool::new(false),
                active: Mutex::new(None),
                loops: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn ready(&self) -> bool {
        self.shared.ready.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SequencerState {
        if !self.ready() {
            SequencerState::Uninitialized
        } else if lock(&self.shared.active).is_some() {
            SequencerState::Running
        } else {
            SequencerState::Ready
        }
    }

    /// Gait currently cycling, if any
    pub fn current(&self) -> Option<SequenceName> {
        lock(&self.shared.active).map(|(_, name)| name)
    }

    pub fn generation(&self) -> Generation {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Stop any running gait and send every servo home
    ///
    /// Waits for an in-flight pass of the superseded gait to finish first; the
    /// sequencer keeps reporting that gait as running until then.
    pub async fn reset(&self) {
        let generation = self.shared.supersede();
        info!("Resetting to home (generation {})", generation);

        let shared = Arc::clone(&self.shared);
        let homed = self
            .runtime
            .spawn_blocking(move || {
                let mut rig = lock(&shared.rig);
                // no older pass can still be moving once the rig is ours
                shared.finish_before(generation);
                rig.chain.reset();
                shared.ready.store(true, Ordering::SeqCst);
            })
            .await;

        if let Err(e) = homed {
            error!("Reset did not complete: {}", e);
        }
    }

    /// Start the gait named by (action, posture), eg. ("move", "walk")
    ///
    /// Does nothing before the first reset or when the parts name no gait.
    pub fn sequence(&self, action: &str, posture: &str, params: MoveParams) -> Option<Generation> {
        match SequenceName::resolve(action, posture) {
            Some(name) => self.sequence_named(name, params),
            None => {
                debug!("No sequence for action {:?} posture {:?}", action, posture);
                None
            }
        }
    }

    /// Start a gait, superseding the one running
    pub fn sequence_named(&self, name: SequenceName, params: MoveParams) -> Option<Generation> {
        if !self.ready() {
            debug!("Ignoring {}: not reset yet", name);
            return None;
        }

        let generation = self.shared.supersede();
        *lock(&self.shared.active) = Some((generation, name));
        info!("Starting {} (generation {}) with {:?}", name, generation, params);

        let shared = Arc::clone(&self.shared);
        let handle = self.runtime.spawn_blocking(move || shared.run_loop(generation, name, params));

        let mut loops = lock(&self.shared.loops);
        loops.retain(|handle| !handle.is_finished());
        loops.push(handle);
        Some(generation)
    }

    /// Wait until every gait loop has ended
    ///
    /// A repeating gait only ends once it is superseded or fails.
    pub async fn wait_idle(&self) {
        loop {
            let pending: Vec<_> = lock(&self.shared.loops).drain(..).collect();
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    error!("Sequence loop panicked: {}", e);
                }
            }
        }
    }

    /// Inspect the rig once any pass in progress has finished
    pub fn with_rig<R>(&self, f: impl FnOnce(&Rig) -> R) -> R {
        f(&lock(&self.shared.rig))
    }
}
