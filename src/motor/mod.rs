// Servo control for the hexapod
//
// Provides:
// - The `ActuatorDriver` boundary the orchestration chain writes angles through
// - Feetech STS3215 serial protocol implementation
// - A position-mode servo driver for real hardware and a simulated one for testing
// - A single-servo sweep for checking wiring

mod driver;
pub mod feetech;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};

pub use driver::ServoDriver;
pub use feetech::{FeetechBus, FeetechError};

/// Servo angles are accepted within this range (degrees)
pub const MIN_ANGLE: f64 = 0.0;
pub const MAX_ANGLE: f64 = 180.0;

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("Angle {angle} for channel {channel} must be 0-180")]
    AngleOutOfRange { channel: u8, angle: f64 },

    #[error("Servo bus error: {0}")]
    Bus(#[from] FeetechError),
}

/// Sets a servo channel to an angle in degrees
pub trait ActuatorDriver: Send {
    fn set_angle(&mut self, channel: u8, angle: f64) -> Result<(), ActuatorError>;

    /// Angle a servo reports holding, `None` when the driver cannot read back
    fn read_angle(&mut self, _channel: u8) -> Result<Option<f64>, ActuatorError> {
        Ok(None)
    }

    /// Release holding torque on every servo
    fn relax(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

pub(crate) fn check_angle(channel: u8, angle: f64) -> Result<(), ActuatorError> {
    if (MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
        Ok(())
    } else {
        Err(ActuatorError::AngleOutOfRange { channel, angle })
    }
}

/// One accepted servo write
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServoWrite {
    pub channel: u8,
    pub angle: f64,
}

/// Shared record of the writes a `SimulatedDriver` accepted
#[derive(Debug, Clone, Default)]
pub struct WriteLog {
    writes: Arc<Mutex<Vec<ServoWrite>>>,
    relaxed: Arc<AtomicBool>,
}

impl WriteLog {
    fn push(&self, write: ServoWrite) {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).push(write);
        self.relaxed.store(false, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<ServoWrite> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest angle written to a channel
    pub fn last_angle(&self, channel: u8) -> Option<f64> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|w| w.channel == channel)
            .map(|w| w.angle)
    }

    /// Whether the servos were relaxed after the last write
    pub fn relaxed(&self) -> bool {
        self.relaxed.load(Ordering::SeqCst)
    }
}

/// Stands in for the servo bus when no hardware is attached
#[derive(Debug, Clone, Default)]
pub struct SimulatedDriver {
    log: WriteLog,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the write history, stays valid after the driver is moved into a chain
    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }
}

impl ActuatorDriver for SimulatedDriver {
    fn set_angle(&mut self, channel: u8, angle: f64) -> Result<(), ActuatorError> {
        check_angle(channel, angle)?;
        debug!("Simulated servo {} -> {:.2}", channel, angle);
        self.log.push(ServoWrite { channel, angle });
        Ok(())
    }

    fn read_angle(&mut self, channel: u8) -> Result<Option<f64>, ActuatorError> {
        Ok(self.log.last_angle(channel))
    }

    fn relax(&mut self) -> Result<(), ActuatorError> {
        debug!("Simulated servos relaxed");
        self.log.relaxed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Angles stepped through by `sweep`
pub const SWEEP_ANGLES: [f64; 5] = [0.0, 45.0, 90.0, 135.0, 180.0];

/// Step one servo through its range, pausing at each angle, then relax it
///
/// Returns the angle read back at each step.
pub async fn sweep(
    driver: &mut dyn ActuatorDriver,
    channel: u8,
    pause: Duration,
) -> Result<Vec<Option<f64>>, ActuatorError> {
    info!("Sweeping channel {}", channel);
    let result = sweep_steps(driver, channel, pause).await;
    if let Err(e) = driver.relax() {
        warn!("Failed to relax servos after sweep: {}", e);
    }
    result
}

async fn sweep_steps(
    driver: &mut dyn ActuatorDriver,
    channel: u8,
    pause: Duration,
) -> Result<Vec<Option<f64>>, ActuatorError> {
    let mut readings = Vec::with_capacity(SWEEP_ANGLES.len());
    for angle in SWEEP_ANGLES {
        driver.set_angle(channel, angle)?;
        tokio::time::sleep(pause).await;
        let reading = driver.read_angle(channel)?;
        match reading {
            Some(actual) => info!("Channel {} -> {}° (reads {:.1}°)", channel, angle, actual),
            None => info!("Channel {} -> {}°", channel, angle),
        }
        readings.push(reading);
    }
    Ok(readings)
}
