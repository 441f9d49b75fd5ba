// Position-mode servo driver for the hexapod legs
//
// Each chain channel is a Feetech servo ID on one serial bus. Angles 0..=180
// map onto goal positions centred on the servo midpoint.

use tracing::{debug, info, warn};

use super::feetech::{self, FeetechBus, FeetechError, OperatingMode};
use super::{ActuatorDriver, ActuatorError, check_angle};

pub struct ServoDriver {
    bus: FeetechBus,
    ids: Vec<u8>,
}

impl ServoDriver {
    /// Connect to the servo bus on `port`, driving the servos with the given IDs
    pub fn new(port: &str, baudrate: u32, ids: Vec<u8>) -> Result<Self, FeetechError> {
        info!("Opening servo bus on {} ({} baud)", port, baudrate);
        let bus = FeetechBus::open(port, baudrate)?;
        Ok(Self { bus, ids })
    }

    /// Put every servo in position mode with torque on
    ///
    /// Must be called before the first angle is written.
    pub fn initialize(&mut self) -> Result<(), FeetechError> {
        info!("Initializing servos {:?} for position control", self.ids);

        for &id in &self.ids {
            match self.bus.ping(id) {
                Ok(true) => debug!("Servo {} responding", id),
                Ok(false) => {
                    warn!("Servo {} not responding to ping", id);
                    return Err(FeetechError::Timeout { id });
                }
                Err(e) => return Err(e),
            }
        }

        // operating mode can only change with torque off
        for &id in &self.ids {
            self.bus.disable_torque(id)?;
            self.bus.set_operating_mode(id, OperatingMode::Position)?;
            self.bus.enable_torque(id)?;
        }

        info!("Servos initialized successfully");
        Ok(())
    }
}

impl ActuatorDriver for ServoDriver {
    fn set_angle(&mut self, channel: u8, angle: f64) -> Result<(), ActuatorError> {
        check_angle(channel, angle)?;
        self.bus
            .set_goal_position(channel, feetech::angle_to_position(angle))?;
        Ok(())
    }

    fn read_angle(&mut self, channel: u8) -> Result<Option<f64>, ActuatorError> {
        let position = self.bus.get_position(channel)?;
        Ok(Some(feetech::position_to_angle(position)))
    }

    /// Let the legs go limp
    fn relax(&mut self) -> Result<(), ActuatorError> {
        info!("Disabling torque on all servos");
        for &id in &self.ids {
            self.bus.disable_torque(id)?;
        }
        Ok(())
    }
}
