// Robot configuration, topics and runtime constants
//
// The robot's geometry, wiring, calibration and gait constants are loaded from
// a JSON file; anything left out falls back to the stock hexapod below.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::ActuatorBinding;
use crate::leg::{Joint, JointMapping, LegPosition};
use crate::motor::feetech::DEFAULT_BAUDRATE;
use crate::sequences::GaitConfig;

pub const API_NAME: &str = "hexapod";
pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

// Command loop frequency
pub const LOOP_HZ: u64 = 50;

// Status publish rate
pub const STATUS_HZ: u64 = 5;

// Zenoh topics
pub const TOPIC_CMD_ACTION: &str = "hexapod/cmd/action"; // gait commands
pub const TOPIC_HEALTH: &str = "hexapod/state/health"; // sequencer status

// Serial port for the Feetech servo bus
pub const SERVO_PORT: &str = "/dev/ttyUSB0";

// Stock leg segments (mm): shoulder side, foot side
pub const SEGMENT_L1: f64 = 72.0;
pub const SEGMENT_L2: f64 = 125.0;

pub const HOME_ANGLE: f64 = 90.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Servo bindings of one leg's joints
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegJoints {
    pub shoulder: ActuatorBinding,
    pub main: ActuatorBinding,
    pub foot: ActuatorBinding,
}

impl LegJoints {
    /// Three consecutive channels starting at `first`, all homed at `home`
    pub fn consecutive(first: u8, home: f64) -> Self {
        let at = |offset: u8| ActuatorBinding {
            channel: first + offset,
            home,
        };
        Self {
            shoulder: at(0),
            main: at(1),
            foot: at(2),
        }
    }

    pub fn get(&self, joint: Joint) -> ActuatorBinding {
        match joint {
            Joint::Shoulder => self.shoulder,
            Joint::Main => self.main,
            Joint::Foot => self.foot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegConfig {
    pub position: LegPosition,
    pub l1: f64,
    pub l2: f64,
    #[serde(default)]
    pub mapping: JointMapping,
    /// Unwired legs are modelled but never driven
    #[serde(default)]
    pub joints: Option<LegJoints>,
}

impl LegConfig {
    fn stock(position: LegPosition) -> Self {
        let joints = match position {
            LegPosition::RightFront => Some(LegJoints::consecutive(0, HOME_ANGLE)),
            LegPosition::RightMiddle => Some(LegJoints::consecutive(3, HOME_ANGLE)),
            LegPosition::RightBack => Some(LegJoints::consecutive(6, HOME_ANGLE)),
            _ => None,
        };
        Self {
            position,
            l1: SEGMENT_L1,
            l2: SEGMENT_L2,
            mapping: JointMapping::default(),
            joints,
        }
    }
}

/// Stepping rate and limits of `Chain::play`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Time between interpolation steps
    pub tick_ms: u64,
    /// How long a phase may run past its longest move before timing out
    pub timeout_margin_ms: u64,
    /// Hard cap on steps per phase
    pub max_iterations: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_ms: 2,
            timeout_margin_ms: 1000,
            max_iterations: 100_000,
        }
    }
}

impl PlaybackConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn timeout_margin(&self) -> Duration {
        Duration::from_millis(self.timeout_margin_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Set to false to simulate the servos
    pub enabled: bool,
    pub port: String,
    pub baudrate: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: SERVO_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub legs: Vec<LegConfig>,
    pub gaits: GaitConfig,
    pub playback: PlaybackConfig,
    pub driver: DriverConfig,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            legs: LegPosition::ALL.into_iter().map(LegConfig::stock).collect(),
            gaits: GaitConfig::default(),
            playback: PlaybackConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl RobotConfig {
    /// Read and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a configuration layered over the stock robot
    ///
    /// Objects merge field by field at any depth, so `{"gaits":{"walk":{"lift_z":-50}}}`
    /// changes one value. Arrays such as `legs` replace the stock list whole.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let overrides: Value = serde_json::from_str(text)?;
        let mut merged = serde_json::to_value(Self::default())?;
        merge(&mut merged, overrides);

        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn leg(&self, position: LegPosition) -> Option<&LegConfig> {
        self.legs.iter().find(|leg| leg.position == position)
    }

    /// Every servo channel in use, in leg order
    pub fn channels(&self) -> Vec<u8> {
        self.legs
            .iter()
            .filter_map(|leg| leg.joints)
            .flat_map(|joints| Joint::ALL.map(|joint| joints.get(joint).channel))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let mut positions = HashSet::new();
        for leg in &self.legs {
            if !positions.insert(leg.position) {
                return invalid(format!("leg {:?} configured twice", leg.position));
            }
            if !(leg.l1 > 0.0 && leg.l2 > 0.0) {
                return invalid(format!("leg {:?} segments must be positive", leg.position));
            }
            if let Some(joints) = leg.joints {
                for joint in Joint::ALL {
                    let home = joints.get(joint).home;
                    if !(0.0..=180.0).contains(&home) {
                        return invalid(format!("leg {:?} {:?} home {} must be 0-180", leg.position, joint, home));
                    }
                }
            }
        }
        if let Some(missing) = LegPosition::ALL.into_iter().find(|p| !positions.contains(p)) {
            return invalid(format!("leg {:?} is missing", missing));
        }

        let mut channels = HashSet::new();
        for channel in self.channels() {
            if !channels.insert(channel) {
                return invalid(format!("channel {} bound twice", channel));
            }
        }

        if self.playback.tick_ms == 0 || self.playback.max_iterations == 0 {
            return invalid("playback tick and iteration budget must be non-zero".to_string());
        }
        Ok(())
    }
}

fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}
