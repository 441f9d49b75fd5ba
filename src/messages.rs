// Message types exchanged with the runtime over zenoh

use serde::{Deserialize, Serialize};

use crate::sequencer::SequencerState;
use crate::sequences::MoveParams;

// Command from teleop/scripts -> runtime
// action is "connect", "reset", or a gait action ("posture", "move", "stop")
// matched case-insensitively; posture is empty when the action needs none
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub action: String,
    #[serde(default)]
    pub posture: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl ActionCommand {
    pub fn new(action: &str, posture: &str, x: f64, y: f64) -> Self {
        Self {
            action: action.to_string(),
            posture: posture.to_string(),
            x,
            y,
        }
    }

    pub fn params(&self) -> MoveParams {
        MoveParams::new(self.x, self.y)
    }
}

/// Coarse health published by the runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    NotReady,
}

// Status from runtime -> whoever is listening
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeStatus {
    pub name: String,
    pub version: String,
    pub status: RuntimeHealth,
    pub ready: bool,
    pub state: SequencerState,
    pub sequence: Option<String>,
}
