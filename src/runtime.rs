// Zenoh front end for the sequencer
// Commands arrive as JSON on the action topic and are handed to the sequencer;
// the sequencer's status is published at a fixed rate so teleop and scripts can
// tell whether the robot is homed and which gait is cycling.

use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{API_NAME, API_VERSION, LOOP_HZ, STATUS_HZ, TOPIC_CMD_ACTION, TOPIC_HEALTH};
use crate::messages::{ActionCommand, RuntimeHealth, RuntimeStatus};
use crate::sequencer::Sequencer;

pub struct Runtime {
    sequencer: Sequencer,
}

impl Runtime {
    pub fn new(sequencer: Sequencer) -> Self {
        Self { sequencer }
    }

    /// Route one command to the sequencer
    pub async fn on_command(&mut self, cmd: ActionCommand) {
        info!("Received command: {:?}", &cmd);
        match cmd.action.to_lowercase().as_str() {
            // only homes a robot that has not been homed yet
            "connect" => {
                if !self.sequencer.ready() {
                    self.sequencer.reset().await;
                }
            }
            "reset" => self.sequencer.reset().await,
            _ => {
                self.sequencer.sequence(&cmd.action, &cmd.posture, cmd.params());
            }
        }
    }

    pub fn status(&self) -> RuntimeStatus {
        let ready = self.sequencer.ready();
        RuntimeStatus {
            name: API_NAME.to_string(),
            version: API_VERSION.to_string(),
            status: if ready { RuntimeHealth::Ok } else { RuntimeHealth::NotReady },
            ready,
            state: self.sequencer.state(),
            sequence: self.sequencer.current().map(|name| name.to_string()),
        }
    }
}

pub async fn run(sequencer: Sequencer) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_ACTION).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new(sequencer);
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    let status_every = (LOOP_HZ / STATUS_HZ).max(1);
    let mut ticks: u64 = 0;

    info!("Runtime started: {}Hz command loop, {}Hz status", LOOP_HZ, STATUS_HZ);
    info!("Subscribed to: {}", TOPIC_CMD_ACTION);
    info!("Publishing to: {}", TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Handle every pending command in arrival order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ActionCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd).await;
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Publish status
        if ticks % status_every == 0 {
            let status_json = serde_json::to_string(&runtime.status())?;
            pub_health.put(status_json).await?;
        }
        ticks += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RobotConfig;
    use crate::motor::{SimulatedDriver, WriteLog};
    use crate::sequencer::{Rig, SequencerState};
    use crate::sequences::SequenceName;

    fn runtime() -> (Runtime, Sequencer, WriteLog) {
        let driver = SimulatedDriver::new();
        let log = driver.log();
        let rig = Rig::assemble(&RobotConfig::default(), Box::new(driver), Box::new(ManualClock::new())).unwrap();
        let sequencer = Sequencer::new(rig, tokio::runtime::Handle::current());
        (Runtime::new(sequencer.clone()), sequencer, log)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_connect_homes_only_once() {
        let (mut runtime, sequencer, log) = runtime();
        assert_eq!(runtime.status().status, RuntimeHealth::NotReady);

        runtime.on_command(ActionCommand::new("connect", "", 0.0, 0.0)).await;
        assert!(sequencer.ready());
        assert_eq!(log.len(), 9);

        runtime.on_command(ActionCommand::new("Connect", "", 0.0, 0.0)).await;
        assert_eq!(log.len(), 9);

        runtime.on_command(ActionCommand::new("reset", "", 0.0, 0.0)).await;
        assert_eq!(log.len(), 18);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_gait_commands_reach_the_sequencer() {
        let (mut runtime, sequencer, _log) = runtime();
        runtime.on_command(ActionCommand::new("reset", "", 0.0, 0.0)).await;

        runtime.on_command(ActionCommand::new("MOVE", "crab", 1.0, 0.0)).await;
        let status = runtime.status();
        assert_eq!(status.status, RuntimeHealth::Ok);
        assert_eq!(status.state, SequencerState::Running);
        assert_eq!(status.sequence, Some(SequenceName::MoveCrab.to_string()));

        runtime.on_command(ActionCommand::new("stop", "", 0.0, 0.0)).await;
        sequencer.wait_idle().await;
        assert_eq!(runtime.status().sequence, None);
    }
}
