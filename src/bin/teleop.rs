// Keyboard teleop: 1-4 postures, WASD speed, space stop, C connect, R reset, Q quit
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;

use hexapod_zenoh_runtime::config::TOPIC_CMD_ACTION;
use hexapod_zenoh_runtime::messages::ActionCommand;
use hexapod_zenoh_runtime::sequences::STOCK_SPEED_LIMIT;

// stays where every stock gait target is reachable
const MAX_SPEED: f64 = STOCK_SPEED_LIMIT;
const POSTURES: [&str; 4] = ["sit", "walk", "crab", "run"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_ACTION).await?;

    info!("Controls: 1-4=sit/walk/crab/run, WASD=speed, SPACE=stop, C=connect, R=reset, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn send(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: ActionCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Sending {} {} ({}, {})", cmd.action, cmd.posture, cmd.x, cmd.y);
    publisher.put(serde_json::to_string(&cmd)?).await?;
    Ok(())
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // gait family used by the next move command
    let mut family = "walk";
    let mut x = 0.0;
    let mut y = 0.0;

    loop {
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let step = |speed: f64, by: f64| -> f64 { (speed + by).clamp(-MAX_SPEED, MAX_SPEED) };
        let cmd = match code {
            KeyCode::Char(c @ '1'..='4') => {
                let posture = POSTURES[c as usize - '1' as usize];
                if posture != "sit" {
                    family = posture;
                }
                x = 0.0;
                y = 0.0;
                ActionCommand::new("posture", posture, 0.0, 0.0)
            }
            KeyCode::Char('w') => {
                x = step(x, 1.0);
                ActionCommand::new("move", family, x, y)
            }
            KeyCode::Char('s') => {
                x = step(x, -1.0);
                ActionCommand::new("move", family, x, y)
            }
            KeyCode::Char('a') => {
                y = step(y, 1.0);
                ActionCommand::new("move", family, x, y)
            }
            KeyCode::Char('d') => {
                y = step(y, -1.0);
                ActionCommand::new("move", family, x, y)
            }
            KeyCode::Char(' ') => {
                x = 0.0;
                y = 0.0;
                ActionCommand::new("stop", "", 0.0, 0.0)
            }
            KeyCode::Char('c') => ActionCommand::new("connect", "", 0.0, 0.0),
            KeyCode::Char('r') => ActionCommand::new("reset", "", 0.0, 0.0),
            KeyCode::Char('q') | KeyCode::Esc => break,
            _ => continue,
        };
        send(publisher, cmd).await?;
    }

    Ok(())
}
