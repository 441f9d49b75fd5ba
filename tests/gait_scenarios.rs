// End-to-end gait scenarios against the stock robot with simulated servos

use hexapod_zenoh_runtime::clock::ManualClock;
use hexapod_zenoh_runtime::config::RobotConfig;
use hexapod_zenoh_runtime::leg::{Joint, JointId, JointMapping, Leg, LegPosition, Position, ServoAngles};
use hexapod_zenoh_runtime::motor::{SimulatedDriver, WriteLog};
use hexapod_zenoh_runtime::sequencer::{Rig, Sequencer, SequencerState};
use hexapod_zenoh_runtime::sequences::{GaitConfig, MoveParams, SequenceName};

fn rig() -> (Rig, WriteLog) {
    let driver = SimulatedDriver::new();
    let log = driver.log();
    let rig = Rig::assemble(&RobotConfig::default(), Box::new(driver), Box::new(ManualClock::new())).unwrap();
    (rig, log)
}

fn solve(leg: LegPosition, x: f64, y: f64, z: f64) -> ServoAngles {
    Leg::new(leg, 72.0, 125.0, JointMapping::default()).move_leg(x, y, z).unwrap()
}

fn angles(rig: &Rig, leg: LegPosition) -> [f64; 3] {
    Joint::ALL.map(|joint| rig.chain.angle(JointId::new(leg, joint)).unwrap())
}

#[tokio::test(flavor = "multi_thread")]
async fn reset_then_sit() {
    let (rig, log) = rig();
    let sequencer = Sequencer::new(rig, tokio::runtime::Handle::current());

    sequencer.reset().await;
    sequencer.with_rig(|rig| {
        for leg in LegPosition::RIGHT {
            assert_eq!(angles(rig, leg), [90.0, 90.0, 90.0]);
        }
    });

    sequencer.sequence("posture", "sit", MoveParams::default()).unwrap();
    sequencer.wait_idle().await;
    assert_eq!(sequencer.state(), SequencerState::Ready);

    let sit = solve(LegPosition::RightFront, 90.0, 0.0, 0.0);
    sequencer.with_rig(|rig| {
        for leg in LegPosition::RIGHT {
            assert_eq!(angles(rig, leg), [sit.shoulder, sit.main, sit.foot]);
        }
    });

    // the pose holds: nothing else gets written
    let settled = log.len();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert_eq!(log.len(), settled);
    assert_eq!(log.last_angle(0), Some(sit.shoulder));
    assert_eq!(log.last_angle(8), Some(sit.foot));
}

#[test]
fn walk_stride_first_phase() {
    let phases = SequenceName::MoveWalk.phases(&GaitConfig::default(), MoveParams::new(0.0, 2.0));
    assert_eq!(phases[0].target(LegPosition::RightFront), Some(Position::new(63.0, 82.0, -40.0)));

    let (mut rig, _log) = rig();
    rig.chain.reset();
    phases[0].perform(&mut rig.legs, &mut rig.chain).unwrap();

    let expected = solve(LegPosition::RightFront, 63.0, 82.0, -40.0);
    assert_eq!(
        angles(&rig, LegPosition::RightFront),
        [expected.shoulder, expected.main, expected.foot]
    );
}

#[test]
fn every_gait_completes_a_pass() {
    let (mut rig, _log) = rig();
    rig.chain.reset();
    let params = MoveParams::new(-3.0, 3.0);

    for name in SequenceName::ALL {
        let repeat = name.run(&mut rig, params).unwrap();
        assert_eq!(repeat, name.repeats(params), "{}", name);
    }
}
