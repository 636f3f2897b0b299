//! 驱动层集成测试
//!
//! 通过固件模拟器验证 `RobotClient` 的完整往返。

use armlink_driver::{DriverError, RobotBuilder};
use armlink_protocol::{ActionId, ArmRequest, JointsAngles, RobotErrorCode};
use armlink_serial::mock::SimulatedArm;
use std::thread;

#[test]
fn test_move_returns_observed_angles() {
    let arm = SimulatedArm::calibrated();
    let robot = RobotBuilder::new().build_with(arm.clone()).unwrap();
    let client = robot.client();

    let target = JointsAngles::new(12.34, -5.0, 7.77, 90.4, 10.6);
    let observed = client.move_to(target).unwrap();

    assert_eq!(observed.v, 90.0);
    assert_eq!(observed.w, 11.0);
    assert_eq!(client.current_position().unwrap(), observed);
    assert_eq!(arm.requests()[0], ArmRequest::Move(target));
}

#[test]
fn test_device_errors_are_returned_verbatim() {
    let arm = SimulatedArm::new();
    let robot = RobotBuilder::new().build_with(arm.clone()).unwrap();
    let client = robot.client();

    let err = client.move_to(JointsAngles::default()).unwrap_err();
    match err {
        DriverError::Robot(error) => {
            assert_eq!(error.code, RobotErrorCode::ARM_NOT_CALIBRATED);
            assert_eq!(error.message, Some("Arm is not calibrated."));
        },
        other => panic!("unexpected error: {other}"),
    }

    // 不重试
    assert_eq!(arm.count(ActionId::Move), 1);
}

#[test]
fn test_calibration_round_trips() {
    let arm = SimulatedArm::new();
    let robot = RobotBuilder::new().build_with(arm.clone()).unwrap();
    let client = robot.client();

    assert!(!client.is_calibrated().unwrap());
    client.start_calibration().unwrap();
    client.move_to(JointsAngles::new(1.0, 1.0, 1.0, 0.0, 0.0)).unwrap();
    client.finish_calibration().unwrap();
    assert!(client.is_calibrated().unwrap());

    // 已离开标定模式
    assert!(client.abort_calibration().is_err());
}

#[test]
fn test_speed_limits_surface_as_robot_errors() {
    let arm = SimulatedArm::calibrated();
    let robot = RobotBuilder::new().build_with(arm).unwrap();
    let client = robot.client();

    let err = client.set_speed(5000.0).unwrap_err();
    assert_eq!(
        err.robot_error().map(|error| error.code),
        Some(RobotErrorCode::BEYOND_MAX_SPEED_LIMIT)
    );
    client.set_speed(500.0).unwrap();
}

#[test]
fn test_concurrent_clients_are_serialized() {
    let arm = SimulatedArm::calibrated();
    let robot = RobotBuilder::new().build_with(arm.clone()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let client = robot.client();
            thread::spawn(move || {
                for _ in 0..25 {
                    let angle = i as f32;
                    let observed = client
                        .move_to(JointsAngles::new(0.0, 0.0, 0.0, angle, angle))
                        .unwrap();
                    // 每个应答都对应自己的请求
                    assert_eq!(observed.v, angle);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(arm.count(ActionId::Move), 100);
}

#[test]
fn test_disconnected_serial_link() {
    let arm = SimulatedArm::calibrated();
    let robot = RobotBuilder::new().build_with(arm.clone()).unwrap();
    let client = robot.client();

    arm.disconnect();
    assert!(matches!(
        client.open_gripper(),
        Err(DriverError::Serial(armlink_serial::SerialError::Disconnected))
    ));
    assert!(!client.is_idle());
}
