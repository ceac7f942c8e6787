//! 控制面与调度线程集成测试
//!
//! 以 10 ms 周期运行真实调度线程，验证接通、故障锁存与恢复、设定值模式保持当前值。

use approx::assert_relative_eq;
use skytrim_control::{AutopilotBuilder, AutopilotConfig, ModeValue, TargetValue};
use skytrim_core::{ControlMode, ModeRegistry, TelemetryChannel, WaypointQueue};
use skytrim_io::{MockFault, MockVehicle, channels};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> AutopilotConfig {
    AutopilotConfig {
        interval_ms: 10,
        takeoff_interval_ms: 10,
        ..Default::default()
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_engaged_autopilot_runs_cycles() {
    let mock = MockVehicle::level_cruise();
    mock.set_telemetry(TelemetryChannel::BankAngle, (-5.0_f64).to_radians());
    let autopilot = AutopilotBuilder::new()
        .config(fast_config())
        .build(mock.clone())
        .unwrap();

    assert_eq!(autopilot.toggle("LVL"), Some(true));
    // 未接通总开关时不运行
    thread::sleep(Duration::from_millis(50));
    assert!(autopilot.latest_report().is_none());

    assert!(autopilot.toggle_autopilot());
    assert!(wait_until(|| autopilot.latest_report().is_some()));
    assert!(wait_until(|| mock.last_write(channels::AILERON_TRIM).is_some()));

    let state = autopilot.get_state();
    assert!(state.engaged);
    assert!(!state.faulted);
    assert_eq!(state.modes["LVL"], ModeValue::Flag(true));
    assert!(state.telemetry.is_some());

    assert!(!autopilot.toggle_autopilot());
    assert!(!autopilot.is_engaged());
}

#[test]
fn test_paused_autopilot_skips_corrections() {
    let mock = MockVehicle::level_cruise();
    let autopilot = AutopilotBuilder::new()
        .config(fast_config())
        .build(mock.clone())
        .unwrap();
    autopilot.toggle("LVL");
    autopilot.set_paused(true);
    autopilot.toggle_autopilot();

    thread::sleep(Duration::from_millis(60));
    assert!(autopilot.latest_report().is_none());
    assert!(mock.writes_to(channels::AILERON_TRIM).is_empty());

    autopilot.set_paused(false);
    assert!(wait_until(|| autopilot.latest_report().is_some()));
}

#[test]
fn test_setpoint_toggle_holds_current_heading() {
    let mock = MockVehicle::level_cruise();
    mock.set_telemetry(TelemetryChannel::Heading, 45.0_f64.to_radians());
    mock.set_telemetry(TelemetryChannel::TrueHeading, 45.0_f64.to_radians());
    let autopilot = AutopilotBuilder::new()
        .config(fast_config())
        .build(mock.clone())
        .unwrap();

    autopilot.toggle_autopilot();
    assert!(wait_until(|| autopilot.latest_report().is_some()));

    assert_eq!(autopilot.toggle("HDG"), Some(true));
    let held = autopilot.get_state().modes["HDG"].setpoint().unwrap();
    assert_relative_eq!(held, 45.0, epsilon = 1e-9);
    assert!(wait_until(|| mock.last_write(channels::HEADING_BUG).is_some()));

    assert_eq!(autopilot.toggle("HDG"), Some(false));
    assert_eq!(autopilot.get_state().modes["HDG"], ModeValue::Setpoint(None));

    assert_eq!(
        autopilot.set_target("ALT", Some(TargetValue::Number(2500.0))),
        Some(ModeValue::Setpoint(Some(2500.0)))
    );
}

#[test]
fn test_fatal_fault_latches_until_reset() {
    let mock = MockVehicle::level_cruise();
    let autopilot = AutopilotBuilder::new()
        .config(fast_config())
        .build(mock.clone())
        .unwrap();
    autopilot.toggle("LVL");
    autopilot.toggle_autopilot();
    assert!(wait_until(|| autopilot.latest_report().is_some()));

    mock.fail(MockFault::Disconnected);
    assert!(wait_until(|| autopilot.is_faulted()));
    assert!(!autopilot.is_engaged());
    // 锁存期间拒绝接通
    assert!(!autopilot.toggle_autopilot());

    mock.clear_fault();
    autopilot.reset_fault().unwrap();
    assert!(!autopilot.is_faulted());
    assert!(!autopilot.is_engaged());

    let before = autopilot.latest_report().unwrap().snapshot.timestamp;
    assert!(autopilot.toggle_autopilot());
    assert!(wait_until(|| {
        autopilot
            .latest_report()
            .is_some_and(|r| r.snapshot.timestamp > before)
    }));
}

#[test]
fn test_transient_fault_does_not_latch() {
    let mock = MockVehicle::level_cruise();
    let autopilot = AutopilotBuilder::new()
        .config(fast_config())
        .build(mock.clone())
        .unwrap();
    autopilot.toggle_autopilot();
    assert!(wait_until(|| autopilot.latest_report().is_some()));

    mock.fail(MockFault::Unavailable);
    thread::sleep(Duration::from_millis(50));
    assert!(!autopilot.is_faulted());
    assert!(autopilot.is_engaged());

    mock.clear_fault();
    let before = autopilot.latest_report().unwrap().snapshot.timestamp;
    assert!(wait_until(|| {
        autopilot
            .latest_report()
            .is_some_and(|r| r.snapshot.timestamp > before)
    }));
}

#[test]
fn test_carried_modes_survive_rebuild() {
    let mock = MockVehicle::level_cruise();
    mock.set_telemetry(TelemetryChannel::AileronTrim, 0.15);

    let mut modes = ModeRegistry::new();
    modes.engage(ControlMode::LevelFlight);
    let mut waypoints = WaypointQueue::new();
    waypoints.add(50.0, -120.0, None).unwrap();

    let autopilot = AutopilotBuilder::new()
        .config(fast_config())
        .modes(modes.clone())
        .waypoints(waypoints)
        .build(mock.clone())
        .unwrap();

    // LVL 接通时采用当前副翼配平
    assert!(wait_until(|| {
        (autopilot.get_state().anchor.aileron - 0.15).abs() < 1e-12
    }));

    let (returned_modes, returned_waypoints) = autopilot.shutdown();
    assert_eq!(returned_modes, modes);
    assert_eq!(returned_waypoints.len(), 1);
}

#[test]
fn test_state_serializes_to_json() {
    let mock = MockVehicle::level_cruise();
    let autopilot = AutopilotBuilder::new()
        .config(fast_config())
        .build(mock)
        .unwrap();
    autopilot.add_waypoint(49.0, -123.0, Some(2000.0)).unwrap();
    autopilot.toggle_autopilot();
    assert!(wait_until(|| autopilot.latest_report().is_some()));

    let json = serde_json::to_value(autopilot.get_state()).unwrap();
    assert_eq!(json["engaged"], true);
    assert_eq!(json["waypoints"].as_array().unwrap().len(), 1);
    assert!(json["modes"].get("ATO").is_some());
    assert!(json["telemetry"]["altitude"].is_number());
}
