//! 自动起飞状态机
//!
//! ```text
//! Idle ──首次运行──> GroundRoll ──达到抬轮速度/离地──> Rotate ──垂直速度超过交接门限──> Climb ──升降舵回中──> Handoff
//! ```
//!
//! - GroundRoll：收襟翼、松刹车（松刹车的周期直接返回）、锁尾轮、逐步推油门、方向舵保持起飞航向
//! - Rotate：一次性拉杆（按重量插值），接通 VSH 并设定交接高度，预置升降舵锚点
//! - Climb：收轮、方向舵回中，接通 VSH/ALT/LVL，升降舵逐步回中
//! - Handoff：升降舵回中后断开 ATO
//!
//! 状态机只通过 [`ModeCommand`] 修改模式：请求先排入状态机内部，引擎在周期成功后
//! 用 [`AutoTakeoff::take_output`] 取走并统一应用。一次性动作（拉杆、收轮）只在
//! 写入成功后才置位，周期被放弃时已完成的动作不会重复，已排队的请求也不会丢失。

use crate::config::TakeoffGains;
use serde::{Deserialize, Serialize};
use skytrim_core::{ControlMode, TelemetrySnapshot, bounded_lerp, compass_diff};
use skytrim_io::{IoError, VehicleIo, channels};
use std::fmt;
use tracing::{debug, info};

/// 起飞阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TakeoffPhase {
    #[default]
    Idle,
    GroundRoll,
    Rotate,
    Climb,
    Handoff,
}

impl fmt::Display for TakeoffPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TakeoffPhase::Idle => "idle",
            TakeoffPhase::GroundRoll => "ground roll",
            TakeoffPhase::Rotate => "rotate",
            TakeoffPhase::Climb => "climb",
            TakeoffPhase::Handoff => "handoff",
        };
        f.write_str(name)
    }
}

/// 起飞状态机请求的模式变更
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModeCommand {
    Engage(ControlMode),
    Disengage(ControlMode),
    SetTarget(ControlMode, f64),
}

/// 待应用的起飞请求
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TakeoffOutput {
    /// 按顺序应用的模式变更
    pub commands: Vec<ModeCommand>,
    /// 抬轮时的升降舵锚点预置（在模式变更之后应用）
    pub elevator_bias: Option<f64>,
}

/// 自动起飞状态
///
/// 每次接通 ATO 时重新创建。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoTakeoff {
    phase: TakeoffPhase,
    takeoff_heading: Option<f64>,
    lifted_off: bool,
    leveled_out: bool,
    ease_elevator: Option<f64>,
    pending: TakeoffOutput,
}

impl AutoTakeoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TakeoffPhase {
        self.phase
    }

    /// 记录的起飞航向（度）
    pub fn takeoff_heading(&self) -> Option<f64> {
        self.takeoff_heading
    }

    pub fn is_lifted_off(&self) -> bool {
        self.lifted_off
    }

    pub fn is_leveled_out(&self) -> bool {
        self.leveled_out
    }

    /// 取走已排队的模式变更与升降舵预置
    pub fn take_output(&mut self) -> TakeoffOutput {
        std::mem::take(&mut self.pending)
    }

    fn enter(&mut self, phase: TakeoffPhase) {
        if self.phase != phase {
            info!("Takeoff phase: {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// 执行一个起飞周期
    ///
    /// 直接驱动油门、刹车、方向舵、襟翼与升降舵；模式变更排队等待 [`Self::take_output`]。
    pub fn run<V: VehicleIo + ?Sized>(
        &mut self,
        io: &mut V,
        snapshot: &TelemetrySnapshot,
        gains: &TakeoffGains,
    ) -> Result<(), IoError> {
        if self.phase == TakeoffPhase::Idle {
            self.enter(TakeoffPhase::GroundRoll);
        }

        let weight = io.read(channels::TOTAL_WEIGHT)?;
        let stall_speed = io.read(channels::DESIGN_SPEED_VS1)?;

        if !self.lifted_off && !self.prepare_roll(io, gains)? {
            return Ok(());
        }

        let heading = snapshot.heading_deg();
        let takeoff_heading = match self.takeoff_heading {
            Some(h) => h,
            None => {
                info!("Takeoff heading {:.1}°", heading);
                self.takeoff_heading = Some(heading);
                self.pending
                    .commands
                    .push(ModeCommand::SetTarget(ControlMode::Heading, heading));
                heading
            },
        };

        if snapshot.on_ground {
            let factor = match stall_speed {
                Some(vs1) if vs1 > 0.0 => bounded_lerp(
                    vs1 * vs1,
                    gains.stall_speed_sq_lo,
                    gains.stall_speed_sq_hi,
                    gains.min_rudder_factor,
                    gains.max_rudder_factor,
                ),
                _ => gains.default_rudder_factor,
            };
            let correction = factor * compass_diff(heading, takeoff_heading);
            io.write(
                channels::RUDDER_POSITION,
                ground_rudder(correction, snapshot.airspeed),
            )?;
        } else if let Some(rudder) = io.read(channels::RUDDER_POSITION)? {
            io.write(channels::RUDDER_POSITION, rudder / 2.0)?;
        }

        let Some(weight) = weight else {
            debug!("TOTAL_WEIGHT unavailable, holding takeoff phase");
            return Ok(());
        };
        let by_weight = |lo: f64, hi: f64| bounded_lerp(weight, gains.weight_lo, gains.weight_hi, lo, hi);
        let vs = snapshot.vertical_speed;

        if let Some(min_rotate) = io.read(channels::DESIGN_SPEED_MIN_ROTATION)? {
            let rotate_speed = gains.rotate_factor * min_rotate;
            if !snapshot.on_ground || snapshot.airspeed > rotate_speed {
                let elevator = io.read(channels::ELEVATOR_POSITION)?.unwrap_or(0.0);

                if self.leveled_out && vs.abs() < gains.level_vs {
                    if elevator < gains.release_elevator {
                        self.enter(TakeoffPhase::Handoff);
                        self.pending
                            .commands
                            .push(ModeCommand::Disengage(ControlMode::AutoTakeoff));
                    } else {
                        let base = self.ease_elevator.filter(|e| *e > 0.0).unwrap_or(elevator);
                        let ease = base / gains.ease_divisor;
                        debug!("Easing elevator {:.4} by {:.4}", elevator, ease);
                        io.write(channels::ELEVATOR_POSITION, elevator - ease)?;
                    }
                } else if self.lifted_off && vs > gains.climb_ease_vs && elevator > 0.0 {
                    debug!("Climbing too fast, easing elevator {:.4}", elevator);
                    io.write(
                        channels::ELEVATOR_POSITION,
                        elevator / gains.climb_ease_divisor,
                    )?;
                } else if !self.lifted_off {
                    let pull_back = by_weight(gains.min_pull_back, gains.max_pull_back);
                    info!(
                        "Rotating at {:.1} kt (vr {:.1}), elevator {:.3}",
                        snapshot.airspeed, rotate_speed, pull_back
                    );
                    io.write(channels::ELEVATOR_POSITION, pull_back)?;
                    self.lifted_off = true;
                    let out = &mut self.pending;
                    out.commands
                        .push(ModeCommand::Engage(ControlMode::VerticalSpeedHold));
                    out.commands.push(ModeCommand::SetTarget(
                        ControlMode::AltitudeHold,
                        gains.handoff_altitude,
                    ));
                    out.elevator_bias =
                        Some(by_weight(gains.min_elevator_bias, gains.max_elevator_bias));
                    self.enter(TakeoffPhase::Rotate);
                }
            }
        }

        let handoff_vs = by_weight(gains.min_handoff_vs, gains.max_handoff_vs);
        if !self.leveled_out && vs > handoff_vs {
            let ease_elevator = io.read(channels::ELEVATOR_POSITION)?;
            io.write(channels::RUDDER_POSITION, 0.0)?;
            io.write(channels::FLAPS_HANDLE_INDEX, 0.0)?;
            io.trigger(channels::EVENT_GEAR_UP)?;
            self.leveled_out = true;
            self.ease_elevator = ease_elevator;
            let out = &mut self.pending;
            out.commands
                .push(ModeCommand::Engage(ControlMode::VerticalSpeedHold));
            out.commands.push(ModeCommand::SetTarget(
                ControlMode::AltitudeHold,
                gains.handoff_altitude,
            ));
            out.commands
                .push(ModeCommand::Engage(ControlMode::LevelFlight));
            self.enter(TakeoffPhase::Climb);
        }

        Ok(())
    }

    /// 地面滑跑准备
    ///
    /// 返回 `false` 表示本周期刚松开停机刹车，应直接结束。
    fn prepare_roll<V: VehicleIo + ?Sized>(
        &mut self,
        io: &mut V,
        gains: &TakeoffGains,
    ) -> Result<bool, IoError> {
        if let Some(flaps) = io.read(channels::FLAPS_HANDLE_INDEX)?
            && flaps != 0.0
        {
            io.write(channels::FLAPS_HANDLE_INDEX, 0.0)?;
        }

        if io.read(channels::BRAKE_PARKING_POSITION)? == Some(1.0) {
            info!("Releasing parking brake");
            io.trigger(channels::EVENT_PARKING_BRAKES)?;
            return Ok(false);
        }

        if io.read(channels::IS_TAIL_DRAGGER)? == Some(1.0)
            && io.read(channels::TAILWHEEL_LOCK_ON)? == Some(0.0)
        {
            info!("Locking tailwheel");
            io.trigger(channels::EVENT_TOGGLE_TAILWHEEL_LOCK)?;
        }

        let engines = io.read(channels::NUMBER_OF_ENGINES)?.unwrap_or(0.0);
        for engine in 1..=(engines.max(0.0) as u32) {
            let lever = channels::throttle_lever(engine);
            if let Some(throttle) = io.read(&lever)?
                && throttle < 100.0
            {
                io.write(&lever, (throttle + gains.throttle_step).min(100.0))?;
            }
        }

        Ok(true)
    }
}

/// 地面方向舵：速度越低需要的舵量越大
fn ground_rudder(correction: f64, speed: f64) -> f64 {
    if speed > 60.0 {
        bounded_lerp(speed, 60.0, 100.0, 0.5 * correction, 0.2 * correction)
    } else if speed > 40.0 {
        bounded_lerp(speed, 40.0, 60.0, 0.8 * correction, 0.5 * correction)
    } else if speed > 20.0 {
        bounded_lerp(speed, 20.0, 40.0, 1.2 * correction, 0.8 * correction)
    } else {
        correction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use skytrim_core::{RawTelemetry, TelemetryChannel};
    use skytrim_io::MockVehicle;

    fn snapshot_from(mock: &mut MockVehicle) -> TelemetrySnapshot {
        let mut raw = RawTelemetry::new();
        for channel in TelemetryChannel::ALL {
            raw.set(channel, mock.read(channel.sim_var()).unwrap());
        }
        TelemetrySnapshot::build(&raw, 0.0, None).unwrap()
    }

    #[test]
    fn test_ground_rudder_bands() {
        assert_relative_eq!(ground_rudder(1.0, 10.0), 1.0);
        assert_relative_eq!(ground_rudder(1.0, 30.0), 1.0);
        assert_relative_eq!(ground_rudder(1.0, 50.0), 0.65);
        assert_relative_eq!(ground_rudder(1.0, 100.0), 0.2);
    }

    #[test]
    fn test_parking_brake_release_ends_cycle() {
        let mut mock = MockVehicle::on_runway();
        mock.set(channels::BRAKE_PARKING_POSITION, 1.0);
        let snapshot = snapshot_from(&mut mock);

        let mut takeoff = AutoTakeoff::new();
        takeoff.run(&mut mock, &snapshot, &TakeoffGains::default()).unwrap();
        let out = takeoff.take_output();

        assert!(out.commands.is_empty());
        assert_eq!(mock.triggers(), vec![channels::EVENT_PARKING_BRAKES.to_string()]);
        assert!(mock.writes_to(&channels::throttle_lever(1)).is_empty());
        assert_eq!(takeoff.takeoff_heading(), None);
    }

    #[test]
    fn test_ground_roll_throttles_up_and_records_heading() {
        let mut mock = MockVehicle::on_runway();
        mock.set(&channels::throttle_lever(1), 97.0);
        mock.set(channels::FLAPS_HANDLE_INDEX, 1.0);
        let snapshot = snapshot_from(&mut mock);

        let mut takeoff = AutoTakeoff::new();
        takeoff.run(&mut mock, &snapshot, &TakeoffGains::default()).unwrap();
        let out = takeoff.take_output();

        assert_eq!(takeoff.phase(), TakeoffPhase::GroundRoll);
        assert_eq!(mock.last_write(&channels::throttle_lever(1)), Some(100.0));
        assert_eq!(mock.last_write(channels::FLAPS_HANDLE_INDEX), Some(0.0));
        assert_eq!(
            out.commands,
            vec![ModeCommand::SetTarget(ControlMode::Heading, 0.0)]
        );
        // 尚未达到抬轮速度
        assert!(mock.writes_to(channels::ELEVATOR_POSITION).is_empty());
    }

    #[test]
    fn test_tail_dragger_locks_tailwheel() {
        let mut mock = MockVehicle::on_runway();
        mock.set(channels::IS_TAIL_DRAGGER, 1.0);
        let snapshot = snapshot_from(&mut mock);

        AutoTakeoff::new()
            .run(&mut mock, &snapshot, &TakeoffGains::default())
            .unwrap();
        assert_eq!(mock.value(channels::TAILWHEEL_LOCK_ON), Some(1.0));
    }

    #[test]
    fn test_rotates_exactly_once() {
        let gains = TakeoffGains::default();
        let mut mock = MockVehicle::on_runway();
        mock.set_telemetry(TelemetryChannel::Airspeed, 70.0);
        let mut takeoff = AutoTakeoff::new();

        let snapshot = snapshot_from(&mut mock);
        takeoff.run(&mut mock, &snapshot, &gains).unwrap();
        let out = takeoff.take_output();

        let kick = bounded_lerp(4000.0, 3000.0, 6500.0, 0.005, 0.5);
        assert_eq!(takeoff.phase(), TakeoffPhase::Rotate);
        assert_eq!(mock.writes_to(channels::ELEVATOR_POSITION), vec![kick]);
        assert!(out.commands.contains(&ModeCommand::Engage(ControlMode::VerticalSpeedHold)));
        assert!(out.commands.contains(&ModeCommand::SetTarget(ControlMode::AltitudeHold, 1500.0)));
        assert_relative_eq!(out.elevator_bias.unwrap(), bounded_lerp(4000.0, 3000.0, 6500.0, 0.0, 0.1));

        // 仍在地面、速度更高：不再拉杆
        mock.set_telemetry(TelemetryChannel::Airspeed, 80.0);
        let snapshot = snapshot_from(&mut mock);
        takeoff.run(&mut mock, &snapshot, &gains).unwrap();
        let out = takeoff.take_output();
        assert_eq!(mock.writes_to(channels::ELEVATOR_POSITION).len(), 1);
        assert_eq!(out.elevator_bias, None);
    }

    #[test]
    fn test_requests_queue_until_taken() {
        let gains = TakeoffGains::default();
        let mut mock = MockVehicle::on_runway();
        mock.set_telemetry(TelemetryChannel::Airspeed, 70.0);
        let mut takeoff = AutoTakeoff::new();

        // 抬轮周期的请求未被取走（周期被放弃），下一周期不再拉杆，请求仍在队列中
        let snapshot = snapshot_from(&mut mock);
        takeoff.run(&mut mock, &snapshot, &gains).unwrap();
        takeoff.run(&mut mock, &snapshot, &gains).unwrap();

        assert_eq!(mock.writes_to(channels::ELEVATOR_POSITION).len(), 1);
        let out = takeoff.take_output();
        assert_eq!(
            out.commands,
            vec![
                ModeCommand::SetTarget(ControlMode::Heading, 0.0),
                ModeCommand::Engage(ControlMode::VerticalSpeedHold),
                ModeCommand::SetTarget(ControlMode::AltitudeHold, 1500.0),
            ]
        );
        assert!(out.elevator_bias.is_some());
        assert_eq!(takeoff.take_output(), TakeoffOutput::default());
    }

    #[test]
    fn test_climb_out_hands_off_to_autopilot() {
        let gains = TakeoffGains::default();
        let mut mock = MockVehicle::on_runway();
        mock.set_telemetry(TelemetryChannel::Airspeed, 70.0);
        let mut takeoff = AutoTakeoff::new();
        let snapshot = snapshot_from(&mut mock);
        takeoff.run(&mut mock, &snapshot, &gains).unwrap();
        takeoff.take_output();

        // 离地，以 900 ft/min 爬升（4000 lb 门限为 500）
        mock.set_telemetry(TelemetryChannel::OnGround, 0.0);
        mock.set_telemetry(TelemetryChannel::VerticalSpeed, 15.0);
        let snapshot = snapshot_from(&mut mock);
        takeoff.run(&mut mock, &snapshot, &gains).unwrap();
        let out = takeoff.take_output();

        assert_eq!(takeoff.phase(), TakeoffPhase::Climb);
        assert!(takeoff.is_leveled_out());
        assert_eq!(mock.triggers(), vec![channels::EVENT_GEAR_UP.to_string()]);
        assert_eq!(mock.last_write(channels::RUDDER_POSITION), Some(0.0));
        assert_eq!(
            out.commands,
            vec![
                ModeCommand::Engage(ControlMode::VerticalSpeedHold),
                ModeCommand::SetTarget(ControlMode::AltitudeHold, 1500.0),
                ModeCommand::Engage(ControlMode::LevelFlight),
            ]
        );

        // 改平，升降舵已回中：断开 ATO
        mock.set_telemetry(TelemetryChannel::VerticalSpeed, 0.0);
        mock.set(channels::ELEVATOR_POSITION, 0.01);
        let snapshot = snapshot_from(&mut mock);
        takeoff.run(&mut mock, &snapshot, &gains).unwrap();
        let out = takeoff.take_output();
        assert_eq!(takeoff.phase(), TakeoffPhase::Handoff);
        assert_eq!(
            out.commands,
            vec![ModeCommand::Disengage(ControlMode::AutoTakeoff)]
        );
    }

    #[test]
    fn test_missing_weight_holds_phase() {
        let mut mock = MockVehicle::on_runway();
        mock.unset(channels::TOTAL_WEIGHT);
        mock.set_telemetry(TelemetryChannel::Airspeed, 90.0);
        let snapshot = snapshot_from(&mut mock);

        let mut takeoff = AutoTakeoff::new();
        takeoff.run(&mut mock, &snapshot, &TakeoffGains::default()).unwrap();
        assert!(!takeoff.is_lifted_off());
        assert!(mock.writes_to(channels::ELEVATOR_POSITION).is_empty());
    }
}
