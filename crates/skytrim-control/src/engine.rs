//! 控制引擎
//!
//! 单线程、无锁：调用方（调度线程或测试）持有引擎与模式/航路点，逐周期调用 [`ControlEngine::tick`]。
//!
//! 一个周期：
//!
//! 1. 采样全部遥测通道并构建快照（缺失必需通道 → 放弃本周期，状态不变）
//! 2. 航路点：丢弃已到达的队首，得到本周期的航向覆盖
//! 3. ATO（如接通）
//! 4. LVL：标准或特技变体，写副翼配平
//! 5. VSH：标准或特技变体，写升降舵配平
//! 6. 全部成功后提交锚点与前一快照，再应用起飞状态机排队的模式变更与升降舵预置
//!
//! 起飞状态机直接在引擎持有的状态上运行：一次性动作在写入成功后即置位，
//! 排队的请求在周期被放弃时保留到下一个成功周期。第 6 步中单个副作用的
//! 暂时性失败只记录警告，其余变更照常应用；硬故障在全部应用后再上报。
//!
//! 任一 I/O 失败都放弃本周期；硬故障（[`IoError::is_fatal`]）使引擎进入故障态，
//! 之后所有 `tick` 返回 [`ControlError::Faulted`]，直到 [`ControlEngine::reset_fault`]。

use crate::config::AutopilotConfig;
use crate::error::ControlError;
use crate::routines::takeoff::{AutoTakeoff, ModeCommand, TakeoffOutput, TakeoffPhase};
use crate::routines::{acrobatic, level, vertical, waypoint};
use serde::Serialize;
use skytrim_core::{
    Axis, ControlMode, ModeRegistry, ModeTransition, RawTelemetry, TargetValue, TelemetryChannel,
    TelemetrySnapshot, TrimAnchor, TrimLimits, WaypointQueue,
};
use skytrim_io::{IoError, VehicleIo, channels};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// 一个成功周期的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub snapshot: TelemetrySnapshot,
    pub anchor: TrimAnchor,
    /// 本周期生效的航向目标（度，航路点优先）
    pub heading_target: Option<f64>,
    /// 本周期的目标垂直速度（ft/min），VSH 未接通时为 `None`
    pub vertical_speed_target: Option<f64>,
    /// ATO 接通时的起飞阶段
    pub takeoff_phase: Option<TakeoffPhase>,
}

/// 控制引擎
pub struct ControlEngine<V: VehicleIo> {
    vehicle: V,
    config: AutopilotConfig,
    anchor: TrimAnchor,
    previous: Option<TelemetrySnapshot>,
    takeoff: AutoTakeoff,
    /// 特技垂直例程的参考垂直速度（上一周期，ft/min）
    vs_reference: Option<f64>,
    last_aileron_write: Option<f64>,
    faulted: bool,
}

impl<V: VehicleIo> ControlEngine<V> {
    pub fn new(vehicle: V, config: AutopilotConfig) -> Self {
        Self {
            vehicle,
            config,
            anchor: TrimAnchor::default(),
            previous: None,
            takeoff: AutoTakeoff::new(),
            vs_reference: None,
            last_aileron_write: None,
            faulted: false,
        }
    }

    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    pub fn anchor(&self) -> TrimAnchor {
        self.anchor
    }

    /// 最近一次成功周期的快照
    pub fn previous(&self) -> Option<&TelemetrySnapshot> {
        self.previous.as_ref()
    }

    pub fn takeoff(&self) -> &AutoTakeoff {
        &self.takeoff
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// 清除故障态（外部确认连接恢复后调用）
    pub fn reset_fault(&mut self) {
        if self.faulted {
            info!("Engine fault cleared");
        }
        self.faulted = false;
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut V {
        &mut self.vehicle
    }

    pub fn into_vehicle(self) -> V {
        self.vehicle
    }

    /// 下一周期的调度间隔（ATO 接通时更快）
    pub fn interval(&self, modes: &ModeRegistry) -> Duration {
        if modes.is_engaged(ControlMode::AutoTakeoff) {
            self.config.takeoff_interval()
        } else {
            self.config.interval()
        }
    }

    /// 执行一个控制周期
    ///
    /// `now` 为单调时钟秒数，用于导数计算。
    pub fn tick(
        &mut self,
        modes: &mut ModeRegistry,
        waypoints: &mut WaypointQueue,
        now: f64,
    ) -> Result<TickReport, ControlError> {
        if self.faulted {
            return Err(ControlError::Faulted);
        }
        let result = self.run_tick(modes, waypoints, now);
        self.check_fault(result)
    }

    /// 应用模式切换的副作用
    ///
    /// `modes` 为切换之后的注册表。
    pub fn apply_transition(
        &mut self,
        transition: &ModeTransition,
        modes: &ModeRegistry,
    ) -> Result<(), ControlError> {
        if self.faulted {
            return Err(ControlError::Faulted);
        }
        let result = self.transition_effects(transition, modes);
        self.check_fault(result)
    }

    fn check_fault<T>(&mut self, result: Result<T, ControlError>) -> Result<T, ControlError> {
        if let Err(ControlError::Io(e)) = &result
            && e.is_fatal()
        {
            error!("Vehicle I/O failed, disabling engine: {}", e);
            self.faulted = true;
        }
        result
    }

    fn sample(&mut self) -> Result<RawTelemetry, IoError> {
        let names: Vec<&str> = TelemetryChannel::ALL.iter().map(|c| c.sim_var()).collect();
        let values = self.vehicle.read_many(&names)?;
        let mut raw = RawTelemetry::new();
        for (channel, value) in TelemetryChannel::ALL.into_iter().zip(values) {
            raw.set(channel, value);
        }
        Ok(raw)
    }

    fn elevator_limits(&self) -> TrimLimits {
        self.previous
            .as_ref()
            .map(|s| s.pitch_trim_limits)
            .unwrap_or_default()
    }

    fn run_tick(
        &mut self,
        modes: &mut ModeRegistry,
        waypoints: &mut WaypointQueue,
        now: f64,
    ) -> Result<TickReport, ControlError> {
        let raw = self.sample()?;
        let snapshot = TelemetrySnapshot::build(&raw, now, self.previous.as_ref())?;
        trace!(
            "alt {:.0} ft, speed {:.1} kt, hdg {:.1}°, bank {:.1}°, vs {:.0} ft/min",
            snapshot.altitude,
            snapshot.airspeed,
            snapshot.heading_deg(),
            snapshot.bank_deg(),
            snapshot.vertical_speed
        );

        // 在副本上计算，全部成功后再提交
        let mut anchor = self.anchor;
        let mut vs_reference = self.vs_reference;
        let mut last_aileron_write = self.last_aileron_write;

        let route_heading = waypoint::steer(
            waypoints,
            &snapshot,
            self.config.waypoint.arrival_radius_km,
        );

        let takeoff_engaged = modes.is_engaged(ControlMode::AutoTakeoff);
        if takeoff_engaged {
            self.takeoff
                .run(&mut self.vehicle, &snapshot, &self.config.takeoff)?;
        }

        let inverted = modes.is_engaged(ControlMode::InvertedFlight);
        let acro_active = inverted || modes.is_engaged(ControlMode::Acrobatic);
        let heading_target = route_heading.or(modes.setpoint(ControlMode::Heading));
        let trim = &self.config.trim;

        if modes.is_engaged(ControlMode::LevelFlight) {
            let bounds = trim.aileron_bounds();
            let output = if acro_active {
                let terms = acrobatic::fly_level(
                    &snapshot,
                    heading_target,
                    inverted,
                    &self.config.acrobatic,
                    &mut anchor,
                    bounds,
                );
                debug!("acrobatic level: {:?}", terms);
                terms.output
            } else {
                let gains = &self.config.level;
                if gains.follow_manual_trim
                    && let Some(last) = last_aileron_write
                    && (snapshot.aileron_trim - last).abs() > gains.manual_trim_threshold
                {
                    info!(
                        "Manual aileron trim {:.3} detected, adopting as anchor",
                        snapshot.aileron_trim
                    );
                    anchor.seed(Axis::Aileron, snapshot.aileron_trim, bounds);
                }
                let terms = level::fly_level(&snapshot, heading_target, gains, &mut anchor, bounds);
                debug!("level: {:?}", terms);
                anchor.aileron.clamp(-bounds.range, bounds.range)
            };
            self.vehicle.write(channels::AILERON_TRIM, output)?;
            last_aileron_write = Some(output);
        }

        let mut vertical_speed_target = None;
        if modes.is_engaged(ControlMode::VerticalSpeedHold) {
            let limits = snapshot.pitch_trim_limits;
            let bounds = trim.elevator_bounds(limits);
            let altitude_target = modes.setpoint(ControlMode::AltitudeHold);
            if acro_active {
                let terms = acrobatic::hold_vertical(
                    &snapshot,
                    altitude_target,
                    inverted,
                    vs_reference.unwrap_or(snapshot.vertical_speed),
                    &self.config.acrobatic,
                    &mut anchor,
                    bounds,
                );
                debug!("acrobatic vertical: {:?}", terms);
                vertical_speed_target = Some(terms.target_vertical_speed);
            } else {
                let terms = vertical::hold_vertical(
                    &snapshot,
                    altitude_target,
                    &self.config.vertical,
                    &mut anchor,
                    bounds,
                );
                debug!("vertical: {:?}", terms);
                vertical_speed_target = Some(terms.target_vertical_speed);
            }
            vs_reference = Some(snapshot.vertical_speed);
            self.vehicle
                .write(channels::ELEVATOR_TRIM, elevator_output(anchor.elevator, limits))?;
        }

        self.anchor = anchor;
        self.vs_reference = vs_reference;
        self.last_aileron_write = last_aileron_write;
        self.previous = Some(snapshot.clone());

        if takeoff_engaged {
            let output = self.takeoff.take_output();
            self.apply_takeoff_output(output, modes, snapshot.pitch_trim_limits)?;
        }

        Ok(TickReport {
            snapshot,
            anchor: self.anchor,
            heading_target,
            vertical_speed_target,
            takeoff_phase: takeoff_engaged.then(|| self.takeoff.phase()),
        })
    }

    /// 应用起飞请求
    ///
    /// 所有模式变更与升降舵预置都会生效；副作用的暂时性失败只记录警告，
    /// 第一个硬故障在全部应用之后返回。
    fn apply_takeoff_output(
        &mut self,
        output: TakeoffOutput,
        modes: &mut ModeRegistry,
        limits: TrimLimits,
    ) -> Result<(), ControlError> {
        let mut fatal = None;
        for command in output.commands {
            let Some(transition) = apply_command(modes, command) else {
                continue;
            };
            match self.transition_effects(&transition, modes) {
                Ok(()) => {},
                Err(ControlError::Io(e)) if !e.is_fatal() => {
                    warn!("{:?} side effect failed: {}", command, e);
                },
                Err(e) => {
                    fatal.get_or_insert(e);
                },
            }
        }
        if let Some(bias) = output.elevator_bias {
            debug!("Takeoff elevator anchor preset {:.3}", bias);
            let bounds = self.config.trim.elevator_bounds(limits);
            self.anchor.seed(Axis::Elevator, bias, bounds);
        }
        fatal.map_or(Ok(()), Err)
    }

    fn transition_effects(
        &mut self,
        transition: &ModeTransition,
        modes: &ModeRegistry,
    ) -> Result<(), ControlError> {
        let mode = transition.mode;
        info!(
            "{} ({}): {:?} -> {:?}",
            mode.long_name(),
            mode.code(),
            transition.previous,
            transition.current
        );

        let acro_active = modes.is_engaged(ControlMode::Acrobatic)
            || modes.is_engaged(ControlMode::InvertedFlight);
        let trim = &self.config.trim;

        match mode {
            ControlMode::InvertedFlight if transition.engaged() || transition.disengaged() => {
                let bias = if transition.engaged() {
                    self.config.acrobatic.inverted_trim_bias
                } else {
                    self.config.acrobatic.upright_trim_bias
                };
                let limits = self.elevator_limits();
                self.anchor.seed(Axis::Aileron, 0.0, trim.aileron_bounds());
                self.anchor
                    .seed(Axis::Elevator, bias, trim.elevator_bounds(limits));
                self.vs_reference = None;
                self.vehicle.write(
                    channels::ELEVATOR_TRIM,
                    elevator_output(self.anchor.elevator, limits),
                )?;
            },
            ControlMode::Acrobatic if transition.engaged() || transition.disengaged() => {
                self.anchor.seed(Axis::Aileron, 0.0, trim.aileron_bounds());
                self.vs_reference = None;
            },
            ControlMode::LevelFlight if transition.engaged() => {
                let bounds = trim.aileron_bounds();
                if acro_active {
                    self.anchor.seed(Axis::Aileron, 0.0, bounds);
                } else {
                    let current = self
                        .vehicle
                        .read(TelemetryChannel::AileronTrim.sim_var())?
                        .unwrap_or(self.anchor.aileron);
                    self.anchor.seed(Axis::Aileron, current, bounds);
                }
                self.last_aileron_write = None;
            },
            ControlMode::VerticalSpeedHold if transition.engaged() => {
                let bounds = trim.elevator_bounds(self.elevator_limits());
                let current = self
                    .vehicle
                    .read(TelemetryChannel::PitchTrim.sim_var())?
                    .unwrap_or(self.anchor.elevator);
                self.anchor.seed(Axis::Elevator, current, bounds);
                self.vs_reference = self
                    .vehicle
                    .read(TelemetryChannel::VerticalSpeed.sim_var())?
                    .map(|fps| 60.0 * fps);
            },
            ControlMode::Heading => {
                if let Some(heading) = transition.current.setpoint()
                    && transition.current != transition.previous
                {
                    self.vehicle.write(channels::HEADING_BUG, heading)?;
                }
            },
            ControlMode::AutoTakeoff if transition.engaged() => {
                self.takeoff = AutoTakeoff::new();
            },
            _ => {},
        }
        Ok(())
    }
}

/// 升降舵写入值：钳位到模拟器配平上下限（度 → rad）
fn elevator_output(anchor: f64, limits: TrimLimits) -> f64 {
    let lo = limits.down.min(limits.up).to_radians();
    let hi = limits.down.max(limits.up).to_radians();
    anchor.clamp(lo, hi)
}

/// 将起飞状态机的请求应用到注册表
fn apply_command(modes: &mut ModeRegistry, command: ModeCommand) -> Option<ModeTransition> {
    match command {
        ModeCommand::Engage(mode) => modes.engage(mode),
        ModeCommand::Disengage(mode) => Some(modes.disengage(mode)),
        ModeCommand::SetTarget(mode, value) => {
            modes.set_target(mode, Some(TargetValue::Number(value)))
        },
    }
}
