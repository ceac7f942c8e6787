//! 控制面句柄
//!
//! [`Autopilot`] 是 `Send + Sync` 的对外接口：模式注册表与航路点队列在互斥锁内修改，
//! 模式切换的一次性副作用（写航向游标、吸收手动配平等）通过命令通道交给调度线程执行，
//! 飞行器 I/O 只在调度线程中发生。
//!
//! 无效请求（未知模式名、非法坐标）在这里被拒绝并记录 `warn!`，不会进入控制周期。

use crate::config::AutopilotConfig;
use crate::engine::{ControlEngine, TickReport};
use crate::error::ControlError;
use crate::scheduler::{LoopCommand, SharedState, control_loop};
use crossbeam_channel::Sender;
use serde::Serialize;
use skytrim_core::{
    ControlMode, ModeRegistry, ModeTransition, ModeValue, TargetValue, TelemetrySnapshot,
    TrimAnchor, Waypoint, WaypointQueue,
};
use skytrim_io::VehicleIo;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{error, info, warn};

/// 控制面可见的完整状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutopilotState {
    pub engaged: bool,
    pub faulted: bool,
    pub paused: bool,
    pub modes: BTreeMap<&'static str, ModeValue>,
    pub waypoints: Vec<Waypoint>,
    /// 配平锚点
    pub anchor: TrimAnchor,
    /// 最近一次成功周期的快照
    pub telemetry: Option<TelemetrySnapshot>,
}

/// Autopilot 构建器
///
/// # Example
///
/// ```
/// use skytrim_control::{AutopilotBuilder, AutopilotConfig};
/// use skytrim_core::WaypointQueue;
/// use skytrim_io::SimulatedAircraft;
///
/// let mut waypoints = WaypointQueue::new();
/// waypoints.add(48.95, -123.7, None).unwrap();
///
/// let autopilot = AutopilotBuilder::new()
///     .config(AutopilotConfig::default())
///     .waypoints(waypoints)
///     .build(SimulatedAircraft::in_cruise(Default::default(), 48.9, -123.7, 0.0, 1500.0, 110.0))
///     .unwrap();
/// assert_eq!(autopilot.get_state().waypoints.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct AutopilotBuilder {
    config: AutopilotConfig,
    modes: ModeRegistry,
    waypoints: WaypointQueue,
}

impl AutopilotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: AutopilotConfig) -> Self {
        self.config = config;
        self
    }

    /// 沿用之前会话的模式（已接通的模式会重新执行接通副作用）
    pub fn modes(mut self, modes: ModeRegistry) -> Self {
        self.modes = modes;
        self
    }

    /// 沿用之前会话的航路点
    pub fn waypoints(mut self, waypoints: WaypointQueue) -> Self {
        self.waypoints = waypoints;
        self
    }

    /// 校验配置并启动调度线程
    ///
    /// 自动驾驶初始为断开状态，需要 [`Autopilot::toggle_autopilot`] 接通。
    pub fn build<V>(self, vehicle: V) -> Result<Autopilot, ControlError>
    where
        V: VehicleIo + Send + 'static,
    {
        self.config.validate()?;

        let carried: Vec<ModeTransition> = ControlMode::ALL
            .into_iter()
            .filter(|m| self.modes.is_engaged(*m))
            .map(|mode| ModeTransition {
                mode,
                previous: mode.disengaged(),
                current: self.modes.get(mode),
            })
            .collect();

        let shared = Arc::new(SharedState::new(self.modes, self.waypoints));
        let engine = ControlEngine::new(vehicle, self.config);
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();

        let loop_shared = shared.clone();
        let loop_thread = thread::Builder::new()
            .name("skytrim-loop".into())
            .spawn(move || control_loop(engine, cmd_rx, loop_shared, Instant::now()))
            .map_err(ControlError::Spawn)?;

        let autopilot = Autopilot {
            shared,
            cmd_tx,
            loop_thread: Some(loop_thread),
        };
        for transition in carried {
            autopilot.send(LoopCommand::Transition(transition));
        }
        info!("Autopilot ready");
        Ok(autopilot)
    }
}

/// 自动驾驶控制面
pub struct Autopilot {
    shared: Arc<SharedState>,
    cmd_tx: Sender<LoopCommand>,
    loop_thread: Option<JoinHandle<()>>,
}

impl Autopilot {
    /// 翻转自动驾驶总开关，返回新的接通状态
    ///
    /// 故障锁存时拒绝接通（返回 `false`），需先 [`reset_fault`](Self::reset_fault)。
    pub fn toggle_autopilot(&self) -> bool {
        let shared = &self.shared;
        let flipped = shared
            .engaged
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |engaged| {
                if !engaged && shared.faulted.load(Ordering::SeqCst) {
                    None
                } else {
                    Some(!engaged)
                }
            });
        let engaged = match flipped {
            Ok(previous) => !previous,
            Err(_) => {
                warn!("Autopilot is faulted, reset the fault before engaging");
                return false;
            },
        };
        // 故障可能在检查与接通之间锁存
        if engaged && shared.faulted.load(Ordering::SeqCst) {
            shared.engaged.store(false, Ordering::SeqCst);
            warn!("Autopilot faulted while engaging, reset the fault first");
            return false;
        }
        info!("Autopilot {}", if engaged { "engaged" } else { "disengaged" });
        self.send(LoopCommand::Wake);
        engaged
    }

    pub fn is_engaged(&self) -> bool {
        self.shared.engaged.load(Ordering::Acquire)
    }

    pub fn is_faulted(&self) -> bool {
        self.shared.faulted.load(Ordering::Acquire)
    }

    /// 翻转模式，返回新的接通状态
    ///
    /// 设定值模式从断开翻转时以当前航向/高度（最近快照）接通；尚无快照时返回 `None`。
    pub fn toggle(&self, name: &str) -> Option<bool> {
        let mode = parse_mode(name)?;
        let transition = {
            let mut modes = self.shared.modes.lock();
            match modes.toggle(mode) {
                Some(transition) => transition,
                None => {
                    let Some(current) = self.current_value(mode) else {
                        warn!("No telemetry yet, cannot hold current value for {}", mode);
                        return None;
                    };
                    modes.set_target(mode, Some(TargetValue::Number(current)))?
                },
            }
        };
        self.send(LoopCommand::Transition(transition));
        Some(transition.current.is_engaged())
    }

    /// 设置模式目标，返回新的模式值
    ///
    /// `None` 断开模式。被拒绝的值（设定值模式传 `true`、非有限数字）返回 `None`。
    pub fn set_target(&self, name: &str, value: Option<TargetValue>) -> Option<ModeValue> {
        let mode = parse_mode(name)?;
        let transition = self.shared.modes.lock().set_target(mode, value);
        match transition {
            Some(transition) => {
                self.send(LoopCommand::Transition(transition));
                Some(transition.current)
            },
            None => {
                warn!("Rejected target {:?} for {}", value, mode);
                None
            },
        }
    }

    pub fn add_waypoint(&self, lat: f64, long: f64, alt: Option<f64>) -> Option<Waypoint> {
        match self.shared.waypoints.lock().add(lat, long, alt) {
            Ok(waypoint) => Some(waypoint),
            Err(e) => {
                warn!("Rejected waypoint: {}", e);
                None
            },
        }
    }

    pub fn remove_waypoint(&self, lat: f64, long: f64) -> bool {
        self.shared.waypoints.lock().remove(lat, long)
    }

    /// 暂停时调度继续，但不执行修正
    pub fn set_paused(&self, paused: bool) {
        if self.shared.paused.swap(paused, Ordering::AcqRel) != paused {
            info!("Autopilot {}", if paused { "paused" } else { "resumed" });
        }
    }

    /// 清除故障锁存（自动驾驶保持断开）
    pub fn reset_fault(&self) -> Result<(), ControlError> {
        self.cmd_tx
            .send(LoopCommand::ResetFault)
            .map_err(|_| ControlError::LoopStopped)?;
        if self.shared.faulted.swap(false, Ordering::AcqRel) {
            info!("Autopilot fault reset");
        }
        Ok(())
    }

    /// 最近一次成功周期的结果
    pub fn latest_report(&self) -> Option<Arc<TickReport>> {
        self.shared.report.load_full()
    }

    pub fn get_state(&self) -> AutopilotState {
        let modes = self.shared.modes.lock().snapshot();
        let waypoints = self.shared.waypoints.lock().to_vec();
        AutopilotState {
            engaged: self.is_engaged(),
            faulted: self.is_faulted(),
            paused: self.shared.paused.load(Ordering::Acquire),
            modes,
            waypoints,
            anchor: **self.shared.anchor.load(),
            telemetry: self.latest_report().map(|r| r.snapshot.clone()),
        }
    }

    /// 停止调度线程，交还模式与航路点
    pub fn shutdown(mut self) -> (ModeRegistry, WaypointQueue) {
        self.stop();
        let modes = self.shared.modes.lock().clone();
        let waypoints = self.shared.waypoints.lock().clone();
        (modes, waypoints)
    }

    fn current_value(&self, mode: ControlMode) -> Option<f64> {
        let report = self.latest_report()?;
        match mode {
            ControlMode::Heading => Some(report.snapshot.heading_deg()),
            ControlMode::AltitudeHold => Some(report.snapshot.altitude),
            _ => None,
        }
    }

    fn send(&self, command: LoopCommand) {
        if self.cmd_tx.send(command).is_err() {
            warn!("Control loop is not running, dropped {:?}", command);
        }
    }

    fn stop(&mut self) {
        if let Some(handle) = self.loop_thread.take() {
            let _ = self.cmd_tx.send(LoopCommand::Shutdown);
            if handle.join().is_err() {
                error!("Control loop thread panicked");
            }
        }
    }
}

impl Drop for Autopilot {
    fn drop(&mut self) {
        self.stop();
    }
}

fn parse_mode(name: &str) -> Option<ControlMode> {
    match name.parse() {
        Ok(mode) => Some(mode),
        Err(e) => {
            warn!("{}", e);
            None
        },
    }
}
