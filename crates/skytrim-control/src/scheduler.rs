//! 调度线程
//!
//! 固定间隔驱动 [`ControlEngine::tick`]。自动驾驶断开时阻塞在命令通道上，不占用 CPU；
//! 接通后以 `recv_deadline` 等待下一个周期，期间到达的命令立即处理。

use crate::engine::{ControlEngine, TickReport};
use crate::error::ControlError;
use arc_swap::{ArcSwap, ArcSwapOption};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use skytrim_core::{ModeRegistry, ModeTransition, TrimAnchor, WaypointQueue};
use skytrim_io::VehicleIo;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{error, info, trace, warn};

/// 控制面发往调度线程的命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LoopCommand {
    /// 接通状态改变，重新安排下一周期
    Wake,
    /// 模式已在注册表中变更，执行一次性副作用
    Transition(ModeTransition),
    ResetFault,
    Shutdown,
}

/// 控制面与调度线程共享的状态
///
/// 锁顺序：先 `modes` 后 `waypoints`。
pub(crate) struct SharedState {
    pub modes: Mutex<ModeRegistry>,
    pub waypoints: Mutex<WaypointQueue>,
    pub engaged: AtomicBool,
    pub faulted: AtomicBool,
    pub paused: AtomicBool,
    pub anchor: ArcSwap<TrimAnchor>,
    pub report: ArcSwapOption<TickReport>,
}

impl SharedState {
    pub fn new(modes: ModeRegistry, waypoints: WaypointQueue) -> Self {
        Self {
            modes: Mutex::new(modes),
            waypoints: Mutex::new(waypoints),
            engaged: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            anchor: ArcSwap::from_pointee(TrimAnchor::default()),
            report: ArcSwapOption::empty(),
        }
    }

    fn latch_fault(&self, err: &ControlError) {
        error!("Control loop halted: {}", err);
        // 先置故障再断开，与 `Autopilot::toggle_autopilot` 的接通后复查配对
        self.faulted.store(true, Ordering::SeqCst);
        self.engaged.store(false, Ordering::SeqCst);
    }
}

/// 调度线程主循环
///
/// 命令通道关闭或收到 [`LoopCommand::Shutdown`] 时返回。
pub(crate) fn control_loop<V: VehicleIo>(
    mut engine: ControlEngine<V>,
    cmd_rx: Receiver<LoopCommand>,
    shared: Arc<SharedState>,
    clock: Instant,
) {
    let mut next_tick: Option<Instant> = None;

    loop {
        let command = match next_tick {
            Some(deadline) => match cmd_rx.recv_deadline(deadline) {
                Ok(cmd) => Some(cmd),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match cmd_rx.recv() {
                Ok(cmd) => Some(cmd),
                Err(_) => break,
            },
        };

        match command {
            Some(LoopCommand::Shutdown) => break,
            Some(LoopCommand::Wake) => {
                next_tick = if shared.engaged.load(Ordering::Acquire) {
                    next_tick.or_else(|| Some(Instant::now()))
                } else {
                    None
                };
            },
            Some(LoopCommand::Transition(transition)) => {
                let result = {
                    let modes = shared.modes.lock();
                    engine.apply_transition(&transition, &modes)
                };
                match result {
                    Ok(()) => shared.anchor.store(Arc::new(engine.anchor())),
                    Err(ControlError::Faulted) => {
                        trace!("Engine faulted, {} side effect skipped", transition.mode)
                    },
                    Err(e) if e.is_fatal() => {
                        shared.latch_fault(&e);
                        next_tick = None;
                    },
                    Err(e) => warn!("Mode side effect skipped: {}", e),
                }
            },
            Some(LoopCommand::ResetFault) => engine.reset_fault(),
            None => {
                let Some(deadline) = next_tick else {
                    continue;
                };
                if !shared.engaged.load(Ordering::Acquire) {
                    next_tick = None;
                    continue;
                }

                if shared.paused.load(Ordering::Acquire) {
                    trace!("Paused, skipping control cycle");
                } else if !run_cycle(&mut engine, &shared, clock) {
                    next_tick = None;
                    continue;
                }

                let interval = engine.interval(&shared.modes.lock());
                let now = Instant::now();
                let mut next = deadline + interval;
                // 落后超过一个周期时不补跑
                if next <= now {
                    next = now + interval;
                }
                next_tick = Some(next);
            },
        }
    }

    info!("Control loop stopped");
}

/// 执行一个周期，返回是否应继续调度
fn run_cycle<V: VehicleIo>(
    engine: &mut ControlEngine<V>,
    shared: &SharedState,
    clock: Instant,
) -> bool {
    let result = {
        let mut modes = shared.modes.lock();
        let mut waypoints = shared.waypoints.lock();
        engine.tick(&mut modes, &mut waypoints, clock.elapsed().as_secs_f64())
    };

    match result {
        Ok(report) => {
            shared.anchor.store(Arc::new(report.anchor));
            shared.report.store(Some(Arc::new(report)));
            true
        },
        Err(e) if !e.is_fatal() => {
            warn!("Control cycle skipped: {}", e);
            true
        },
        Err(e) => {
            shared.latch_fault(&e);
            false
        },
    }
}
