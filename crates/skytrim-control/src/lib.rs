//! # skytrim-control
//!
//! 自动驾驶控制层：修正例程、控制引擎、调度线程与控制面句柄。
//!
//! ## 分层
//!
//! - [`routines`]: 纯函数修正例程（平飞/航向、垂直速度/高度、特技/倒飞、自动起飞、航路点）
//! - [`ControlEngine`]: 单线程引擎，一次 `tick` = 采样 → 快照 → 修正 → 写入
//! - [`Autopilot`]: 线程安全的控制面句柄，后台调度线程按固定间隔驱动引擎
//!
//! ## 示例
//!
//! ```no_run
//! use skytrim_control::{AutopilotBuilder, AutopilotConfig};
//! use skytrim_core::TargetValue;
//! use skytrim_io::{AircraftProfile, SimulatedAircraft};
//!
//! let aircraft = SimulatedAircraft::in_cruise(AircraftProfile::default(), 48.9, -123.7, 90.0, 1500.0, 120.0)
//!     .realtime();
//! let autopilot = AutopilotBuilder::new()
//!     .config(AutopilotConfig::default())
//!     .build(aircraft)
//!     .unwrap();
//!
//! autopilot.toggle("LVL");
//! autopilot.toggle("VSH");
//! autopilot.set_target("ALT", Some(TargetValue::Number(2500.0)));
//! autopilot.toggle_autopilot();
//! ```

mod autopilot;
pub mod config;
mod engine;
mod error;
pub mod routines;
mod scheduler;

pub use autopilot::{Autopilot, AutopilotBuilder, AutopilotState};
pub use config::{
    AcrobaticGains, AutopilotConfig, ConfigError, LevelGains, TakeoffGains, TrimConfig,
    VerticalGains, WaypointConfig,
};
pub use engine::{ControlEngine, TickReport};
pub use error::ControlError;
pub use routines::takeoff::{AutoTakeoff, ModeCommand, TakeoffOutput, TakeoffPhase};

// 控制面常用的核心类型
pub use skytrim_core::{
    ControlMode, ModeRegistry, ModeValue, TargetValue, TrimAnchor, Waypoint, WaypointQueue,
};
