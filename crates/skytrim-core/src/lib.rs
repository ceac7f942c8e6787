//! # skytrim-core
//!
//! 自动驾驶控制循环的纯数据层（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `math`: 有界线性插值、钳位、罗盘角差
//! - `geo`: 大圆距离与方位角
//! - `snapshot`: 遥测快照与导数
//! - `mode`: 控制模式与模式注册表
//! - `anchor`: 配平锚点（积分项）
//! - `waypoint`: 航路点队列

pub mod anchor;
pub mod geo;
pub mod math;
pub mod mode;
pub mod snapshot;
pub mod waypoint;

// 重新导出常用类型
pub use anchor::{Axis, AxisBounds, TrimAnchor};
pub use math::{bounded_lerp, compass_diff, constrain, map_range};
pub use mode::{ControlMode, ModeError, ModeRegistry, ModeTransition, ModeValue, TargetValue};
pub use snapshot::{
    Derivatives, RawTelemetry, SnapshotError, TelemetryChannel, TelemetrySnapshot, TrimLimits,
};
pub use waypoint::{DEFAULT_ARRIVAL_RADIUS_KM, Waypoint, WaypointError, WaypointQueue};
