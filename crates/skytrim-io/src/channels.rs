//! 作动器通道、辅助传感器通道与离散事件名
//!
//! 快照所需的遥测通道见 [`skytrim_core::TelemetryChannel`]。

pub use skytrim_core::TelemetryChannel;

// ============================================================================
// 作动器
// ============================================================================

pub const AILERON_TRIM: &str = "AILERON_TRIM_PCT";
pub const ELEVATOR_TRIM: &str = "ELEVATOR_TRIM_POSITION";
pub const ELEVATOR_POSITION: &str = "ELEVATOR_POSITION";
pub const RUDDER_POSITION: &str = "RUDDER_POSITION";
pub const FLAPS_HANDLE_INDEX: &str = "FLAPS_HANDLE_INDEX:1";
pub const HEADING_BUG: &str = "AUTOPILOT_HEADING_LOCK_DIR";

/// 第 `engine` 台发动机（从 1 开始）的油门杆通道
pub fn throttle_lever(engine: u32) -> String {
    format!("GENERAL_ENG_THROTTLE_LEVER_POSITION:{engine}")
}

// ============================================================================
// 辅助传感器（起飞用）
// ============================================================================

pub const TOTAL_WEIGHT: &str = "TOTAL_WEIGHT";
pub const DESIGN_SPEED_MIN_ROTATION: &str = "DESIGN_SPEED_MIN_ROTATION";
pub const DESIGN_SPEED_VS1: &str = "DESIGN_SPEED_VS1";
pub const NUMBER_OF_ENGINES: &str = "NUMBER_OF_ENGINES";
pub const BRAKE_PARKING_POSITION: &str = "BRAKE_PARKING_POSITION";
pub const IS_TAIL_DRAGGER: &str = "IS_TAIL_DRAGGER";
pub const TAILWHEEL_LOCK_ON: &str = "TAILWHEEL_LOCK_ON";
pub const GEAR_HANDLE_POSITION: &str = "GEAR_HANDLE_POSITION";

// ============================================================================
// 离散事件
// ============================================================================

pub const EVENT_PARKING_BRAKES: &str = "PARKING_BRAKES";
pub const EVENT_TOGGLE_TAILWHEEL_LOCK: &str = "TOGGLE_TAILWHEEL_LOCK";
pub const EVENT_GEAR_UP: &str = "GEAR_UP";
