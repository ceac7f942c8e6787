//! 控制层错误类型定义

use crate::config::ConfigError;
use skytrim_core::SnapshotError;
use skytrim_io::IoError;
use thiserror::Error;

/// 控制层错误类型
#[derive(Error, Debug)]
pub enum ControlError {
    /// 飞行器 I/O 错误
    #[error("Vehicle I/O error: {0}")]
    Io(#[from] IoError),

    /// 遥测缺失（放弃本周期）
    #[error("Telemetry error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 引擎因硬故障停用，需要 `reset_fault()`
    #[error("Engine is faulted")]
    Faulted,

    /// 调度线程已退出
    #[error("Control loop stopped")]
    LoopStopped,

    /// 调度线程启动失败
    #[error("Failed to spawn control loop: {0}")]
    Spawn(std::io::Error),
}

impl ControlError {
    /// 是否应停用引擎
    ///
    /// 遥测缺失与暂时性通信故障只放弃本周期。
    pub fn is_fatal(&self) -> bool {
        match self {
            ControlError::Io(e) => e.is_fatal(),
            ControlError::Snapshot(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skytrim_core::TelemetryChannel;

    #[test]
    fn test_control_error_display() {
        let err = ControlError::from(SnapshotError::MissingChannels(vec![
            TelemetryChannel::Airspeed,
        ]));
        assert_eq!(format!("{}", err), "Telemetry error: Missing telemetry: AIRSPEED_TRUE");

        let err = ControlError::from(IoError::Disconnected);
        assert_eq!(format!("{}", err), "Vehicle I/O error: Vehicle disconnected");

        assert_eq!(format!("{}", ControlError::Faulted), "Engine is faulted");
    }

    #[test]
    fn test_fatality() {
        assert!(!ControlError::from(SnapshotError::MissingChannels(vec![])).is_fatal());
        assert!(!ControlError::from(IoError::Unavailable("x".into())).is_fatal());
        assert!(ControlError::from(IoError::Disconnected).is_fatal());
        assert!(ControlError::Faulted.is_fatal());
    }
}
