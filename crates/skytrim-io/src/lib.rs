//! # skytrim-io
//!
//! 飞行器 I/O 抽象层：传感器读取、作动器写入、离散事件。
//!
//! 控制核心只通过 [`VehicleIo`] 与模拟器通信。读取返回 `Ok(None)` 表示
//! "本周期无数据"，返回 `Err` 表示通信故障；故障按 [`IoError::is_fatal`] 区分
//! "放弃本周期" 与 "停用引擎"。

use thiserror::Error;

pub mod channels;

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "sim")]
pub mod sim;

#[cfg(feature = "mock")]
pub use mock::{MockFault, MockVehicle};

#[cfg(feature = "sim")]
pub use sim::{AircraftProfile, SimulatedAircraft};

/// I/O 层统一错误类型
#[derive(Error, Debug)]
pub enum IoError {
    /// 底层 IO 错误（模拟器进程消失等）
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// 连接已断开
    #[error("Vehicle disconnected")]
    Disconnected,
    /// 暂时性通信故障（放弃本周期即可）
    #[error("Channel unavailable: {0}")]
    Unavailable(String),
}

impl IoError {
    /// 是否为硬故障（引擎应停用自身，直到外部重启）
    pub fn is_fatal(&self) -> bool {
        matches!(self, IoError::Io(_) | IoError::Disconnected)
    }
}

/// 飞行器 I/O 接口
///
/// 尽力而为：任意通道在任意周期都可能返回 `Ok(None)`。
pub trait VehicleIo {
    /// 读取通道最新值；无数据/过期返回 `Ok(None)`
    fn read(&mut self, channel: &str) -> Result<Option<f64>, IoError>;

    /// 写入作动器通道
    fn write(&mut self, channel: &str, value: f64) -> Result<(), IoError>;

    /// 触发离散事件
    fn trigger(&mut self, event: &str) -> Result<(), IoError>;

    /// 批量读取（默认逐个读取，遇到故障立即返回）
    fn read_many(&mut self, channels: &[&str]) -> Result<Vec<Option<f64>>, IoError> {
        channels.iter().map(|c| self.read(c)).collect()
    }
}

impl<T: VehicleIo + ?Sized> VehicleIo for Box<T> {
    fn read(&mut self, channel: &str) -> Result<Option<f64>, IoError> {
        (**self).read(channel)
    }

    fn write(&mut self, channel: &str, value: f64) -> Result<(), IoError> {
        (**self).write(channel, value)
    }

    fn trigger(&mut self, event: &str) -> Result<(), IoError> {
        (**self).trigger(event)
    }

    fn read_many(&mut self, channels: &[&str]) -> Result<Vec<Option<f64>>, IoError> {
        (**self).read_many(channels)
    }
}
