//! Mock 飞行器
//!
//! 用于测试的可编程飞行器：通道值由测试直接设定，所有写入与事件都被记录。
//! `MockVehicle` 可克隆，克隆体共享同一状态，测试可以在引擎持有一份的同时
//! 用另一份检查写入记录或注入故障。

use crate::channels;
use crate::{IoError, VehicleIo};
use parking_lot::Mutex;
use skytrim_core::TelemetryChannel;
use std::collections::HashMap;
use std::sync::Arc;

/// 注入的故障类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFault {
    /// 暂时性故障（读取返回 `IoError::Unavailable`）
    Unavailable,
    /// 硬故障（所有操作返回 `IoError::Disconnected`）
    Disconnected,
}

#[derive(Debug, Default)]
struct MockState {
    values: HashMap<String, f64>,
    writes: Vec<(String, f64)>,
    triggers: Vec<String>,
    fault: Option<MockFault>,
}

impl MockState {
    fn flip(&mut self, channel: &str) {
        let on = self.values.get(channel).copied().unwrap_or(0.0) != 0.0;
        self.values.insert(channel.to_string(), if on { 0.0 } else { 1.0 });
    }
}

/// 模拟飞行器
#[derive(Debug, Clone, Default)]
pub struct MockVehicle {
    state: Arc<Mutex<MockState>>,
}

impl MockVehicle {
    /// 创建空飞行器（所有通道无数据）
    pub fn new() -> Self {
        Self::default()
    }

    /// 平飞巡航预设：100 kt、1500 ft、航向 0、机翼水平
    ///
    /// 经纬度以弧度给出，与真实模拟器一致。
    pub fn level_cruise() -> Self {
        let mock = Self::new();
        mock.set_telemetry(TelemetryChannel::OnGround, 0.0);
        mock.set_telemetry(TelemetryChannel::Airspeed, 100.0);
        mock.set_telemetry(TelemetryChannel::BankAngle, 0.0);
        mock.set_telemetry(TelemetryChannel::TurnRate, 0.0);
        mock.set_telemetry(TelemetryChannel::Latitude, 48.9_f64.to_radians());
        mock.set_telemetry(TelemetryChannel::Longitude, (-123.7_f64).to_radians());
        mock.set_telemetry(TelemetryChannel::Heading, 0.0);
        mock.set_telemetry(TelemetryChannel::TrueHeading, 0.0);
        mock.set_telemetry(TelemetryChannel::Altitude, 1500.0);
        mock.set_telemetry(TelemetryChannel::VerticalSpeed, 0.0);
        mock.set_telemetry(TelemetryChannel::PitchTrim, 0.0);
        mock.set_telemetry(TelemetryChannel::AileronTrim, 0.0);
        mock
    }

    /// 跑道停机预设：地面、静止、刹车松开、前三点式单发
    pub fn on_runway() -> Self {
        let mock = Self::level_cruise();
        mock.set_telemetry(TelemetryChannel::OnGround, 1.0);
        mock.set_telemetry(TelemetryChannel::Airspeed, 0.0);
        mock.set_telemetry(TelemetryChannel::Altitude, 0.0);
        mock.set(channels::TOTAL_WEIGHT, 4000.0);
        mock.set(channels::DESIGN_SPEED_MIN_ROTATION, 60.0);
        mock.set(channels::DESIGN_SPEED_VS1, 55.0);
        mock.set(channels::NUMBER_OF_ENGINES, 1.0);
        mock.set(channels::BRAKE_PARKING_POSITION, 0.0);
        mock.set(channels::IS_TAIL_DRAGGER, 0.0);
        mock.set(channels::TAILWHEEL_LOCK_ON, 0.0);
        mock.set(&channels::throttle_lever(1), 0.0);
        mock
    }

    /// 设定通道值
    pub fn set(&self, channel: &str, value: f64) {
        self.state.lock().values.insert(channel.to_string(), value);
    }

    /// 设定遥测通道值
    pub fn set_telemetry(&self, channel: TelemetryChannel, value: f64) {
        self.set(channel.sim_var(), value);
    }

    /// 使通道无数据
    pub fn unset(&self, channel: &str) {
        self.state.lock().values.remove(channel);
    }

    /// 当前通道值
    pub fn value(&self, channel: &str) -> Option<f64> {
        self.state.lock().values.get(channel).copied()
    }

    /// 全部写入记录（按时间顺序）
    pub fn writes(&self) -> Vec<(String, f64)> {
        self.state.lock().writes.clone()
    }

    /// 某通道的全部写入值
    pub fn writes_to(&self, channel: &str) -> Vec<f64> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, v)| *v)
            .collect()
    }

    /// 某通道最近一次写入值
    pub fn last_write(&self, channel: &str) -> Option<f64> {
        self.writes_to(channel).last().copied()
    }

    /// 全部事件记录
    pub fn triggers(&self) -> Vec<String> {
        self.state.lock().triggers.clone()
    }

    /// 清空写入与事件记录（通道值保留）
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.triggers.clear();
    }

    /// 注入故障
    pub fn fail(&self, fault: MockFault) {
        self.state.lock().fault = Some(fault);
    }

    /// 清除故障
    pub fn clear_fault(&self) {
        self.state.lock().fault = None;
    }

    fn check(state: &MockState, channel: &str, reading: bool) -> Result<(), IoError> {
        match state.fault {
            Some(MockFault::Disconnected) => Err(IoError::Disconnected),
            Some(MockFault::Unavailable) if reading => {
                Err(IoError::Unavailable(channel.to_string()))
            },
            _ => Ok(()),
        }
    }
}

impl VehicleIo for MockVehicle {
    fn read(&mut self, channel: &str) -> Result<Option<f64>, IoError> {
        let state = self.state.lock();
        Self::check(&state, channel, true)?;
        Ok(state.values.get(channel).copied())
    }

    fn write(&mut self, channel: &str, value: f64) -> Result<(), IoError> {
        let mut state = self.state.lock();
        Self::check(&state, channel, false)?;
        state.values.insert(channel.to_string(), value);
        state.writes.push((channel.to_string(), value));
        Ok(())
    }

    fn trigger(&mut self, event: &str) -> Result<(), IoError> {
        let mut state = self.state.lock();
        Self::check(&state, event, false)?;
        match event {
            channels::EVENT_PARKING_BRAKES => state.flip(channels::BRAKE_PARKING_POSITION),
            channels::EVENT_TOGGLE_TAILWHEEL_LOCK => state.flip(channels::TAILWHEEL_LOCK_ON),
            channels::EVENT_GEAR_UP => {
                state.values.insert(channels::GEAR_HANDLE_POSITION.to_string(), 0.0);
            },
            _ => {},
        }
        state.triggers.push(event.to_string());
        Ok(())
    }
}
