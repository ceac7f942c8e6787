//! 遥测快照
//!
//! 每个调度周期读取一次原始遥测，构建一个不可变的 [`TelemetrySnapshot`]。
//! 如果提供了上一个快照，则同时计算"每秒"导数字段。
//!
//! # 单位
//!
//! | 字段 | 原始单位 | 快照单位 |
//! |------|----------|----------|
//! | 垂直速度 | ft/s | ft/min（×60） |
//! | 经纬度 | rad | 度 |
//! | 航向/坡度/转弯率 | rad, rad/s | 不变 |

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 遥测通道
///
/// 快照构建所需的传感器通道。[`TelemetryChannel::sim_var`] 给出模拟器属性名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TelemetryChannel {
    OnGround,
    Airspeed,
    BankAngle,
    TurnRate,
    Latitude,
    Longitude,
    Heading,
    TrueHeading,
    Altitude,
    VerticalSpeed,
    PitchTrim,
    AileronTrim,
    /// 可选通道，缺省 +10
    PitchTrimUpLimit,
    /// 可选通道，缺省 -10
    PitchTrimDownLimit,
}

impl TelemetryChannel {
    /// 通道数量
    pub const COUNT: usize = 14;

    /// 全部通道（按读取顺序）
    pub const ALL: [TelemetryChannel; Self::COUNT] = [
        TelemetryChannel::OnGround,
        TelemetryChannel::Airspeed,
        TelemetryChannel::BankAngle,
        TelemetryChannel::TurnRate,
        TelemetryChannel::Latitude,
        TelemetryChannel::Longitude,
        TelemetryChannel::Heading,
        TelemetryChannel::TrueHeading,
        TelemetryChannel::Altitude,
        TelemetryChannel::VerticalSpeed,
        TelemetryChannel::PitchTrim,
        TelemetryChannel::AileronTrim,
        TelemetryChannel::PitchTrimUpLimit,
        TelemetryChannel::PitchTrimDownLimit,
    ];

    /// 模拟器属性名
    pub const fn sim_var(self) -> &'static str {
        match self {
            TelemetryChannel::OnGround => "SIM_ON_GROUND",
            TelemetryChannel::Airspeed => "AIRSPEED_TRUE",
            TelemetryChannel::BankAngle => "PLANE_BANK_DEGREES",
            TelemetryChannel::TurnRate => "TURN_INDICATOR_RATE",
            TelemetryChannel::Latitude => "PLANE_LATITUDE",
            TelemetryChannel::Longitude => "PLANE_LONGITUDE",
            TelemetryChannel::Heading => "PLANE_HEADING_DEGREES_MAGNETIC",
            TelemetryChannel::TrueHeading => "PLANE_HEADING_DEGREES_TRUE",
            TelemetryChannel::Altitude => "INDICATED_ALTITUDE",
            TelemetryChannel::VerticalSpeed => "VERTICAL_SPEED",
            TelemetryChannel::PitchTrim => "ELEVATOR_TRIM_POSITION",
            TelemetryChannel::AileronTrim => "AILERON_TRIM_PCT",
            TelemetryChannel::PitchTrimUpLimit => "ELEVATOR_TRIM_UP_LIMIT",
            TelemetryChannel::PitchTrimDownLimit => "ELEVATOR_TRIM_DOWN_LIMIT",
        }
    }

    /// 缺失时是否放弃本周期
    pub const fn is_required(self) -> bool {
        !matches!(
            self,
            TelemetryChannel::PitchTrimUpLimit | TelemetryChannel::PitchTrimDownLimit
        )
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TelemetryChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sim_var())
    }
}

/// 快照构建错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// 必需通道本周期无数据
    #[error("Missing telemetry: {}", format_channels(.0))]
    MissingChannels(Vec<TelemetryChannel>),
}

fn format_channels(channels: &[TelemetryChannel]) -> String {
    channels
        .iter()
        .map(|c| c.sim_var())
        .collect::<Vec<_>>()
        .join(", ")
}

/// 一次原始遥测读取（未经校验）
///
/// 非有限值（NaN/∞）按"无数据"处理。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTelemetry {
    values: [Option<f64>; TelemetryChannel::COUNT],
}

impl RawTelemetry {
    /// 创建空读取
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个通道读数
    pub fn set(&mut self, channel: TelemetryChannel, value: Option<f64>) {
        self.values[channel.index()] = value.filter(|v| v.is_finite());
    }

    /// 链式写入（主要用于测试）
    pub fn with(mut self, channel: TelemetryChannel, value: f64) -> Self {
        self.set(channel, Some(value));
        self
    }

    /// 读取一个通道
    pub fn get(&self, channel: TelemetryChannel) -> Option<f64> {
        self.values[channel.index()]
    }

    /// 缺失的必需通道
    pub fn missing(&self) -> Vec<TelemetryChannel> {
        TelemetryChannel::ALL
            .into_iter()
            .filter(|c| c.is_required() && self.get(*c).is_none())
            .collect()
    }
}

/// 升降舵配平上下限
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimLimits {
    pub up: f64,
    pub down: f64,
}

impl Default for TrimLimits {
    fn default() -> Self {
        Self {
            up: 10.0,
            down: -10.0,
        }
    }
}

/// "每秒"导数
///
/// 第一个快照（无前值）或时间差非正时全部为 0。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Derivatives {
    /// 坡度变化率（rad/s）
    pub d_bank: f64,
    /// 转弯率变化率（rad/s²）
    pub d_turn_rate: f64,
    /// 航向变化率（rad/s）
    pub d_heading: f64,
    /// 空速变化率（kt/s）
    pub d_speed: f64,
    /// 垂直速度变化率（ft/min 每秒）
    pub d_vertical_speed: f64,
}

/// 一次一致的仪表读数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// 高度（ft）
    pub altitude: f64,
    /// 真空速（kt）
    pub airspeed: f64,
    /// 磁航向（rad）
    pub heading: f64,
    /// 真航向（rad）
    pub true_heading: f64,
    /// 坡度（rad）
    pub bank: f64,
    /// 转弯率（rad/s）
    pub turn_rate: f64,
    /// 垂直速度（ft/min）
    pub vertical_speed: f64,
    pub pitch_trim: f64,
    pub pitch_trim_limits: TrimLimits,
    pub aileron_trim: f64,
    pub on_ground: bool,
    /// 纬度（度）
    pub latitude: f64,
    /// 经度（度）
    pub longitude: f64,
    /// 墙钟时间戳（秒）
    pub timestamp: f64,
    pub derivatives: Derivatives,
}

impl TelemetrySnapshot {
    /// 从原始读数构建快照
    ///
    /// # 错误
    ///
    /// 任一必需通道缺失时返回 [`SnapshotError::MissingChannels`]，列出全部缺失通道。
    /// 此时调用方不应修改任何持久状态。
    pub fn build(
        raw: &RawTelemetry,
        timestamp: f64,
        previous: Option<&TelemetrySnapshot>,
    ) -> Result<Self, SnapshotError> {
        let missing = raw.missing();
        if !missing.is_empty() {
            return Err(SnapshotError::MissingChannels(missing));
        }

        // missing() 为空保证必需通道都有值
        let value = |c: TelemetryChannel| raw.get(c).unwrap_or_default();

        let defaults = TrimLimits::default();
        let mut snapshot = Self {
            altitude: value(TelemetryChannel::Altitude),
            airspeed: value(TelemetryChannel::Airspeed),
            heading: value(TelemetryChannel::Heading),
            true_heading: value(TelemetryChannel::TrueHeading),
            bank: value(TelemetryChannel::BankAngle),
            turn_rate: value(TelemetryChannel::TurnRate),
            vertical_speed: 60.0 * value(TelemetryChannel::VerticalSpeed),
            pitch_trim: value(TelemetryChannel::PitchTrim),
            pitch_trim_limits: TrimLimits {
                up: raw
                    .get(TelemetryChannel::PitchTrimUpLimit)
                    .unwrap_or(defaults.up),
                down: raw
                    .get(TelemetryChannel::PitchTrimDownLimit)
                    .unwrap_or(defaults.down),
            },
            aileron_trim: value(TelemetryChannel::AileronTrim),
            on_ground: value(TelemetryChannel::OnGround) != 0.0,
            latitude: value(TelemetryChannel::Latitude).to_degrees(),
            longitude: value(TelemetryChannel::Longitude).to_degrees(),
            timestamp,
            derivatives: Derivatives::default(),
        };

        if let Some(previous) = previous {
            snapshot.derivatives = Derivatives::between(previous, &snapshot);
        }

        Ok(snapshot)
    }

    /// 磁航向（度）
    pub fn heading_deg(&self) -> f64 {
        self.heading.to_degrees()
    }

    /// 坡度（度）
    pub fn bank_deg(&self) -> f64 {
        self.bank.to_degrees()
    }

    /// 转弯率（度/秒）
    pub fn turn_rate_deg(&self) -> f64 {
        self.turn_rate.to_degrees()
    }

    /// 真航向与磁航向之差（度）
    pub fn magnetic_variation_deg(&self) -> f64 {
        (self.true_heading - self.heading).to_degrees()
    }
}

impl Derivatives {
    /// 计算 `current` 相对 `previous` 的每秒变化率
    ///
    /// 时间差 `<= 0`（时钟异常）时返回全 0，避免除零。
    pub fn between(previous: &TelemetrySnapshot, current: &TelemetrySnapshot) -> Self {
        let elapsed = current.timestamp - previous.timestamp;
        if elapsed <= 0.0 || !elapsed.is_finite() {
            return Self::default();
        }
        Self {
            d_bank: (current.bank - previous.bank) / elapsed,
            d_turn_rate: (current.turn_rate - previous.turn_rate) / elapsed,
            d_heading: (current.heading - previous.heading) / elapsed,
            d_speed: (current.airspeed - previous.airspeed) / elapsed,
            d_vertical_speed: (current.vertical_speed - previous.vertical_speed) / elapsed,
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alt: {:.1}ft, speed: {:.1}kt, hdg: {:.1}°, bank: {:.2}°, turn: {:.3}°/s, VS: {:.1}ft/min, \
             trim: {:.5}, a.trim: {:.5}, dVS: {:.3}, dBank: {:.5}",
            self.altitude,
            self.airspeed,
            self.heading_deg(),
            self.bank_deg(),
            self.turn_rate_deg(),
            self.vertical_speed,
            self.pitch_trim,
            self.aileron_trim,
            self.derivatives.d_vertical_speed,
            self.derivatives.d_bank,
        )
    }
}
