//! 控制模式与模式注册表
//!
//! [`ModeRegistry`] 是所有修正例程读取的唯一模式来源。
//! 模式集合是封闭的：每个 [`ControlMode`] 在注册表中总有一个值，
//! 未知的模式名在解析阶段（[`ControlMode::from_str`]）被拒绝，不会进入注册表。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 控制目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ControlMode {
    /// 机翼水平（LVL）
    LevelFlight,
    /// 航向保持（HDG，设定值：度）
    Heading,
    /// 垂直速度保持（VSH）
    VerticalSpeedHold,
    /// 高度保持（ALT，设定值：ft）
    AltitudeHold,
    /// 自动起飞（ATO）
    AutoTakeoff,
    /// 特技飞行算法（ACR）
    Acrobatic,
    /// 倒飞（INV）
    InvertedFlight,
}

impl ControlMode {
    pub const COUNT: usize = 7;

    pub const ALL: [ControlMode; Self::COUNT] = [
        ControlMode::LevelFlight,
        ControlMode::Heading,
        ControlMode::VerticalSpeedHold,
        ControlMode::AltitudeHold,
        ControlMode::AutoTakeoff,
        ControlMode::Acrobatic,
        ControlMode::InvertedFlight,
    ];

    /// 控制面使用的短代码
    pub const fn code(self) -> &'static str {
        match self {
            ControlMode::LevelFlight => "LVL",
            ControlMode::Heading => "HDG",
            ControlMode::VerticalSpeedHold => "VSH",
            ControlMode::AltitudeHold => "ALT",
            ControlMode::AutoTakeoff => "ATO",
            ControlMode::Acrobatic => "ACR",
            ControlMode::InvertedFlight => "INV",
        }
    }

    /// 长名称
    pub const fn long_name(self) -> &'static str {
        match self {
            ControlMode::LevelFlight => "LEVEL_FLIGHT",
            ControlMode::Heading => "HEADING_MODE",
            ControlMode::VerticalSpeedHold => "VERTICAL_SPEED_HOLD",
            ControlMode::AltitudeHold => "ALTITUDE_HOLD",
            ControlMode::AutoTakeoff => "AUTO_TAKEOFF",
            ControlMode::Acrobatic => "ACROBATIC",
            ControlMode::InvertedFlight => "INVERTED_FLIGHT",
        }
    }

    /// 是否存储数值设定值（而非布尔）
    pub const fn has_setpoint(self) -> bool {
        matches!(self, ControlMode::Heading | ControlMode::AltitudeHold)
    }

    const fn index(self) -> usize {
        self as usize
    }

    /// 断开状态对应的值
    pub const fn disengaged(self) -> ModeValue {
        if self.has_setpoint() {
            ModeValue::Setpoint(None)
        } else {
            ModeValue::Flag(false)
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 模式解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("Unknown control mode: {0:?}")]
    Unknown(String),
}

impl FromStr for ControlMode {
    type Err = ModeError;

    /// 接受短代码或长名称，大小写不敏感
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        ControlMode::ALL
            .into_iter()
            .find(|m| m.code() == wanted || m.long_name() == wanted)
            .ok_or_else(|| ModeError::Unknown(s.to_string()))
    }
}

/// 模式值
///
/// 序列化为 `true`/`false`（布尔模式）或数字/`null`（设定值模式）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeValue {
    Flag(bool),
    Setpoint(Option<f64>),
}

impl ModeValue {
    /// 是否处于接通状态
    pub fn is_engaged(self) -> bool {
        match self {
            ModeValue::Flag(b) => b,
            ModeValue::Setpoint(v) => v.is_some(),
        }
    }

    /// 设定值（布尔模式返回 None）
    pub fn setpoint(self) -> Option<f64> {
        match self {
            ModeValue::Flag(_) => None,
            ModeValue::Setpoint(v) => v,
        }
    }
}

/// 控制面传入的目标值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetValue {
    Bool(bool),
    Number(f64),
}

impl FromStr for TargetValue {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "true" => Ok(TargetValue::Bool(true)),
            "false" => Ok(TargetValue::Bool(false)),
            other => other.parse::<f64>().map(TargetValue::Number),
        }
    }
}

/// 一次模式变更
///
/// 由注册表返回，调用方据此执行一次性副作用（例如接通倒飞时重置配平）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeTransition {
    pub mode: ControlMode,
    pub previous: ModeValue,
    pub current: ModeValue,
}

impl ModeTransition {
    /// 由断开变为接通
    pub fn engaged(&self) -> bool {
        !self.previous.is_engaged() && self.current.is_engaged()
    }

    /// 由接通变为断开
    pub fn disengaged(&self) -> bool {
        self.previous.is_engaged() && !self.current.is_engaged()
    }
}

/// 模式注册表
#[derive(Debug, Clone, PartialEq)]
pub struct ModeRegistry {
    values: [ModeValue; ControlMode::COUNT],
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeRegistry {
    /// 所有模式断开
    pub fn new() -> Self {
        Self {
            values: ControlMode::ALL.map(ControlMode::disengaged),
        }
    }

    pub fn get(&self, mode: ControlMode) -> ModeValue {
        self.values[mode.index()]
    }

    pub fn is_engaged(&self, mode: ControlMode) -> bool {
        self.get(mode).is_engaged()
    }

    pub fn setpoint(&self, mode: ControlMode) -> Option<f64> {
        self.get(mode).setpoint()
    }

    /// 翻转模式
    ///
    /// - 布尔模式：翻转
    /// - 设定值模式：接通时断开；断开时无设定值可用，返回 `None`（无操作）
    pub fn toggle(&mut self, mode: ControlMode) -> Option<ModeTransition> {
        let next = match self.get(mode) {
            ModeValue::Flag(b) => ModeValue::Flag(!b),
            ModeValue::Setpoint(Some(_)) => ModeValue::Setpoint(None),
            ModeValue::Setpoint(None) => return None,
        };
        Some(self.store(mode, next))
    }

    /// 设置目标
    ///
    /// 规则：
    /// - 设定值模式：有限数字接通（航向归一化到 `[0, 360)`），`None`/`false` 断开，`true` 与非有限值被拒绝
    /// - 布尔模式：布尔直接写入，数字按非零为真，`None` 断开
    ///
    /// 被拒绝时返回 `None`，注册表不变。
    pub fn set_target(
        &mut self,
        mode: ControlMode,
        value: Option<TargetValue>,
    ) -> Option<ModeTransition> {
        let next = if mode.has_setpoint() {
            match value {
                None | Some(TargetValue::Bool(false)) => ModeValue::Setpoint(None),
                Some(TargetValue::Bool(true)) => return None,
                Some(TargetValue::Number(v)) if !v.is_finite() => return None,
                Some(TargetValue::Number(v)) if mode == ControlMode::Heading => {
                    ModeValue::Setpoint(Some(crate::math::normalize_degrees(v)))
                },
                Some(TargetValue::Number(v)) => ModeValue::Setpoint(Some(v)),
            }
        } else {
            match value {
                None => ModeValue::Flag(false),
                Some(TargetValue::Bool(b)) => ModeValue::Flag(b),
                Some(TargetValue::Number(v)) if v.is_nan() => return None,
                Some(TargetValue::Number(v)) => ModeValue::Flag(v != 0.0),
            }
        };
        Some(self.store(mode, next))
    }

    /// 接通布尔模式（设定值模式请使用 [`set_target`](Self::set_target)）
    pub fn engage(&mut self, mode: ControlMode) -> Option<ModeTransition> {
        self.set_target(mode, Some(TargetValue::Bool(true)))
    }

    /// 断开任意模式
    pub fn disengage(&mut self, mode: ControlMode) -> ModeTransition {
        self.store(mode, mode.disengaged())
    }

    /// 当前全部模式值（按短代码索引）
    pub fn snapshot(&self) -> BTreeMap<&'static str, ModeValue> {
        ControlMode::ALL
            .into_iter()
            .map(|m| (m.code(), self.get(m)))
            .collect()
    }

    fn store(&mut self, mode: ControlMode, value: ModeValue) -> ModeTransition {
        let previous = std::mem::replace(&mut self.values[mode.index()], value);
        ModeTransition {
            mode,
            previous,
            current: value,
        }
    }
}
