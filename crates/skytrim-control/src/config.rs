//! # 自动驾驶配置
//!
//! 所有增益都是经验调参常数，按例程分节，以 TOML 加载。
//! 缺省值即 [`Default`] 实现，配置文件只需写出要覆盖的字段。
//!
//! ```toml
//! interval_ms = 166
//!
//! [level]
//! max_bank_deg = 25.0
//!
//! [vertical]
//! max_vertical_speed = 800.0
//! ```

use serde::{Deserialize, Serialize};
use skytrim_core::{AxisBounds, TrimLimits};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 自动驾驶配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// 调度间隔（毫秒）
    pub interval_ms: u64,
    /// 自动起飞期间的调度间隔（毫秒）
    pub takeoff_interval_ms: u64,
    pub level: LevelGains,
    pub vertical: VerticalGains,
    pub acrobatic: AcrobaticGains,
    pub takeoff: TakeoffGains,
    pub waypoint: WaypointConfig,
    pub trim: TrimConfig,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            interval_ms: 166,
            takeoff_interval_ms: 100,
            level: LevelGains::default(),
            vertical: VerticalGains::default(),
            acrobatic: AcrobaticGains::default(),
            takeoff: TakeoffGains::default(),
            waypoint: WaypointConfig::default(),
            trim: TrimConfig::default(),
        }
    }
}

impl AutopilotConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 保存到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn takeoff_interval(&self) -> Duration {
        Duration::from_millis(self.takeoff_interval_ms)
    }

    /// 校验
    ///
    /// 检查间隔非零、增益有限、插值区间宽度非零、限幅为正。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 || self.takeoff_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "interval_ms and takeoff_interval_ms must be > 0".to_string(),
            ));
        }

        let l = &self.level;
        let v = &self.vertical;
        let a = &self.acrobatic;
        let t = &self.takeoff;
        let values = [
            ("level.min_bank_deg", l.min_bank_deg),
            ("level.max_bank_deg", l.max_bank_deg),
            ("level.min_step_deg", l.min_step_deg),
            ("level.max_step_deg", l.max_step_deg),
            ("level.max_dbank_deg", l.max_dbank_deg),
            ("level.damping_weight", l.damping_weight),
            ("level.max_turn_rate_deg", l.max_turn_rate_deg),
            ("level.min_turn_rate_deg", l.min_turn_rate_deg),
            ("level.overshoot_divisor", l.overshoot_divisor),
            ("level.manual_trim_threshold", l.manual_trim_threshold),
            ("vertical.max_vertical_speed", v.max_vertical_speed),
            ("vertical.min_trim_step_deg", v.min_trim_step_deg),
            ("vertical.max_trim_step_deg", v.max_trim_step_deg),
            ("vertical.kick_factor", v.kick_factor),
            ("vertical.max_dvs", v.max_dvs),
            ("acrobatic.center_step_deg", a.center_step_deg),
            ("acrobatic.bump_deg", a.bump_deg),
            ("acrobatic.bump_floor_deg", a.bump_floor_deg),
            ("acrobatic.inverted_counter", a.inverted_counter),
            ("acrobatic.inverted_trim_bias", a.inverted_trim_bias),
            ("acrobatic.upright_trim_bias", a.upright_trim_bias),
            ("takeoff.throttle_step", t.throttle_step),
            ("takeoff.rotate_factor", t.rotate_factor),
            ("takeoff.handoff_altitude", t.handoff_altitude),
            ("takeoff.release_elevator", t.release_elevator),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::Invalid(format!("{} must be finite, got {}", name, value)));
        }

        let spans = [
            ("level.bank_speed", l.bank_speed_lo, l.bank_speed_hi),
            ("level.step_speed", l.step_speed_lo, l.step_speed_hi),
            ("level.heading_error_span_deg", 0.0, l.heading_error_span_deg),
            ("level.turn_error_span_deg", 0.0, l.turn_error_span_deg),
            ("vertical.altitude_error_span", 0.0, v.altitude_error_span),
            ("vertical.trim_limit", v.trim_limit_lo, v.trim_limit_hi),
            ("vertical.dvs_error_span", 0.0, v.dvs_error_span),
            ("vertical.pull_span", 0.0, v.pull_span),
            ("acrobatic.center_bank_span_deg", 0.0, a.center_bank_span_deg),
            ("acrobatic.turn_error_span_deg", 0.0, a.turn_error_span_deg),
            ("acrobatic.bump_error_span_deg", 0.0, a.bump_error_span_deg),
            ("acrobatic.altitude_error_span", 0.0, a.altitude_error_span),
            ("acrobatic.step_speed", a.step_speed_lo, a.step_speed_hi),
            ("takeoff.weight", t.weight_lo, t.weight_hi),
            ("takeoff.stall_speed_sq", t.stall_speed_sq_lo, t.stall_speed_sq_hi),
        ];
        for (name, lo, hi) in spans {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(ConfigError::Invalid(format!(
                    "{} range must be finite and increasing, got [{}, {}]",
                    name, lo, hi
                )));
            }
        }

        let positive = [
            ("trim.aileron_max_step", self.trim.aileron_max_step),
            ("trim.aileron_range", self.trim.aileron_range),
            ("trim.elevator_max_step", self.trim.elevator_max_step),
            ("trim.elevator_range", self.trim.elevator_range),
            ("waypoint.arrival_radius_km", self.waypoint.arrival_radius_km),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| !(v.is_finite() && *v > 0.0)) {
            return Err(ConfigError::Invalid(format!("{} must be > 0, got {}", name, value)));
        }

        Ok(())
    }
}

/// 平飞/航向保持增益
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelGains {
    /// 最大坡度包线：`bank_speed_lo` kt 时 `min_bank_deg`，`bank_speed_hi` kt 时 `max_bank_deg`
    pub min_bank_deg: f64,
    pub max_bank_deg: f64,
    pub bank_speed_lo: f64,
    pub bank_speed_hi: f64,
    /// 单步配平量（度，按弧度施加）
    pub min_step_deg: f64,
    pub max_step_deg: f64,
    pub step_speed_lo: f64,
    pub step_speed_hi: f64,
    /// 航向误差映射到目标坡度的区间（±度）
    pub heading_error_span_deg: f64,
    /// 坡度变化率饱和值（度/秒）
    pub max_dbank_deg: f64,
    /// 阻尼项权重（相对单步配平量）
    pub damping_weight: f64,
    /// 转弯率上限（度/秒）
    pub max_turn_rate_deg: f64,
    /// 航向误差为 0 时的转弯率上限（度/秒）
    pub min_turn_rate_deg: f64,
    /// 航向误差映射到转弯率上限的区间（度）
    pub turn_error_span_deg: f64,
    /// 转弯率超限修正 = 单步配平量 / `overshoot_divisor`
    pub overshoot_divisor: f64,
    /// 检测到手动副翼配平时吸收为新的锚点
    pub follow_manual_trim: bool,
    /// 判定为手动配平的偏差阈值
    pub manual_trim_threshold: f64,
}

impl Default for LevelGains {
    fn default() -> Self {
        Self {
            min_bank_deg: 10.0,
            max_bank_deg: 30.0,
            bank_speed_lo: 50.0,
            bank_speed_hi: 200.0,
            min_step_deg: 1.0,
            max_step_deg: 2.0,
            step_speed_lo: 50.0,
            step_speed_hi: 150.0,
            heading_error_span_deg: 30.0,
            max_dbank_deg: 1.0,
            damping_weight: 0.5,
            max_turn_rate_deg: 3.0,
            min_turn_rate_deg: 0.02,
            turn_error_span_deg: 10.0,
            overshoot_divisor: 5.0,
            follow_manual_trim: false,
            manual_trim_threshold: 0.01,
        }
    }
}

/// 垂直速度/高度保持增益
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerticalGains {
    /// 最大垂直速度（ft/min）
    pub max_vertical_speed: f64,
    /// 高度误差饱和值（±ft）
    pub altitude_error_span: f64,
    /// 配平单步：配平上限 `trim_limit_lo` 时 `min_trim_step_deg`，`trim_limit_hi` 时 `max_trim_step_deg`
    pub min_trim_step_deg: f64,
    pub max_trim_step_deg: f64,
    pub trim_limit_lo: f64,
    pub trim_limit_hi: f64,
    /// 踢舵量 = `kick_factor` × 配平单步
    pub kick_factor: f64,
    /// 远离目标时允许的最大垂直加速度（ft/min 每秒）
    pub max_dvs: f64,
    /// 垂直速度误差映射到加速度上限的区间（ft/min）
    pub dvs_error_span: f64,
    /// 稳态拉动项的误差饱和值（±ft/min）
    pub pull_span: f64,
}

impl Default for VerticalGains {
    fn default() -> Self {
        Self {
            max_vertical_speed: 1000.0,
            altitude_error_span: 200.0,
            min_trim_step_deg: 0.001,
            max_trim_step_deg: 0.01,
            trim_limit_lo: 5.0,
            trim_limit_hi: 20.0,
            kick_factor: 10.0,
            max_dvs: 20.0,
            dvs_error_span: 100.0,
            pull_span: 1000.0,
        }
    }
}

/// 特技/倒飞增益
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcrobaticGains {
    /// 中心修正：坡度 ±`center_bank_span_deg` 映射到 ±`center_step_deg`
    pub center_bank_span_deg: f64,
    pub center_step_deg: f64,
    /// 转弯率门限（rad/s）：航向误差 0 时 `min_turn_limit`，`turn_error_span_deg` 时 `max_turn_limit`
    pub min_turn_limit: f64,
    pub max_turn_limit: f64,
    pub turn_error_span_deg: f64,
    /// 航向冲量：误差 ±`bump_error_span_deg` 映射到 ±`bump_deg`，幅值不低于 `bump_floor_deg`
    pub bump_deg: f64,
    pub bump_error_span_deg: f64,
    pub bump_floor_deg: f64,
    /// 倒飞时反向转弯过快的反冲倍数
    pub inverted_counter: f64,
    /// 垂直速度包线 = 因子 × 空速（同向/反向）
    pub climb_envelope_factor: f64,
    pub descent_envelope_factor: f64,
    /// 高度误差饱和值（±ft）
    pub altitude_error_span: f64,
    /// 配平单步（rad）：`step_speed_lo` kt 时 `min_step`，`step_speed_hi` kt 时 `max_step`（不钳位）
    pub min_step: f64,
    pub max_step: f64,
    pub step_speed_lo: f64,
    pub step_speed_hi: f64,
    /// 每周期垂直速度变化上限 = 因子 × 空速
    pub dvs_factor: f64,
    pub vstep_floor: f64,
    pub dvstep_floor: f64,
    /// 下沉/爬升辅助的垂直速度带宽（ft/min）与目标死区
    pub assist_band: f64,
    pub assist_deadband: f64,
    /// 越界保护倍数
    pub tripwires: Vec<f64>,
    /// 接通/断开倒飞时的升降舵配平
    pub inverted_trim_bias: f64,
    pub upright_trim_bias: f64,
}

impl Default for AcrobaticGains {
    fn default() -> Self {
        let msfs_radian = std::f64::consts::PI / 10.0;
        Self {
            center_bank_span_deg: 5.0,
            center_step_deg: 2.0,
            min_turn_limit: 0.01,
            max_turn_limit: 0.03,
            turn_error_span_deg: 10.0,
            bump_deg: 5.0,
            bump_error_span_deg: 20.0,
            bump_floor_deg: 1.0,
            inverted_counter: 1.1,
            climb_envelope_factor: 10.0,
            descent_envelope_factor: 5.0,
            altitude_error_span: 500.0,
            min_step: msfs_radian / 200.0,
            max_step: msfs_radian / 120.0,
            step_speed_lo: 50.0,
            step_speed_hi: 200.0,
            dvs_factor: 0.5,
            vstep_floor: 1e-5,
            dvstep_floor: 5e-6,
            assist_band: 100.0,
            assist_deadband: 5.0,
            tripwires: vec![2.0, 4.0, 6.0],
            inverted_trim_bias: -0.1,
            upright_trim_bias: 0.05,
        }
    }
}

/// 自动起飞增益
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TakeoffGains {
    /// 每周期油门增量（%）
    pub throttle_step: f64,
    /// 抬轮速度 = `rotate_factor` × 最小抬轮速度
    pub rotate_factor: f64,
    /// 重量缩放区间（lb）
    pub weight_lo: f64,
    pub weight_hi: f64,
    /// 抬轮拉杆量（按重量插值）
    pub min_pull_back: f64,
    pub max_pull_back: f64,
    /// 抬轮时升降舵锚点预置（按重量插值）
    pub min_elevator_bias: f64,
    pub max_elevator_bias: f64,
    /// 交接垂直速度门限（ft/min，按重量插值）
    pub min_handoff_vs: f64,
    pub max_handoff_vs: f64,
    /// 方向舵增益（按失速速度平方插值；无失速速度时用 `default_rudder_factor`）
    pub stall_speed_sq_lo: f64,
    pub stall_speed_sq_hi: f64,
    pub min_rudder_factor: f64,
    pub max_rudder_factor: f64,
    pub default_rudder_factor: f64,
    /// 交接后的高度目标（ft）
    pub handoff_altitude: f64,
    /// 升降舵回中到此值以下时结束起飞
    pub release_elevator: f64,
    /// 交接后每周期回中量 = 记录的升降舵 / `ease_divisor`
    pub ease_divisor: f64,
    /// 爬升过快时升降舵 /= `climb_ease_divisor`
    pub climb_ease_divisor: f64,
    /// 触发二段回中的垂直速度（ft/min）
    pub climb_ease_vs: f64,
    /// 判定改平的垂直速度（ft/min）
    pub level_vs: f64,
}

impl Default for TakeoffGains {
    fn default() -> Self {
        Self {
            throttle_step: 5.0,
            rotate_factor: 1.1,
            weight_lo: 3000.0,
            weight_hi: 6500.0,
            min_pull_back: 0.005,
            max_pull_back: 0.5,
            min_elevator_bias: 0.0,
            max_elevator_bias: 0.1,
            min_handoff_vs: 300.0,
            max_handoff_vs: 1000.0,
            stall_speed_sq_lo: 2500.0,
            stall_speed_sq_hi: 6000.0,
            min_rudder_factor: 0.05,
            max_rudder_factor: 0.3,
            default_rudder_factor: 0.3,
            handoff_altitude: 1500.0,
            release_elevator: 0.015,
            ease_divisor: 20.0,
            climb_ease_divisor: 5.0,
            climb_ease_vs: 1000.0,
            level_vs: 100.0,
        }
    }
}

/// 航路点配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaypointConfig {
    /// 到达半径（km）
    pub arrival_radius_km: f64,
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            arrival_radius_km: skytrim_core::DEFAULT_ARRIVAL_RADIUS_KM,
        }
    }
}

/// 配平锚点限幅
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    pub aileron_max_step: f64,
    /// 副翼锚点范围（±），写入值同样钳位
    pub aileron_range: f64,
    pub elevator_max_step: f64,
    /// 升降舵锚点范围（±rad），另受模拟器配平上下限约束
    pub elevator_range: f64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            aileron_max_step: 0.1,
            aileron_range: 1.0,
            elevator_max_step: 0.02,
            elevator_range: 0.5,
        }
    }
}

impl TrimConfig {
    pub fn aileron_bounds(&self) -> AxisBounds {
        AxisBounds::new(self.aileron_max_step, self.aileron_range)
    }

    /// 升降舵限幅
    ///
    /// 配平上下限以度报告，配平位置以弧度写入。
    pub fn elevator_bounds(&self, limits: TrimLimits) -> AxisBounds {
        let limit = limits.up.abs().max(limits.down.abs()).to_radians();
        let range = if limit > 0.0 {
            self.elevator_range.min(limit)
        } else {
            self.elevator_range
        };
        AxisBounds::new(self.elevator_max_step, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = AutopilotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.interval(), Duration::from_millis(166));
        assert_eq!(config.takeoff_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AutopilotConfig::from_toml_str(
            r#"
interval_ms = 250

[level]
max_bank_deg = 25.0
"#,
        )
        .unwrap();
        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.level.max_bank_deg, 25.0);
        assert_eq!(config.level.min_bank_deg, 10.0);
        assert_eq!(config.vertical, VerticalGains::default());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AutopilotConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(AutopilotConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let err = AutopilotConfig::from_toml_str("interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_inverted_span() {
        let mut config = AutopilotConfig::default();
        config.level.bank_speed_lo = 200.0;
        config.level.bank_speed_hi = 50.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("level.bank_speed"));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = AutopilotConfig::from_toml_str("interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_elevator_bounds_follow_trim_limits() {
        let trim = TrimConfig::default();
        let bounds = trim.elevator_bounds(TrimLimits::default());
        assert_relative_eq!(bounds.range, 10.0_f64.to_radians());
        let wide = trim.elevator_bounds(TrimLimits {
            up: 60.0,
            down: -60.0,
        });
        assert_relative_eq!(wide.range, 0.5);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autopilot.toml");
        let mut config = AutopilotConfig::default();
        config.takeoff.handoff_altitude = 2500.0;
        config.save_to_file(&path).unwrap();
        let loaded = AutopilotConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.takeoff.handoff_altitude, 2500.0);
    }
}
