//! 平飞/航向保持
//!
//! 目标：坡度误差与坡度变化率同时趋零。
//!
//! 1. 比例项：`diff = target_bank - bank`，映射到 `±step`（符号翻转：需要更大坡度时减小副翼配平）
//! 2. 阻尼项：`dBank` 映射到 `±damping_weight·step`
//! 3. 转弯率限制：实际转弯率超过上限时，按超出量施加 `±step/overshoot_divisor` 的反向修正
//!
//! 坡度为负表示右倾（航向增加）。

use crate::config::LevelGains;
use skytrim_core::{Axis, AxisBounds, TelemetrySnapshot, TrimAnchor, bounded_lerp, compass_diff};

/// 一次平飞修正的分项（实际生效的增量）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelTerms {
    /// 目标坡度（度）
    pub target_bank_deg: f64,
    /// 本周期允许的最大转弯率（度/秒）
    pub max_turn_rate_deg: f64,
    pub proportional: f64,
    pub damping: f64,
    pub turn_limit: f64,
}

impl LevelTerms {
    /// 本周期对副翼锚点的总增量
    pub fn total(&self) -> f64 {
        self.proportional + self.damping + self.turn_limit
    }
}

/// 速度相关的最大坡度（度）
pub fn max_bank_deg(speed: f64, gains: &LevelGains) -> f64 {
    bounded_lerp(
        speed,
        gains.bank_speed_lo,
        gains.bank_speed_hi,
        gains.min_bank_deg,
        gains.max_bank_deg,
    )
}

/// 速度相关的单步配平量（rad）
pub fn trim_step(speed: f64, gains: &LevelGains) -> f64 {
    bounded_lerp(
        speed,
        gains.step_speed_lo,
        gains.step_speed_hi,
        gains.min_step_deg.to_radians(),
        gains.max_step_deg.to_radians(),
    )
}

/// 修正副翼锚点
///
/// `heading_target` 为本周期生效的航向目标（度），可能来自航路点。
pub fn fly_level(
    snapshot: &TelemetrySnapshot,
    heading_target: Option<f64>,
    gains: &LevelGains,
    anchor: &mut TrimAnchor,
    bounds: AxisBounds,
) -> LevelTerms {
    let bank = snapshot.bank_deg();
    let max_bank = max_bank_deg(snapshot.airspeed, gains);
    let step = trim_step(snapshot.airspeed, gains);
    let max_dbank = gains.max_dbank_deg.to_radians();

    let mut target_bank = 0.0;
    let mut max_turn_rate = gains.max_turn_rate_deg;

    if let Some(target) = heading_target {
        let hdiff = compass_diff(snapshot.heading_deg(), target);
        let span = gains.heading_error_span_deg;
        target_bank = bounded_lerp(hdiff, -span, span, max_bank, -max_bank);
        max_turn_rate = bounded_lerp(
            hdiff.abs(),
            0.0,
            gains.turn_error_span_deg,
            gains.min_turn_rate_deg,
            gains.max_turn_rate_deg,
        );
    }

    let diff = target_bank - bank;
    let proportional = anchor.nudge(
        Axis::Aileron,
        -bounded_lerp(diff, -max_bank, max_bank, -step, step),
        bounds,
    );

    let weight = gains.damping_weight * step;
    let damping = anchor.nudge(
        Axis::Aileron,
        bounded_lerp(snapshot.derivatives.d_bank, -max_dbank, max_dbank, -weight, weight),
        bounds,
    );

    let turn_rate = snapshot.turn_rate_deg();
    let mut turn_limit = 0.0;
    if turn_rate.abs() > max_turn_rate {
        let overshoot = turn_rate - max_turn_rate.copysign(turn_rate);
        let cap = step / gains.overshoot_divisor;
        turn_limit = anchor.nudge(
            Axis::Aileron,
            -bounded_lerp(overshoot, -max_turn_rate, max_turn_rate, -cap, cap),
            bounds,
        );
    }

    LevelTerms {
        target_bank_deg: target_bank,
        max_turn_rate_deg: max_turn_rate,
        proportional,
        damping,
        turn_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use skytrim_core::{RawTelemetry, TelemetryChannel};

    const BOUNDS: AxisBounds = AxisBounds::new(0.1, 1.0);

    fn snapshot(bank_deg: f64, turn_rate_deg: f64, heading_deg: f64, speed: f64) -> TelemetrySnapshot {
        let raw = RawTelemetry::new()
            .with(TelemetryChannel::OnGround, 0.0)
            .with(TelemetryChannel::Airspeed, speed)
            .with(TelemetryChannel::BankAngle, bank_deg.to_radians())
            .with(TelemetryChannel::TurnRate, turn_rate_deg.to_radians())
            .with(TelemetryChannel::Latitude, 0.0)
            .with(TelemetryChannel::Longitude, 0.0)
            .with(TelemetryChannel::Heading, heading_deg.to_radians())
            .with(TelemetryChannel::TrueHeading, heading_deg.to_radians())
            .with(TelemetryChannel::Altitude, 1500.0)
            .with(TelemetryChannel::VerticalSpeed, 0.0)
            .with(TelemetryChannel::PitchTrim, 0.0)
            .with(TelemetryChannel::AileronTrim, 0.0);
        TelemetrySnapshot::build(&raw, 0.0, None).unwrap()
    }

    #[test]
    fn test_wings_level_produces_zero_nudge() {
        let mut anchor = TrimAnchor::new(0.12, 0.0);
        let terms = fly_level(&snapshot(0.0, 0.0, 90.0, 100.0), None, &LevelGains::default(), &mut anchor, BOUNDS);
        assert_eq!(terms.total(), 0.0);
        assert_eq!(anchor.aileron, 0.12);
    }

    #[test]
    fn test_right_bank_decreases_aileron_trim() {
        // 右倾（负坡度）时 diff > 0，减小副翼配平使坡度回正
        let gains = LevelGains::default();
        let mut anchor = TrimAnchor::default();
        let terms = fly_level(&snapshot(-10.0, 0.0, 90.0, 100.0), None, &gains, &mut anchor, BOUNDS);
        let step = trim_step(100.0, &gains);
        // diff = 10°，最大坡度 100 kt 时约 16.7°
        assert!(terms.proportional < 0.0);
        assert!(terms.proportional > -step);
        assert_relative_eq!(anchor.aileron, terms.total());
    }

    #[test]
    fn test_speed_envelope() {
        let gains = LevelGains::default();
        assert_relative_eq!(max_bank_deg(50.0, &gains), 10.0);
        assert_relative_eq!(max_bank_deg(125.0, &gains), 20.0);
        assert_relative_eq!(max_bank_deg(400.0, &gains), 30.0);
        assert_relative_eq!(trim_step(20.0, &gains), 1.0_f64.to_radians());
        assert_relative_eq!(trim_step(150.0, &gains), 2.0_f64.to_radians());
    }

    #[test]
    fn test_heading_target_right_requests_right_bank() {
        let mut anchor = TrimAnchor::default();
        let terms = fly_level(
            &snapshot(0.0, 0.0, 0.0, 200.0),
            Some(90.0),
            &LevelGains::default(),
            &mut anchor,
            BOUNDS,
        );
        assert_relative_eq!(terms.target_bank_deg, -30.0);
        assert_relative_eq!(terms.max_turn_rate_deg, 3.0);
        // 需要右倾：副翼锚点增加
        assert!(anchor.aileron > 0.0);
    }

    #[test]
    fn test_turn_rate_cap_counters_overshoot() {
        let gains = LevelGains::default();
        let mut anchor = TrimAnchor::default();
        // 航向已对准，仍在以 2°/s 右转：误差为 0 时上限为 0.02°/s
        let terms = fly_level(&snapshot(0.0, 2.0, 45.0, 100.0), Some(45.0), &gains, &mut anchor, BOUNDS);
        assert_relative_eq!(terms.max_turn_rate_deg, 0.02);
        let step = trim_step(100.0, &gains);
        assert_relative_eq!(terms.turn_limit, -step / 5.0, epsilon = 1e-12);
    }
}
