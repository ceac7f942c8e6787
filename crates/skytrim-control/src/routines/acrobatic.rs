//! 特技/倒飞变体
//!
//! ACR 或 INV 接通时替代标准的平飞与垂直例程。
//!
//! 副翼：锚点作为"中心"，写入值为 `中心 + 相对坡度/180`，相对坡度以 0（正飞）
//! 或 π（倒飞）为基准。航向修正以转弯率门限驱动冲量，倒飞时反向转弯过快会被反冲。
//!
//! 升降舵：垂直速度包线随空速放大，倒飞时所有修正符号翻转。

use crate::config::AcrobaticGains;
use skytrim_core::math::with_min_magnitude;
use skytrim_core::{
    Axis, AxisBounds, TelemetrySnapshot, TrimAnchor, bounded_lerp, compass_diff, map_range,
};
use std::f64::consts::PI;

/// 相对坡度（度）
///
/// 正飞以 0 为中心，倒飞以 ±π 为中心；负坡度（右倾）从中心向下计。
pub fn relative_bank_deg(bank: f64, inverted: bool) -> f64 {
    let center = if inverted { PI } else { 0.0 };
    if bank < 0.0 {
        (center + bank).to_degrees()
    } else {
        (bank - center).to_degrees()
    }
}

/// 一次特技副翼修正的结果
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcrobaticLevelTerms {
    pub relative_bank_deg: f64,
    pub center: f64,
    pub bump: f64,
    pub counter: f64,
    /// 应写入的副翼配平
    pub output: f64,
}

/// 修正副翼中心并计算写入值
pub fn fly_level(
    snapshot: &TelemetrySnapshot,
    heading_target: Option<f64>,
    inverted: bool,
    gains: &AcrobaticGains,
    anchor: &mut TrimAnchor,
    bounds: AxisBounds,
) -> AcrobaticLevelTerms {
    let bank_rel = relative_bank_deg(snapshot.bank, inverted);
    let span = gains.center_bank_span_deg;

    let mut terms = AcrobaticLevelTerms {
        relative_bank_deg: bank_rel,
        ..Default::default()
    };

    terms.center = anchor.nudge(
        Axis::Aileron,
        bounded_lerp(bank_rel, -span, span, -gains.center_step_deg, gains.center_step_deg) / 180.0,
        bounds,
    );

    if let Some(target) = heading_target {
        let hdiff = compass_diff(snapshot.heading_deg(), target);
        let tr = snapshot.turn_rate;
        let limit = bounded_lerp(
            hdiff.abs(),
            0.0,
            gains.turn_error_span_deg,
            gains.min_turn_limit,
            gains.max_turn_limit,
        );
        let bump = with_min_magnitude(
            bounded_lerp(
                hdiff,
                -gains.bump_error_span_deg,
                gains.bump_error_span_deg,
                -gains.bump_deg,
                gains.bump_deg,
            ),
            gains.bump_floor_deg,
            hdiff,
        );

        if (hdiff < 0.0 && tr > -limit) || (hdiff > 0.0 && tr < limit) {
            terms.bump = anchor.nudge(Axis::Aileron, bump / 180.0, bounds);
        }

        if inverted && ((hdiff < 0.0 && tr > limit) || (hdiff > 0.0 && tr < -limit)) {
            terms.counter = anchor.nudge(
                Axis::Aileron,
                -gains.inverted_counter * bump / 180.0,
                bounds,
            );
        }
    }

    terms.output = (anchor.aileron + bank_rel / 180.0).clamp(-bounds.range, bounds.range);
    terms
}

/// 一次特技升降舵修正的分项（请求值）与实际生效增量
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcrobaticVerticalTerms {
    pub target_vertical_speed: f64,
    /// 垂直速度包线（ft/min）
    pub envelope: f64,
    pub proportional: f64,
    pub damping: f64,
    pub overshoot: f64,
    pub assist: f64,
    pub tripwire: f64,
    pub applied: f64,
}

/// 修正升降舵锚点
///
/// `reference_vs` 为上一周期的垂直速度，用于计算每周期变化量。
pub fn hold_vertical(
    snapshot: &TelemetrySnapshot,
    altitude_target: Option<f64>,
    inverted: bool,
    reference_vs: f64,
    gains: &AcrobaticGains,
    anchor: &mut TrimAnchor,
    bounds: AxisBounds,
) -> AcrobaticVerticalTerms {
    let factor = if inverted { -1.0 } else { 1.0 };
    let speed = snapshot.airspeed;
    let vs = snapshot.vertical_speed;

    let alt_diff = altitude_target.map_or(0.0, |target| target - snapshot.altitude);
    let envelope = if factor * alt_diff >= 0.0 {
        gains.climb_envelope_factor * speed
    } else {
        gains.descent_envelope_factor * speed
    };
    let target = if alt_diff == 0.0 {
        0.0
    } else {
        let span = gains.altitude_error_span;
        bounded_lerp(alt_diff, -span, span, -envelope, envelope)
    };

    let vs_diff = target - vs;
    let dvs = vs - reference_vs;
    let dvs_max = gains.dvs_factor * speed;

    let step = factor
        * map_range(
            speed,
            gains.step_speed_lo,
            gains.step_speed_hi,
            gains.min_step,
            gains.max_step,
        );

    let mut terms = AcrobaticVerticalTerms {
        target_vertical_speed: target,
        envelope,
        ..Default::default()
    };

    let vstep = bounded_lerp(vs_diff, -envelope, envelope, -step, step);
    terms.proportional = with_min_magnitude(vstep, gains.vstep_floor, vstep);

    let dvstep = bounded_lerp(dvs, -dvs_max, dvs_max, step / 2.0, -step / 2.0);
    terms.damping = with_min_magnitude(dvstep, gains.dvstep_floor, dvstep);

    if (vs_diff < 0.0 && dvs > dvs_max) || (vs_diff > 0.0 && dvs < -dvs_max) {
        terms.overshoot = bounded_lerp(dvs, -dvs_max, dvs_max, step, -step);
    }

    let band = gains.assist_band;
    let deadband = gains.assist_deadband;
    if (target < -deadband && 0.0 < vs && vs < band) || (target > deadband && -band < vs && vs < 0.0)
    {
        terms.assist = bounded_lerp(vs, -band, band, step / 10.0, -step / 10.0);
    }

    for wire in &gains.tripwires {
        let limit = wire * envelope;
        if (vs > limit && dvs > 0.0) || (vs < -limit && dvs < 0.0) {
            terms.tripwire += bounded_lerp(vs, -1.0, 1.0, step / 4.0, -step / 4.0);
        }
    }

    let total =
        terms.proportional + terms.damping + terms.overshoot + terms.assist + terms.tripwire;
    terms.applied = anchor.nudge(Axis::Elevator, total, bounds);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use skytrim_core::{RawTelemetry, TelemetryChannel};

    const AILERON: AxisBounds = AxisBounds::new(0.1, 1.0);
    const ELEVATOR: AxisBounds = AxisBounds::new(0.02, 0.5);

    fn snapshot(bank_deg: f64, heading_deg: f64, turn_rate: f64, altitude: f64, vs_fpm: f64) -> TelemetrySnapshot {
        let raw = RawTelemetry::new()
            .with(TelemetryChannel::OnGround, 0.0)
            .with(TelemetryChannel::Airspeed, 120.0)
            .with(TelemetryChannel::BankAngle, bank_deg.to_radians())
            .with(TelemetryChannel::TurnRate, turn_rate)
            .with(TelemetryChannel::Latitude, 0.0)
            .with(TelemetryChannel::Longitude, 0.0)
            .with(TelemetryChannel::Heading, heading_deg.to_radians())
            .with(TelemetryChannel::TrueHeading, heading_deg.to_radians())
            .with(TelemetryChannel::Altitude, altitude)
            .with(TelemetryChannel::VerticalSpeed, vs_fpm / 60.0)
            .with(TelemetryChannel::PitchTrim, 0.0)
            .with(TelemetryChannel::AileronTrim, 0.0);
        TelemetrySnapshot::build(&raw, 0.0, None).unwrap()
    }

    #[test]
    fn test_relative_bank() {
        assert_relative_eq!(relative_bank_deg(10.0_f64.to_radians(), false), 10.0, epsilon = 1e-9);
        assert_relative_eq!(relative_bank_deg((-10.0_f64).to_radians(), false), -10.0, epsilon = 1e-9);
        // 倒飞：接近 ±180° 时相对坡度接近 0
        assert_relative_eq!(relative_bank_deg(175.0_f64.to_radians(), true), -5.0, epsilon = 1e-9);
        assert_relative_eq!(relative_bank_deg((-175.0_f64).to_radians(), true), 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_upright_wings_level_output_equals_center() {
        let mut anchor = TrimAnchor::new(0.05, 0.0);
        let terms = fly_level(&snapshot(0.0, 0.0, 0.0, 1500.0, 0.0), None, false, &AcrobaticGains::default(), &mut anchor, AILERON);
        assert_eq!(terms.center, 0.0);
        assert_relative_eq!(terms.output, 0.05);
    }

    #[test]
    fn test_heading_bump_has_floor() {
        let gains = AcrobaticGains::default();
        let mut anchor = TrimAnchor::default();
        // 目标在右侧 0.5°，未转弯：冲量至少 1°
        let terms = fly_level(&snapshot(0.0, 0.0, 0.0, 1500.0, 0.0), Some(0.5), false, &gains, &mut anchor, AILERON);
        assert_relative_eq!(terms.bump, gains.bump_floor_deg / 180.0, epsilon = 1e-12);
        assert_eq!(terms.counter, 0.0);
    }

    #[test]
    fn test_inverted_counter_when_turning_wrong_way() {
        let gains = AcrobaticGains::default();
        let mut anchor = TrimAnchor::default();
        // 倒飞，目标在右侧 20°，却在快速左转
        let terms = fly_level(&snapshot(180.0, 0.0, -0.1, 1500.0, 0.0), Some(20.0), true, &gains, &mut anchor, AILERON);
        assert_relative_eq!(terms.bump, 5.0 / 180.0, epsilon = 1e-12);
        assert_relative_eq!(terms.counter, -1.1 * 5.0 / 180.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverted_flips_elevator_sign() {
        let gains = AcrobaticGains::default();
        let snap = snapshot(0.0, 0.0, 0.0, 1500.0, 0.0);

        let mut upright = TrimAnchor::default();
        let up = hold_vertical(&snap, Some(2000.0), false, 0.0, &gains, &mut upright, ELEVATOR);
        let mut inverted = TrimAnchor::default();
        let inv = hold_vertical(&snap, Some(2000.0), true, 0.0, &gains, &mut inverted, ELEVATOR);

        assert!(up.applied > 0.0);
        assert!(inv.applied < 0.0);
        // 爬升包线：10 × 空速
        assert_relative_eq!(up.envelope, 1200.0);
        assert_relative_eq!(up.target_vertical_speed, 1200.0);
    }

    #[test]
    fn test_no_altitude_target_holds_zero_vs() {
        let gains = AcrobaticGains::default();
        let mut anchor = TrimAnchor::default();
        let terms = hold_vertical(&snapshot(0.0, 0.0, 0.0, 1500.0, 0.0), None, false, 0.0, &gains, &mut anchor, ELEVATOR);
        assert_eq!(terms.target_vertical_speed, 0.0);
        assert_eq!(terms.overshoot, 0.0);
        assert_eq!(terms.tripwire, 0.0);
    }

    #[test]
    fn test_tripwires_fire_when_diverging() {
        let gains = AcrobaticGains::default();
        let mut anchor = TrimAnchor::default();
        // 无高度目标时包线为 10 × 120 = 1200；以 5000 ft/min 爬升且仍在加速，越过 2、4 两档
        let terms = hold_vertical(&snapshot(0.0, 0.0, 0.0, 1500.0, 5000.0), None, false, 4900.0, &gains, &mut anchor, ELEVATOR);
        let step = map_range(120.0, 50.0, 200.0, gains.min_step, gains.max_step);
        assert_relative_eq!(terms.tripwire, -2.0 * step / 4.0, epsilon = 1e-12);
        assert!(terms.applied < 0.0);
    }
}
