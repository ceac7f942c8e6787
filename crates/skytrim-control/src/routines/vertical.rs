//! 垂直速度/高度保持
//!
//! 高度目标先换算成目标垂直速度（误差 ±`altitude_error_span` 饱和到 ±`max_vertical_speed`），
//! 再对升降舵锚点施加三类修正：
//!
//! - 垂直加速度过大时的反向踢舵
//! - 垂直速度越过包线且仍在远离时的限位
//! - 始终生效的稳态拉动
//!
//! 升降舵配平增加使机头抬起、垂直速度增加。

use crate::config::VerticalGains;
use skytrim_core::{Axis, AxisBounds, TelemetrySnapshot, TrimAnchor, TrimLimits, bounded_lerp};

/// 一次垂直修正的分项（实际生效的增量）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VerticalTerms {
    /// 目标垂直速度（ft/min）
    pub target_vertical_speed: f64,
    pub overshoot: f64,
    pub limit: f64,
    pub pull: f64,
}

impl VerticalTerms {
    pub fn total(&self) -> f64 {
        self.overshoot + self.limit + self.pull
    }
}

/// 目标垂直速度（ft/min）
///
/// 未设置高度目标时为 0（保持当前高度附近的平飞）。
pub fn target_vertical_speed(
    altitude_target: Option<f64>,
    altitude: f64,
    gains: &VerticalGains,
) -> f64 {
    match altitude_target {
        Some(target) => bounded_lerp(
            target - altitude,
            -gains.altitude_error_span,
            gains.altitude_error_span,
            -gains.max_vertical_speed,
            gains.max_vertical_speed,
        ),
        None => 0.0,
    }
}

/// 配平单步（rad），随飞机配平行程缩放
pub fn trim_step(limits: TrimLimits, gains: &VerticalGains) -> f64 {
    let limit = if limits.up == 0.0 {
        TrimLimits::default().up
    } else {
        limits.up
    };
    bounded_lerp(
        limit,
        gains.trim_limit_lo,
        gains.trim_limit_hi,
        gains.min_trim_step_deg.to_radians(),
        gains.max_trim_step_deg.to_radians(),
    )
}

/// 修正升降舵锚点
pub fn hold_vertical(
    snapshot: &TelemetrySnapshot,
    altitude_target: Option<f64>,
    gains: &VerticalGains,
    anchor: &mut TrimAnchor,
    bounds: AxisBounds,
) -> VerticalTerms {
    let vs = snapshot.vertical_speed;
    let dvs = snapshot.derivatives.d_vertical_speed;
    let max_vs = gains.max_vertical_speed;

    let target = target_vertical_speed(altitude_target, snapshot.altitude, gains);
    let step = trim_step(snapshot.pitch_trim_limits, gains);
    let kick = gains.kick_factor * step;

    let diff = target - vs;
    let max_dvs = 1.0 + bounded_lerp(diff.abs(), 0.0, gains.dvs_error_span, 0.0, gains.max_dvs - 1.0);

    let mut terms = VerticalTerms {
        target_vertical_speed: target,
        ..Default::default()
    };

    if dvs.abs() > max_dvs {
        let span = 10.0 * max_dvs;
        terms.overshoot = anchor.nudge(
            Axis::Elevator,
            bounded_lerp(dvs, -span, span, kick, -kick),
            bounds,
        );
    }

    if (vs < -max_vs && dvs <= 0.0) || (vs > max_vs && dvs >= 0.0) {
        terms.limit = anchor.nudge(
            Axis::Elevator,
            bounded_lerp(vs, -max_vs, max_vs, step, -step),
            bounds,
        );
    }

    terms.pull = anchor.nudge(
        Axis::Elevator,
        bounded_lerp(diff, -gains.pull_span, gains.pull_span, -kick, kick),
        bounds,
    );

    terms
}
