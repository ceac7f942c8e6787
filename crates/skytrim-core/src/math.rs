//! 控制计算的数值工具
//!
//! 所有修正量都经过 [`bounded_lerp`]：先线性映射，再钳位到目标区间。
//! 目标区间允许降序（`dst_lo > dst_hi`），用于符号翻转的修正项。

/// 线性映射（不钳位）
///
/// 将 `v` 从 `[src_lo, src_hi]` 映射到 `[dst_lo, dst_hi]`。
/// 源区间宽度为 0 时返回 `dst_lo`，避免除零。
#[inline]
pub fn map_range(v: f64, src_lo: f64, src_hi: f64, dst_lo: f64, dst_hi: f64) -> f64 {
    let span = src_hi - src_lo;
    if span == 0.0 {
        return dst_lo;
    }
    dst_lo + (v - src_lo) * (dst_hi - dst_lo) / span
}

/// 钳位到 `[a, b]`，边界顺序无关
///
/// NaN 输入被钳位为下界，保证输出永远有界。
#[inline]
pub fn constrain(v: f64, a: f64, b: f64) -> f64 {
    let (lo, hi) = if a > b { (b, a) } else { (a, b) };
    if v.is_nan() {
        return lo;
    }
    v.clamp(lo, hi)
}

/// 有界线性插值
///
/// 先按 [`map_range`] 映射，再钳位到 `[min(dst_lo, dst_hi), max(dst_lo, dst_hi)]`。
///
/// # Example
///
/// ```
/// use skytrim_core::math::bounded_lerp;
///
/// assert_eq!(bounded_lerp(5.0, 0.0, 10.0, 0.0, 1.0), 0.5);
/// // 超出源区间时饱和
/// assert_eq!(bounded_lerp(50.0, 0.0, 10.0, 0.0, 1.0), 1.0);
/// // 降序目标区间：符号翻转
/// assert_eq!(bounded_lerp(10.0, -10.0, 10.0, 1.0, -1.0), -1.0);
/// ```
#[inline]
pub fn bounded_lerp(v: f64, src_lo: f64, src_hi: f64, dst_lo: f64, dst_hi: f64) -> f64 {
    constrain(map_range(v, src_lo, src_hi, dst_lo, dst_hi), dst_lo, dst_hi)
}

/// 保证最小幅值，保留 `sign_of` 的符号
///
/// 用于"至少推一下"的修正项：当 `v` 幅值小于 `floor` 时，返回 `±floor`。
#[inline]
pub fn with_min_magnitude(v: f64, floor: f64, sign_of: f64) -> f64 {
    if v.abs() > floor {
        v
    } else {
        floor.copysign(sign_of)
    }
}

/// 罗盘角差（度）
///
/// 返回从 `current` 转到 `target` 需要转过的角度，范围约为 `(-180, 180]`，
/// 正值表示向右（顺时针）。
///
/// # Example
///
/// ```
/// use skytrim_core::math::compass_diff;
///
/// assert_eq!(compass_diff(350.0, 10.0), 20.0);
/// assert_eq!(compass_diff(10.0, 350.0), -20.0);
/// ```
pub fn compass_diff(current: f64, target: f64) -> f64 {
    let diff = normalize_degrees(target) - normalize_degrees(current);
    if diff > 180.0 {
        diff - 360.0
    } else if diff <= -180.0 {
        diff + 360.0
    } else {
        diff
    }
}

/// 归一化到 `[0, 360)`
#[inline]
pub fn normalize_degrees(v: f64) -> f64 {
    let r = v.rem_euclid(360.0);
    if r >= 360.0 { 0.0 } else { r }
}
