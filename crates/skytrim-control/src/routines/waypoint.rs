//! 航路点引导

use skytrim_core::math::normalize_degrees;
use skytrim_core::{TelemetrySnapshot, WaypointQueue};
use tracing::debug;

/// 丢弃已到达的队首并返回指向新队首的磁航向（度）
///
/// 方位角以真北为基准，减去磁差后得到可直接作为航向目标的磁航向。
/// 返回值只在本周期覆盖航向目标，不写入模式注册表。
pub fn steer(
    queue: &mut WaypointQueue,
    snapshot: &TelemetrySnapshot,
    arrival_radius_km: f64,
) -> Option<f64> {
    if queue
        .invalidate(snapshot.latitude, snapshot.longitude, arrival_radius_km)
        .is_some()
    {
        debug!("{} waypoint(s) remaining", queue.len());
    }

    let head = queue.head()?;
    let bearing = head.bearing_from(snapshot.latitude, snapshot.longitude);
    Some(normalize_degrees(bearing - snapshot.magnetic_variation_deg()))
}
