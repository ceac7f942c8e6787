//! 大圆距离与方位角
//!
//! 地球按半径 6371 km 的球体处理，距离单位为公里。

/// 地球平均半径（km）
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// 两点间大圆距离（haversine，km）
///
/// 输入为十进制度。
pub fn distance_km(lat1: f64, long1: f64, lat2: f64, long2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_long = (long2 - long1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + (d_long / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// 从 `(lat1, long1)` 指向 `(lat2, long2)` 的初始真方位角（度，`(-180, 180]`）
pub fn bearing_deg(lat1: f64, long1: f64, lat2: f64, long2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let d_long = (long2 - long1).to_radians();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_long.cos();
    let y = lat2.cos() * d_long.sin();
    y.atan2(x).to_degrees()
}

/// 从起点沿真方位 `heading_deg` 前进 `distance` km 后的位置（度）
pub fn destination(lat: f64, long: f64, distance: f64, heading_deg: f64) -> (f64, f64) {
    let lat1 = lat.to_radians();
    let long1 = long.to_radians();
    let a = heading_deg.to_radians();
    let angular = distance / EARTH_RADIUS_KM;
    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * a.cos()).asin();
    let dx = angular.cos() - lat1.sin() * lat2.sin();
    let dy = a.sin() * angular.sin() * lat1.cos();
    let long2 = long1 + dy.atan2(dx);
    (lat2.to_degrees(), long2.to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_destination_roundtrip_distance_and_bearing() {
        let (lat, long) = destination(48.9, -123.7, 3.0, 45.0);
        assert_relative_eq!(distance_km(48.9, -123.7, lat, long), 3.0, epsilon = 1e-6);
        assert_relative_eq!(bearing_deg(48.9, -123.7, lat, long), 45.0, epsilon = 1e-3);
    }

    #[test]
    fn test_distance_same_point_is_zero() {
        assert_relative_eq!(distance_km(48.9, -123.7, 48.9, -123.7), 0.0);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        // 一度纬度约 111.19 km
        let d = distance_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.01, "distance = {}", d);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert_relative_eq!(bearing_deg(0.0, 0.0, 1.0, 0.0), 0.0, epsilon = 1e-9);
        assert_relative_eq!(bearing_deg(0.0, 0.0, 0.0, 1.0), 90.0, epsilon = 1e-9);
        assert_relative_eq!(bearing_deg(0.0, 0.0, 0.0, -1.0), -90.0, epsilon = 1e-9);
        assert_relative_eq!(bearing_deg(1.0, 0.0, 0.0, 0.0).abs(), 180.0, epsilon = 1e-9);
    }
}
