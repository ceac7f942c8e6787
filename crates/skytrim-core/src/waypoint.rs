//! 航路点队列（FIFO）
//!
//! 队首航路点在大圆距离小于到达半径时被移除。

use crate::geo::{bearing_deg, distance_km};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::info;

/// 缺省到达半径（km）
pub const DEFAULT_ARRIVAL_RADIUS_KM: f64 = 0.2;

/// 航路点错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaypointError {
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),
    #[error("Invalid altitude: {0}")]
    InvalidAltitude(f64),
}

/// 航路点（度，高度 ft 可选）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub long: f64,
    pub alt: Option<f64>,
}

impl Waypoint {
    /// 校验并创建航路点
    pub fn new(lat: f64, long: f64, alt: Option<f64>) -> Result<Self, WaypointError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(WaypointError::InvalidLatitude(lat));
        }
        if !long.is_finite() || !(-180.0..=180.0).contains(&long) {
            return Err(WaypointError::InvalidLongitude(long));
        }
        if let Some(a) = alt
            && !a.is_finite()
        {
            return Err(WaypointError::InvalidAltitude(a));
        }
        Ok(Self { lat, long, alt })
    }

    /// 从当前位置到此航路点的距离（km）
    pub fn distance_from(&self, lat: f64, long: f64) -> f64 {
        distance_km(lat, long, self.lat, self.long)
    }

    /// 从当前位置指向此航路点的真方位（度）
    pub fn bearing_from(&self, lat: f64, long: f64) -> f64 {
        bearing_deg(lat, long, self.lat, self.long)
    }
}

/// 航路点队列
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaypointQueue {
    points: VecDeque<Waypoint>,
}

impl WaypointQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加航路点
    pub fn add(&mut self, lat: f64, long: f64, alt: Option<f64>) -> Result<Waypoint, WaypointError> {
        let waypoint = Waypoint::new(lat, long, alt)?;
        info!("Adding waypoint {},{}", lat, long);
        self.points.push_back(waypoint);
        Ok(waypoint)
    }

    /// 移除第一个坐标完全相同的航路点
    pub fn remove(&mut self, lat: f64, long: f64) -> bool {
        match self
            .points
            .iter()
            .position(|w| w.lat == lat && w.long == long)
        {
            Some(pos) => {
                info!("Removing waypoint {},{}", lat, long);
                self.points.remove(pos);
                true
            },
            None => false,
        }
    }

    /// 队首
    pub fn head(&self) -> Option<&Waypoint> {
        self.points.front()
    }

    /// 当前位置到队首的距离（km）
    pub fn distance_to_head(&self, lat: f64, long: f64) -> Option<f64> {
        self.head().map(|w| w.distance_from(lat, long))
    }

    /// 已到达则移除队首，返回被移除的航路点
    pub fn invalidate(&mut self, lat: f64, long: f64, radius_km: f64) -> Option<Waypoint> {
        let reached = self.distance_to_head(lat, long)? < radius_km;
        if reached {
            let waypoint = self.points.pop_front();
            if let Some(w) = &waypoint {
                info!("Reached waypoint {},{}", w.lat, w.long);
            }
            waypoint
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<Waypoint> {
        self.points.iter().copied().collect()
    }
}
