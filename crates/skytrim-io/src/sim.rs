//! 简化飞行模型
//!
//! 一个粗糙的运动学模型，用于在没有真实模拟器时驱动控制循环。
//! 不是气动建模：只保证控制量的符号与量级大致正确。
//!
//! # 符号约定（与模拟器一致）
//!
//! - 坡度为负 = 右倾 = 航向增加（转弯率为正）
//! - 副翼配平减小 → 坡度增加
//! - 升降舵配平/升降舵位置增大 → 抬头（垂直速度增加）
//!
//! # 时间推进
//!
//! 测试中显式调用 [`SimulatedAircraft::advance`]；CLI 中使用
//! [`SimulatedAircraft::realtime`]，每次读取时按墙钟时间追赶。

use crate::channels;
use crate::{IoError, VehicleIo};
use skytrim_core::TelemetryChannel;
use skytrim_core::geo::destination;
use std::time::Instant;
use tracing::{debug, trace};

const G_FT_S2: f64 = 32.174;
const KT_TO_FT_S: f64 = 1.687_81;
const KM_PER_NM: f64 = 1.852;

/// 单次积分步长上限（秒）
const MAX_SUBSTEP: f64 = 0.05;
/// 坡度响应时间常数（秒）
const BANK_TAU: f64 = 1.5;
/// 垂直速度响应时间常数（秒）
const VS_TAU: f64 = 2.0;
/// 空速响应时间常数（秒）
const SPEED_TAU: f64 = 12.0;
/// 副翼配平 1.0 对应的稳态坡度（rad）
const AILERON_AUTHORITY: f64 = 1.0;
/// 升降舵配平每弧度对应的垂直速度（ft/min，100 kt 时）
const TRIM_AUTHORITY: f64 = 8000.0;
/// 升降舵位置 1.0 对应的垂直速度（ft/min，100 kt 时）
const ELEVATOR_AUTHORITY: f64 = 3000.0;

/// 机型参数
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftProfile {
    /// 总重（lb）
    pub weight: f64,
    /// 最小抬轮速度（kt）
    pub min_rotation_speed: f64,
    /// 失速速度（kt）
    pub stall_speed: f64,
    pub engines: u32,
    pub tail_dragger: bool,
    /// 升降舵配平上限（度）
    pub trim_up_limit: f64,
    /// 升降舵配平下限（度）
    pub trim_down_limit: f64,
    /// 真航向与磁航向之差（度）
    pub magnetic_variation: f64,
    /// 常值滚转扰动（rad），模拟不对称
    pub roll_bias: f64,
}

impl Default for AircraftProfile {
    fn default() -> Self {
        Self {
            weight: 4000.0,
            min_rotation_speed: 60.0,
            stall_speed: 55.0,
            engines: 1,
            tail_dragger: false,
            trim_up_limit: 10.0,
            trim_down_limit: -10.0,
            magnetic_variation: 16.0,
            roll_bias: 0.02,
        }
    }
}

/// 简化飞行器
#[derive(Debug, Clone)]
pub struct SimulatedAircraft {
    profile: AircraftProfile,
    /// 纬度/经度（度）
    lat: f64,
    long: f64,
    /// 高度（ft）
    altitude: f64,
    ground_elevation: f64,
    /// 真航向（度）
    true_heading: f64,
    /// 真空速（kt）
    speed: f64,
    /// 坡度（rad）
    bank: f64,
    /// 转弯率（rad/s）
    turn_rate: f64,
    /// 垂直速度（ft/min）
    vertical_speed: f64,
    on_ground: bool,
    aileron_trim: f64,
    elevator_trim: f64,
    elevator: f64,
    rudder: f64,
    throttles: Vec<f64>,
    flaps: f64,
    parking_brake: bool,
    tailwheel_lock: bool,
    gear_down: bool,
    /// 模拟时间（秒）
    clock: f64,
    last_wall: Option<Instant>,
}

impl SimulatedAircraft {
    /// 停在跑道上，刹车拉起，油门收光
    pub fn on_runway(profile: AircraftProfile, lat: f64, long: f64, heading_deg: f64) -> Self {
        let engines = profile.engines.max(1) as usize;
        Self {
            lat,
            long,
            altitude: 0.0,
            ground_elevation: 0.0,
            true_heading: heading_deg.rem_euclid(360.0),
            speed: 0.0,
            bank: 0.0,
            turn_rate: 0.0,
            vertical_speed: 0.0,
            on_ground: true,
            aileron_trim: 0.0,
            elevator_trim: 0.0,
            elevator: 0.0,
            rudder: 0.0,
            throttles: vec![0.0; engines],
            flaps: 1.0,
            parking_brake: true,
            tailwheel_lock: false,
            gear_down: true,
            clock: 0.0,
            last_wall: None,
            profile,
        }
    }

    /// 空中平飞，油门 75%
    pub fn in_cruise(
        profile: AircraftProfile,
        lat: f64,
        long: f64,
        heading_deg: f64,
        altitude: f64,
        speed: f64,
    ) -> Self {
        let mut aircraft = Self::on_runway(profile, lat, long, heading_deg);
        aircraft.altitude = altitude;
        aircraft.speed = speed;
        aircraft.on_ground = false;
        aircraft.parking_brake = false;
        aircraft.gear_down = false;
        aircraft.flaps = 0.0;
        aircraft.throttles.iter_mut().for_each(|t| *t = 75.0);
        aircraft
    }

    /// 按墙钟时间推进（每次读取时追赶）
    pub fn realtime(mut self) -> Self {
        self.last_wall = Some(Instant::now());
        self
    }

    pub fn profile(&self) -> &AircraftProfile {
        &self.profile
    }

    /// 模拟时间（秒）
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    pub fn airspeed(&self) -> f64 {
        self.speed
    }

    pub fn is_on_ground(&self) -> bool {
        self.on_ground
    }

    /// 坡度（度）
    pub fn bank_deg(&self) -> f64 {
        self.bank.to_degrees()
    }

    /// 磁航向（度）
    pub fn heading_deg(&self) -> f64 {
        (self.true_heading - self.profile.magnetic_variation).rem_euclid(360.0)
    }

    /// 垂直速度（ft/min）
    pub fn vertical_speed(&self) -> f64 {
        self.vertical_speed
    }

    /// 位置（度）
    pub fn position(&self) -> (f64, f64) {
        (self.lat, self.long)
    }

    pub fn gear_down(&self) -> bool {
        self.gear_down
    }

    /// 推进 `dt` 秒
    pub fn advance(&mut self, dt: f64) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }
        let mut remaining = dt;
        while remaining > 0.0 {
            let step = remaining.min(MAX_SUBSTEP);
            self.step(step);
            remaining -= step;
        }
        trace!(
            "sim t={:.2}s alt={:.0} speed={:.1} bank={:.2}° hdg={:.1} vs={:.0}",
            self.clock,
            self.altitude,
            self.speed,
            self.bank_deg(),
            self.heading_deg(),
            self.vertical_speed
        );
    }

    fn catch_up(&mut self) {
        if let Some(last) = self.last_wall {
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            self.last_wall = Some(now);
            self.advance(dt);
        }
    }

    fn throttle(&self) -> f64 {
        let sum: f64 = self.throttles.iter().sum();
        sum / self.throttles.len().max(1) as f64
    }

    fn step(&mut self, dt: f64) {
        self.clock += dt;
        let throttle = self.throttle();
        // 速度归一化（100 kt = 1.0）
        let q = (self.speed / 100.0).max(0.0);

        if self.on_ground {
            self.step_ground(dt, throttle, q);
        } else {
            self.step_air(dt, throttle, q);
        }

        let distance_km = self.speed * KM_PER_NM * dt / 3600.0;
        if distance_km > 0.0 {
            let (lat, long) = destination(self.lat, self.long, distance_km, self.true_heading);
            self.lat = lat;
            self.long = long;
        }
    }

    fn step_ground(&mut self, dt: f64, throttle: f64, q: f64) {
        self.bank = 0.0;
        self.turn_rate = 0.0;
        self.vertical_speed = 0.0;
        self.altitude = self.ground_elevation;

        if self.parking_brake {
            self.speed = 0.0;
            return;
        }

        let flap_drag = if self.flaps > 0.0 { 0.3 } else { 0.0 };
        let accel = throttle / 100.0 * 6.0 - 0.04 * self.speed - flap_drag;
        self.speed = (self.speed + accel * dt).max(0.0);

        // 发动机扭矩向左偏，方向舵向右为正
        let torque = -0.8 * throttle / 100.0;
        let steering = if self.profile.tail_dragger && !self.tailwheel_lock {
            0.5
        } else {
            1.0
        };
        let yaw_rate = torque + steering * 3.0 * self.rudder * q.min(1.5);
        self.true_heading = (self.true_heading + yaw_rate * dt).rem_euclid(360.0);
        self.turn_rate = yaw_rate.to_radians();

        let climb = self.elevator * ELEVATOR_AUTHORITY * q;
        if self.speed > 0.9 * self.profile.min_rotation_speed && climb > 50.0 {
            debug!("sim lift-off at {:.1} kt", self.speed);
            self.on_ground = false;
            self.vertical_speed = climb.min(200.0);
        }
    }

    fn step_air(&mut self, dt: f64, throttle: f64, q: f64) {
        // 滚转
        let target_bank = -AILERON_AUTHORITY * self.aileron_trim + self.profile.roll_bias;
        self.bank += (target_bank - self.bank) * (dt / BANK_TAU).min(1.0);
        self.bank = self.bank.clamp(-1.4, 1.4);

        let v = (self.speed * KT_TO_FT_S).max(30.0);
        self.turn_rate = -G_FT_S2 * self.bank.tan() / v;
        self.true_heading = (self.true_heading + self.turn_rate.to_degrees() * dt).rem_euclid(360.0);

        // 俯仰
        let stall = self.speed < self.profile.stall_speed * 0.8;
        let mut target_vs = (self.elevator_trim * TRIM_AUTHORITY + self.elevator * ELEVATOR_AUTHORITY) * q
            + (throttle - 75.0) * 8.0
            - self.bank.abs() * 300.0;
        if self.flaps > 0.0 {
            target_vs += 100.0;
        }
        if stall {
            target_vs = target_vs.min(-800.0);
        }
        self.vertical_speed += (target_vs - self.vertical_speed) * (dt / VS_TAU).min(1.0);

        // 速度：推力对抗爬升
        let target_speed = (55.0 + throttle * 1.0 - self.vertical_speed / 40.0).max(30.0);
        self.speed += (target_speed - self.speed) * (dt / SPEED_TAU).min(1.0);

        self.altitude += self.vertical_speed / 60.0 * dt;
        if self.altitude <= self.ground_elevation {
            debug!("sim touchdown");
            self.altitude = self.ground_elevation;
            self.on_ground = true;
            self.vertical_speed = 0.0;
        }
    }

    fn telemetry(&self, channel: TelemetryChannel) -> f64 {
        match channel {
            TelemetryChannel::OnGround => f64::from(u8::from(self.on_ground)),
            TelemetryChannel::Airspeed => self.speed,
            TelemetryChannel::BankAngle => self.bank,
            TelemetryChannel::TurnRate => self.turn_rate,
            TelemetryChannel::Latitude => self.lat.to_radians(),
            TelemetryChannel::Longitude => self.long.to_radians(),
            TelemetryChannel::Heading => self.heading_deg().to_radians(),
            TelemetryChannel::TrueHeading => self.true_heading.to_radians(),
            TelemetryChannel::Altitude => self.altitude,
            // 模拟器以 ft/s 报告
            TelemetryChannel::VerticalSpeed => self.vertical_speed / 60.0,
            TelemetryChannel::PitchTrim => self.elevator_trim,
            TelemetryChannel::AileronTrim => self.aileron_trim,
            TelemetryChannel::PitchTrimUpLimit => self.profile.trim_up_limit,
            TelemetryChannel::PitchTrimDownLimit => self.profile.trim_down_limit,
        }
    }

    fn throttle_index(channel: &str) -> Option<usize> {
        let n: usize = channel
            .strip_prefix("GENERAL_ENG_THROTTLE_LEVER_POSITION:")?
            .parse()
            .ok()?;
        n.checked_sub(1)
    }
}

impl VehicleIo for SimulatedAircraft {
    fn read(&mut self, channel: &str) -> Result<Option<f64>, IoError> {
        self.catch_up();

        if let Some(t) = TelemetryChannel::ALL.into_iter().find(|c| c.sim_var() == channel) {
            return Ok(Some(self.telemetry(t)));
        }
        if let Some(i) = Self::throttle_index(channel) {
            return Ok(self.throttles.get(i).copied());
        }
        let flag = |b: bool| f64::from(u8::from(b));
        let value = match channel {
            channels::ELEVATOR_POSITION => self.elevator,
            channels::RUDDER_POSITION => self.rudder,
            channels::FLAPS_HANDLE_INDEX => self.flaps,
            channels::TOTAL_WEIGHT => self.profile.weight,
            channels::DESIGN_SPEED_MIN_ROTATION => self.profile.min_rotation_speed,
            channels::DESIGN_SPEED_VS1 => self.profile.stall_speed,
            channels::NUMBER_OF_ENGINES => self.throttles.len() as f64,
            channels::BRAKE_PARKING_POSITION => flag(self.parking_brake),
            channels::IS_TAIL_DRAGGER => flag(self.profile.tail_dragger),
            channels::TAILWHEEL_LOCK_ON => flag(self.tailwheel_lock),
            channels::GEAR_HANDLE_POSITION => flag(self.gear_down),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn write(&mut self, channel: &str, value: f64) -> Result<(), IoError> {
        if !value.is_finite() {
            return Err(IoError::Unavailable(format!("{channel} <- {value}")));
        }
        if let Some(i) = Self::throttle_index(channel) {
            if let Some(t) = self.throttles.get_mut(i) {
                *t = value.clamp(0.0, 100.0);
            }
            return Ok(());
        }
        match channel {
            channels::AILERON_TRIM => self.aileron_trim = value.clamp(-1.0, 1.0),
            channels::ELEVATOR_TRIM => self.elevator_trim = value,
            channels::ELEVATOR_POSITION => self.elevator = value.clamp(-1.0, 1.0),
            channels::RUDDER_POSITION => self.rudder = value.clamp(-1.0, 1.0),
            channels::FLAPS_HANDLE_INDEX => self.flaps = value.max(0.0),
            // 航向游标只影响显示
            channels::HEADING_BUG => {},
            _ => debug!("sim ignoring write to {}", channel),
        }
        Ok(())
    }

    fn trigger(&mut self, event: &str) -> Result<(), IoError> {
        match event {
            channels::EVENT_PARKING_BRAKES => self.parking_brake = !self.parking_brake,
            channels::EVENT_TOGGLE_TAILWHEEL_LOCK => self.tailwheel_lock = !self.tailwheel_lock,
            channels::EVENT_GEAR_UP => self.gear_down = false,
            _ => debug!("sim ignoring event {}", event),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cruise() -> SimulatedAircraft {
        let profile = AircraftProfile {
            roll_bias: 0.0,
            ..AircraftProfile::default()
        };
        SimulatedAircraft::in_cruise(profile, 48.9, -123.7, 0.0, 1500.0, 130.0)
    }

    #[test]
    fn test_reports_raw_units() {
        let mut sim = cruise();
        let lat = sim.read("PLANE_LATITUDE").unwrap().unwrap();
        assert_relative_eq!(lat, 48.9_f64.to_radians());
        assert_eq!(sim.read("NO_SUCH_CHANNEL").unwrap(), None);
        assert_eq!(sim.read("GENERAL_ENG_THROTTLE_LEVER_POSITION:1").unwrap(), Some(75.0));
        assert_eq!(sim.read("GENERAL_ENG_THROTTLE_LEVER_POSITION:2").unwrap(), None);
    }

    #[test]
    fn test_negative_aileron_trim_turns_right() {
        let mut sim = cruise();
        sim.write(channels::AILERON_TRIM, 0.2).unwrap();
        sim.advance(5.0);
        assert!(sim.bank_deg() < -5.0, "bank = {}", sim.bank_deg());
        let turn = sim.read("TURN_INDICATOR_RATE").unwrap().unwrap();
        assert!(turn > 0.0);
    }

    #[test]
    fn test_nose_up_trim_climbs() {
        let mut sim = cruise();
        let start = sim.altitude();
        sim.write(channels::ELEVATOR_TRIM, 0.05).unwrap();
        sim.advance(10.0);
        assert!(sim.vertical_speed() > 100.0);
        assert!(sim.altitude() > start);
    }

    #[test]
    fn test_parking_brake_holds_aircraft() {
        let mut sim = SimulatedAircraft::on_runway(AircraftProfile::default(), 48.9, -123.7, 90.0);
        sim.write(&channels::throttle_lever(1), 100.0).unwrap();
        sim.advance(5.0);
        assert_eq!(sim.airspeed(), 0.0);

        sim.trigger(channels::EVENT_PARKING_BRAKES).unwrap();
        sim.advance(5.0);
        assert!(sim.airspeed() > 10.0);
        assert!(sim.is_on_ground());
    }

    #[test]
    fn test_rejects_non_finite_write() {
        let mut sim = cruise();
        let err = sim.write(channels::AILERON_TRIM, f64::NAN).unwrap_err();
        assert!(!err.is_fatal());
    }
}
