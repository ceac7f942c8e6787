//! 模拟飞行命令
//!
//! 以墙钟时间推进 [`SimulatedAircraft`]，每秒打印一次 JSON 状态；Ctrl+C 结束。

use crate::validation::{WaypointArg, parse_waypoint};
use anyhow::{Context, Result};
use clap::Args;
use skytrim_control::{Autopilot, AutopilotBuilder, TargetValue};
use skytrim_io::{AircraftProfile, SimulatedAircraft};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 模拟飞行参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 自动驾驶配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 运行时长（秒）
    #[arg(short, long, default_value_t = 60)]
    pub seconds: u64,

    /// 航向目标（磁航向，度）
    #[arg(long)]
    pub heading: Option<f64>,

    /// 高度目标（ft），同时接通垂直速度保持
    #[arg(long)]
    pub altitude: Option<f64>,

    /// 从跑道自动起飞
    #[arg(long)]
    pub takeoff: bool,

    /// 接通水平飞行（指定航向或航路点时自动接通）
    #[arg(long)]
    pub level: bool,

    /// 航路点 LAT,LONG[,ALT]，可重复
    #[arg(short, long = "waypoint", value_parser = parse_waypoint)]
    pub waypoints: Vec<WaypointArg>,

    /// 起始纬度（度）
    #[arg(long, default_value_t = 48.9, allow_negative_numbers = true)]
    pub lat: f64,

    /// 起始经度（度）
    #[arg(long, default_value_t = -123.7, allow_negative_numbers = true)]
    pub long: f64,
}

impl SimulateCommand {
    pub fn execute(self) -> Result<()> {
        let config = super::load_config(self.config.as_deref())?;
        let profile = AircraftProfile::default();

        let aircraft = if self.takeoff {
            SimulatedAircraft::on_runway(profile, self.lat, self.long, 0.0)
        } else {
            SimulatedAircraft::in_cruise(profile, self.lat, self.long, 0.0, 1500.0, 100.0)
        }
        .realtime();

        let autopilot = AutopilotBuilder::new()
            .config(config)
            .build(aircraft)
            .context("启动自动驾驶失败")?;
        self.arm(&autopilot)?;

        let running = Arc::new(AtomicBool::new(true));
        let r = running.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Shutting down...");
            r.store(false, Ordering::SeqCst);
        })
        .context("设置信号处理失败")?;

        if !autopilot.toggle_autopilot() {
            anyhow::bail!("自动驾驶无法接通");
        }
        info!("Simulating for {} s", self.seconds);

        let start = Instant::now();
        let end = start + Duration::from_secs(self.seconds);
        let mut next_print = start;
        while running.load(Ordering::SeqCst) && Instant::now() < end {
            if autopilot.is_faulted() {
                anyhow::bail!("控制循环故障停止");
            }
            if Instant::now() >= next_print {
                println!("{}", serde_json::to_string(&autopilot.get_state())?);
                next_print += Duration::from_secs(1);
            }
            thread::sleep(Duration::from_millis(50));
        }

        let (modes, waypoints) = autopilot.shutdown();
        info!(
            "Stopped with {} waypoint(s) remaining, modes {:?}",
            waypoints.len(),
            modes.snapshot()
        );
        Ok(())
    }

    /// 按命令行参数设置模式与航路点
    fn arm(&self, autopilot: &Autopilot) -> Result<()> {
        for wp in &self.waypoints {
            if autopilot.add_waypoint(wp.lat, wp.long, wp.alt).is_none() {
                anyhow::bail!("无效航路点: {},{}", wp.lat, wp.long);
            }
        }

        if let Some(heading) = self.heading {
            autopilot
                .set_target("HDG", Some(TargetValue::Number(heading)))
                .context("无效航向")?;
        }
        if self.level || self.heading.is_some() || !self.waypoints.is_empty() {
            autopilot.set_target("LVL", Some(TargetValue::Bool(true)));
        }

        if let Some(altitude) = self.altitude {
            autopilot
                .set_target("ALT", Some(TargetValue::Number(altitude)))
                .context("无效高度")?;
            autopilot.set_target("VSH", Some(TargetValue::Bool(true)));
        }

        if self.takeoff {
            if self.altitude.is_some() {
                warn!("Auto takeoff replaces the altitude target with its hand-off altitude");
            }
            autopilot.set_target("ATO", Some(TargetValue::Bool(true)));
        }
        Ok(())
    }
}
