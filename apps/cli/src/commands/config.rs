//! 配置管理命令

use anyhow::Result;
use clap::Subcommand;
use skytrim_control::AutopilotConfig;
use std::path::PathBuf;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 以 TOML 打印默认配置
    Show,

    /// 校验配置文件
    Check {
        /// 配置文件路径
        file: PathBuf,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                print!("{}", AutopilotConfig::default().to_toml_string()?);
                Ok(())
            },
            ConfigCommand::Check { file } => {
                let config = super::load_config(Some(&file))?;
                println!("✅ {} 有效", file.display());
                println!("  调度间隔: {} ms", config.interval_ms);
                println!("  起飞间隔: {} ms", config.takeoff_interval_ms);
                println!("  到达半径: {} km", config.waypoint.arrival_radius_km);
                Ok(())
            },
        }
    }
}
