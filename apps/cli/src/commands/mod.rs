//! 命令定义和实现

pub mod config;
pub mod simulate;

pub use config::ConfigCommand;
pub use simulate::SimulateCommand;

use anyhow::{Context, Result};
use skytrim_control::AutopilotConfig;
use std::path::Path;

/// 加载配置文件，未指定时使用默认值
pub fn load_config(path: Option<&Path>) -> Result<AutopilotConfig> {
    match path {
        Some(path) => AutopilotConfig::load_from_file(path)
            .with_context(|| format!("加载配置文件失败: {}", path.display())),
        None => Ok(AutopilotConfig::default()),
    }
}
