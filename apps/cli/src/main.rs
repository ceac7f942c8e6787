//! # skytrim CLI
//!
//! 在简化飞行模型上运行自动驾驶，或检查配置文件。
//!
//! ```bash
//! # 巡航中保持航向 90°、高度 2500 ft，运行 2 分钟
//! skytrim-cli simulate --heading 90 --altitude 2500 --seconds 120
//!
//! # 从跑道自动起飞
//! skytrim-cli simulate --takeoff --seconds 300
//!
//! # 打印默认配置 / 校验配置文件
//! skytrim-cli config show > autopilot.toml
//! skytrim-cli config check autopilot.toml
//! ```
//!
//! 日志级别通过 `RUST_LOG` 控制，默认 `skytrim=info`。

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod validation;

use commands::{ConfigCommand, SimulateCommand};

/// skytrim - 飞行模拟器自动驾驶
#[derive(Parser, Debug)]
#[command(name = "skytrim-cli")]
#[command(about = "Trim-based autopilot for flight simulators", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 在简化飞行模型上运行自动驾驶
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skytrim=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { args } => args.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_simulate_flags() {
        let cli = Cli::try_parse_from([
            "skytrim-cli",
            "simulate",
            "--heading",
            "90",
            "--waypoint",
            "49.0,-123.0",
            "--waypoint",
            "49.1,-123.1,3000",
        ])
        .unwrap();
        let Commands::Simulate { args } = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.heading, Some(90.0));
        assert_eq!(args.waypoints.len(), 2);
        assert_eq!(args.waypoints[1].alt, Some(3000.0));
        assert!(!args.takeoff);
    }

    #[test]
    fn test_parse_config_check() {
        let cli = Cli::try_parse_from(["skytrim-cli", "config", "check", "a.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(ConfigCommand::Check { .. })));
    }
}
