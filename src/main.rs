//! API Health Monitor 主程序入口

use anyhow::Context;
use api_health_monitor::cli::{command_for, load_config, Args, CommandContext};
use api_health_monitor::logging::{LogConfig, LoggingSystem};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // 配置加载失败时日志系统尚未初始化，直接输出到标准错误
    let config = if args.command.needs_config() {
        match load_config(&args).await {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let ctx = CommandContext { args, config };

    let log_config = LogConfig {
        level: ctx.args.log_level.into(),
        console: true,
        json_format: ctx.args.json_logs,
        log_dir: if ctx.args.command.writes_log_files() {
            ctx.log_dir()
        } else {
            None
        },
        ..Default::default()
    };

    let _logging_system = match LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")
    {
        Ok(system) => system,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    match command_for(&ctx.args.command).execute(&ctx).await {
        Ok(code) => code,
        Err(e) => {
            error!("命令执行失败: {}", e);
            ExitCode::FAILURE
        }
    }
}
