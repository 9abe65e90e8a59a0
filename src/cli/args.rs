//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// API Health Monitor - 定时API健康检测与邮件报告
#[derive(Parser, Debug, Clone)]
#[command(
    name = "api-health-monitor",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（未指定时依次查找默认路径和环境变量）",
        env = "API_MONITOR_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        help = "日志级别",
        env = "API_MONITOR_LOG_LEVEL",
        global = true
    )]
    pub log_level: LogLevel,

    /// 日志目录
    #[arg(long, value_name = "DIR", help = "日志目录（覆盖配置文件）", global = true)]
    pub log_dir: Option<PathBuf>,

    /// 使用JSON格式输出日志
    #[arg(long, help = "使用JSON格式输出日志", global = true)]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动调度器，直到收到 SIGINT/SIGTERM
    Start,

    /// 立即执行一次完整检测
    Check {
        /// 按通知策略发送邮件
        #[arg(short, long, help = "按通知策略发送报告邮件")]
        send: bool,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 列出内置的端点检测目录
    Catalog {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 验证配置
    Validate {
        /// 同时测试SMTP连接
        #[arg(long, help = "同时测试SMTP连接")]
        smtp: bool,
    },

    /// 立即清理过期日志
    CleanupLogs,

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

impl Commands {
    /// 该命令是否需要加载配置
    pub fn needs_config(&self) -> bool {
        matches!(
            self,
            Commands::Start | Commands::Check { .. } | Commands::Validate { .. } | Commands::CleanupLogs
        )
    }

    /// 该命令是否写入日志文件
    pub fn writes_log_files(&self) -> bool {
        matches!(self, Commands::Start | Commands::Check { .. })
    }
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}
