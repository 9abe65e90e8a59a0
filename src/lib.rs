//! API Health Monitor - 定时API健康检测与邮件报告
//!
//! 按固定目录对目标API逐个发起HTTP检测，汇总结果并通过邮件发送报告：
//! - 每小时例行检测，出现失败时通知主收件人和抄送列表
//! - 每日成功报告，仅发送给主收件人
//! - 按天滚动的日志文件及过期清理

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod notification;
pub mod signal_handler;

// 重新导出主要类型
pub use config::Config;
pub use error::MonitorError;
pub use health::{HealthCheckScheduler, ResultSummary, TriggerContext};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
