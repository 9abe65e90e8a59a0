//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{loader_for, Config};
use crate::error::{ConfigError, Result};
use crate::health::{
    default_catalog, EndpointCheck, HealthCheckScheduler, HttpProber, ResultSummary,
};
use crate::logging::LogRetention;
use crate::notification::{MailTransport, NoOpMailer, SmtpMailer};
use crate::signal_handler::{setup_signal_handlers, wait_for_shutdown};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 命令执行上下文
pub struct CommandContext {
    /// 命令行参数
    pub args: Args,
    /// 已加载的配置（仅需要配置的命令）
    pub config: Option<Config>,
}

impl CommandContext {
    /// 获取配置
    pub fn config(&self) -> Result<&Config> {
        self.config
            .as_ref()
            .ok_or_else(|| ConfigError::ValidationError("该命令需要配置".to_string()).into())
    }

    /// 日志目录，命令行参数优先
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.args
            .log_dir
            .clone()
            .or_else(|| self.config.as_ref().map(|c| c.logging.directory.clone()))
    }
}

/// 加载配置
///
/// # 参数
/// * `args` - 命令行参数
///
/// # 返回
/// * `Result<Config>` - 加载并验证后的配置
pub async fn load_config(args: &Args) -> Result<Config> {
    loader_for(args.config.as_deref()).load().await
}

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode>;
}

/// 根据子命令选择处理器
pub fn command_for(command: &Commands) -> Box<dyn Command> {
    match command {
        Commands::Start => Box::new(StartCommand),
        Commands::Check { .. } => Box::new(CheckCommand),
        Commands::Catalog { .. } => Box::new(CatalogCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::CleanupLogs => Box::new(CleanupLogsCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    }
}

/// 启动命令
pub struct StartCommand;

#[async_trait]
impl Command for StartCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let config = ctx.config()?;
        let log_dir = ctx
            .log_dir()
            .unwrap_or_else(|| config.logging.directory.clone());

        info!("{} v{} 启动", crate::APP_NAME, crate::VERSION);
        info!("基础URL: {}", config.target.base_url);
        info!("用户名: {}", config.target.username);

        let retention = Arc::new(LogRetention::new(log_dir, config.logging.retention_days));
        if let Err(e) = retention.purge_now() {
            warn!("启动时清理日志失败: {}", e);
        }

        let prober = Arc::new(HttpProber::new(&config.target)?);
        let mailer = Arc::new(SmtpMailer::new(&config.mail)?);
        let scheduler =
            Arc::new(HealthCheckScheduler::new(config, prober, mailer)?.with_retention(retention));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        setup_signal_handlers(shutdown_tx).await?;

        scheduler.start().await;
        info!("按 Ctrl+C 停止");

        wait_for_shutdown(shutdown_rx).await;
        scheduler.stop().await;
        info!("{} 已退出", crate::APP_NAME);

        Ok(ExitCode::SUCCESS)
    }
}

/// 检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let Commands::Check { send, format } = &ctx.args.command else {
            return Ok(ExitCode::SUCCESS);
        };
        let config = ctx.config()?;

        let prober = Arc::new(HttpProber::new(&config.target)?);
        let mailer: Arc<dyn MailTransport> = if *send {
            Arc::new(SmtpMailer::new(&config.mail)?)
        } else {
            Arc::new(NoOpMailer)
        };
        let scheduler = HealthCheckScheduler::new(config, prober, mailer)?;

        let Some(summary) = scheduler.run_manually().await else {
            return Ok(ExitCode::FAILURE);
        };

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            OutputFormat::Text => print_summary_text(&summary),
        }

        Ok(if summary.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}

/// 打印文本格式结果
fn print_summary_text(summary: &ResultSummary) {
    for outcome in summary.outcomes() {
        let icon = if outcome.kind.is_success() { "✅" } else { "❌" };
        let status = outcome
            .status_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        println!(
            "{} {:<45} {:<8} {:>4} {:>7}ms",
            icon,
            outcome.check_name,
            outcome.kind.to_string(),
            status,
            outcome.latency_ms()
        );
        if let Some(detail) = &outcome.error_detail {
            println!("     {detail}");
        }
    }
    println!();
    println!(
        "总计: {}  成功: {}  失败: {}  成功率: {:.1}%  状态: {}",
        summary.total(),
        summary.success(),
        summary.failure(),
        summary.success_rate(),
        summary.tier()
    );
}

/// 目录命令
pub struct CatalogCommand;

#[async_trait]
impl Command for CatalogCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let format = match &ctx.args.command {
            Commands::Catalog { format } => *format,
            _ => OutputFormat::Text,
        };
        let catalog = default_catalog();

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&catalog)?),
            OutputFormat::Text => print_catalog_text(&catalog),
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_catalog_text(catalog: &[EndpointCheck]) {
    let mut current_group: Option<&str> = None;
    for check in catalog {
        if current_group != Some(check.group.as_str()) {
            println!("{}", check.group);
            current_group = Some(check.group.as_str());
        }
        println!(
            "  {:<4} {:<45} {} (expect {})",
            check.method.as_str(),
            check.name,
            check.path,
            check.expected_status
        );
    }
    println!();
    println!("共 {} 个检测", catalog.len());
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let config = ctx.config()?;

        println!("✓ 配置验证通过");
        println!("目标API:");
        println!("  基础URL: {}", config.target.base_url);
        println!("  用户名: {}", config.target.username);
        println!("  请求超时: {}秒", config.target.request_timeout_seconds);
        println!("邮件:");
        println!("  发件人: {}", config.mail.from);
        println!("  收件人: {}", config.mail.to);
        if config.mail.cc.is_empty() {
            println!("  抄送: (无)");
        } else {
            println!("  抄送: {}", config.mail.cc.join(", "));
        }
        println!("  SMTP: {}:{}", config.mail.smtp_host, config.mail.smtp_port);
        println!("调度:");
        println!("  每小时检测: {}", config.schedule.hourly_check);
        println!("  每日成功报告: {}", config.schedule.success_report);
        println!("  日志清理: {}", config.schedule.log_cleanup);
        println!("日志:");
        println!("  目录: {}", config.logging.directory.display());
        println!("  保留天数: {}", config.logging.retention_days);

        if let Commands::Validate { smtp: true } = ctx.args.command {
            let mailer = SmtpMailer::new(&config.mail)?;
            mailer.test_connection().await?;
            println!("✓ SMTP连接正常");
        }

        Ok(ExitCode::SUCCESS)
    }
}

/// 日志清理命令
pub struct CleanupLogsCommand;

#[async_trait]
impl Command for CleanupLogsCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        let config = ctx.config()?;
        let log_dir = ctx
            .log_dir()
            .unwrap_or_else(|| config.logging.directory.clone());

        let report = LogRetention::new(&log_dir, config.logging.retention_days).purge_now()?;
        println!(
            "已删除 {} 个过期日志文件，保留 {} 个 ({})",
            report.deleted,
            report.remaining,
            log_dir.display()
        );
        Ok(ExitCode::SUCCESS)
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, ctx: &CommandContext) -> Result<ExitCode> {
        if let Commands::Version { format } = &ctx.args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}
