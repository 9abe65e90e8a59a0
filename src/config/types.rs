//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use cron::Schedule;
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 被检测的目标API
    pub target: TargetConfig,
    /// 邮件配置
    pub mail: MailConfig,
    /// 调度配置
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// 目标API配置
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    /// API基础URL
    pub base_url: String,
    /// Basic认证用户名
    pub username: String,
    /// Basic认证令牌
    pub token: String,
    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("token", &"***")
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .finish()
    }
}

/// 邮件配置
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct MailConfig {
    /// 发件人
    pub from: String,
    /// 主收件人
    pub to: String,
    /// 抄送列表，仅在出现失败时使用
    #[serde(default)]
    pub cc: Vec<String>,
    /// SMTP服务器地址
    pub smtp_host: String,
    /// SMTP端口
    pub smtp_port: u16,
    /// SMTP用户名
    pub smtp_user: String,
    /// SMTP密码
    pub smtp_password: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_password", &"***")
            .finish()
    }
}

/// 调度配置（cron表达式，含秒字段，本地时间）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    /// 每小时检测
    #[serde(default = "default_hourly_check")]
    pub hourly_check: String,
    /// 每日成功报告
    #[serde(default = "default_success_report")]
    pub success_report: String,
    /// 每日日志清理
    #[serde(default = "default_log_cleanup")]
    pub log_cleanup: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hourly_check: default_hourly_check(),
            success_report: default_success_report(),
            log_cleanup: default_log_cleanup(),
        }
    }
}

/// 日志持久化配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// 日志目录
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
    /// 日志保留天数
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            retention_days: default_retention_days(),
        }
    }
}

// 默认值函数
pub(crate) fn default_timeout() -> u64 {
    40
}
pub(crate) fn default_hourly_check() -> String {
    "0 0 * * * *".to_string()
}
pub(crate) fn default_success_report() -> String {
    "0 30 17 * * *".to_string()
}
pub(crate) fn default_log_cleanup() -> String {
    "0 0 3 * * *".to_string()
}
pub(crate) fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
pub(crate) fn default_retention_days() -> u32 {
    30
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let target = &config.target;
    if !target.base_url.starts_with("http://") && !target.base_url.starts_with("https://") {
        return Err(format!("API基础URL格式无效: {}", target.base_url));
    }
    if target.username.trim().is_empty() {
        return Err("API用户名不能为空".to_string());
    }
    if target.token.trim().is_empty() {
        return Err("API令牌不能为空".to_string());
    }
    if target.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    let mail = &config.mail;
    for (label, address) in [("发件人", &mail.from), ("收件人", &mail.to)] {
        check_mailbox(label, address)?;
    }
    for address in &mail.cc {
        check_mailbox("抄送", address)?;
    }
    if mail.smtp_host.trim().is_empty() {
        return Err("SMTP服务器地址不能为空".to_string());
    }
    if mail.smtp_port == 0 {
        return Err("SMTP端口不能为0".to_string());
    }

    for (label, expr) in [
        ("每小时检测", &config.schedule.hourly_check),
        ("每日成功报告", &config.schedule.success_report),
        ("日志清理", &config.schedule.log_cleanup),
    ] {
        Schedule::from_str(expr).map_err(|e| format!("{label}的cron表达式无效 '{expr}': {e}"))?;
    }

    if config.logging.retention_days == 0 {
        return Err("日志保留天数不能为0".to_string());
    }

    Ok(())
}

/// 按发送时相同的规则解析单个邮箱地址
fn check_mailbox(label: &str, address: &str) -> Result<(), String> {
    address
        .parse::<Mailbox>()
        .map(|_| ())
        .map_err(|e| format!("{label}邮箱地址无效 '{address}': {e}"))
}
