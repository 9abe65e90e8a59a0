//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// API Health Monitor 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum MonitorError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 探测相关错误
    #[error("探测错误: {0}")]
    Probe(#[from] ProbeError),

    /// 通知相关错误
    #[error("通知错误: {0}")]
    Notification(#[from] NotificationError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },

    /// 必需的环境变量缺失
    #[error("缺少必需的环境变量: {}", vars.join(", "))]
    MissingVars { vars: Vec<String> },
}

/// 探测错误类型
///
/// 这些错误不会离开测试套件运行器，而是被转换为失败的 `ProbeOutcome`。
#[derive(Error, Debug)]
pub enum ProbeError {
    /// HTTP传输错误
    #[error("HTTP请求失败: {0}")]
    Transport(#[from] reqwest::Error),

    /// 超时错误
    #[error("请求超时 ({millis}ms)")]
    Timeout { millis: u64 },

    /// 不支持的HTTP方法
    #[error("不支持的HTTP方法: {method}")]
    UnsupportedMethod { method: String },
}

/// 通知错误类型
#[derive(Error, Debug)]
pub enum NotificationError {
    /// 发送失败
    #[error("邮件发送失败: {0}")]
    SendError(String),

    /// 模板渲染错误
    #[error("模板渲染失败: {0}")]
    TemplateError(String),

    /// 邮件构建错误（地址格式等）
    #[error("邮件构建失败: {0}")]
    MessageError(String),

    /// 配置错误
    #[error("通知配置错误: {0}")]
    ConfigError(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, MonitorError>;
