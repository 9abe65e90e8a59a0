//! 配置管理模块
//!
//! 提供配置文件/环境变量解析和验证功能

pub mod loader;
pub mod types;

// 重新导出主要类型
pub use loader::{loader_for, ConfigLoader, EnvConfigLoader, TomlConfigLoader};
pub use types::{validate_config, Config, LoggingSettings, MailConfig, ScheduleConfig, TargetConfig};
