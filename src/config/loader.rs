//! 配置加载器实现
//!
//! 支持两种来源：
//! - TOML配置文件（支持 `${VAR}` 环境变量替换）
//! - 进程环境变量（未提供配置文件时使用）

use crate::config::types::{
    default_hourly_check, default_log_cleanup, default_log_dir, default_retention_days,
    default_success_report, default_timeout, validate_config, Config, LoggingSettings,
    MailConfig, ScheduleConfig, TargetConfig,
};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 环境变量查找函数，便于测试时注入
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// 必需的环境变量
pub const REQUIRED_ENV_VARS: [&str; 9] = [
    "API_BASE_URL",
    "API_USERNAME",
    "API_TOKEN",
    "MAIL_FROM",
    "MAIL_TO",
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASS",
];

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 加载配置
    ///
    /// # 返回
    /// * `Result<Config>` - 加载并验证后的配置或错误
    async fn load(&self) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

fn process_env() -> EnvLookup {
    Arc::new(|name: &str| std::env::var(name).ok())
}

/// TOML配置加载器实现
#[derive(Clone)]
pub struct TomlConfigLoader {
    /// 配置文件路径
    path: PathBuf,
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
    /// 环境变量来源
    lookup: EnvLookup,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(path: impl Into<PathBuf>, enable_env_substitution: bool) -> Self {
        Self {
            path: path.into(),
            enable_env_substitution,
            lookup: process_env(),
        }
    }

    /// 使用自定义的环境变量来源
    pub fn with_lookup(mut self, lookup: EnvLookup) -> Self {
        self.lookup = lookup;
        self
    }

    /// 替换字符串中的环境变量
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {e}")))?;

        let mut result = content.to_string();
        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match (self.lookup)(var_name) {
                Some(value) => result = result.replace(full_match, &value),
                None => {
                    return Err(ConfigError::EnvVarError {
                        var: var_name.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    /// 解析TOML内容并验证
    pub fn parse_str(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {e}")))?;

        self.validate(&config)?;
        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Err(ConfigError::FileNotFound {
                path: self.path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {e}")))?;

        let config = self.parse_str(&content)?;

        tracing::info!("成功加载配置文件: {}", self.path.display());
        tracing::debug!("配置内容: {:?}", config);

        Ok(config)
    }
}

/// 环境变量配置加载器
#[derive(Clone)]
pub struct EnvConfigLoader {
    lookup: EnvLookup,
}

impl Default for EnvConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvConfigLoader {
    /// 从进程环境读取
    pub fn new() -> Self {
        Self {
            lookup: process_env(),
        }
    }

    /// 使用自定义的环境变量来源
    pub fn with_lookup(lookup: EnvLookup) -> Self {
        Self { lookup }
    }

    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_number<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::ValidationError(format!("{name} 不是有效的数字: {raw}")).into()),
            None => Ok(None),
        }
    }

    /// 从环境变量构建配置（不做验证）
    pub fn build(&self) -> Result<Config> {
        let missing: Vec<String> = REQUIRED_ENV_VARS
            .iter()
            .filter(|name| self.get(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars { vars: missing }.into());
        }

        let required = |name: &str| self.get(name).unwrap_or_default();

        let smtp_port = self
            .parse_number::<u16>("SMTP_PORT")?
            .unwrap_or_default();

        Ok(Config {
            target: TargetConfig {
                base_url: required("API_BASE_URL"),
                username: required("API_USERNAME"),
                token: required("API_TOKEN"),
                request_timeout_seconds: self
                    .parse_number("REQUEST_TIMEOUT_SECONDS")?
                    .unwrap_or_else(default_timeout),
            },
            mail: MailConfig {
                from: required("MAIL_FROM"),
                to: required("MAIL_TO"),
                cc: parse_cc_list(self.get("MAIL_CC").as_deref()),
                smtp_host: required("SMTP_HOST"),
                smtp_port,
                smtp_user: required("SMTP_USER"),
                smtp_password: required("SMTP_PASS"),
            },
            schedule: ScheduleConfig {
                hourly_check: self
                    .get("HOURLY_CHECK_CRON")
                    .unwrap_or_else(default_hourly_check),
                success_report: self
                    .get("SUCCESS_REPORT_CRON")
                    .unwrap_or_else(default_success_report),
                log_cleanup: self
                    .get("LOG_CLEANUP_CRON")
                    .unwrap_or_else(default_log_cleanup),
            },
            logging: LoggingSettings {
                directory: self
                    .get("LOG_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_log_dir),
                retention_days: self
                    .parse_number("LOG_RETENTION_DAYS")?
                    .unwrap_or_else(default_retention_days),
            },
        })
    }
}

#[async_trait]
impl ConfigLoader for EnvConfigLoader {
    async fn load(&self) -> Result<Config> {
        let config = self.build()?;
        self.validate(&config)?;
        tracing::info!("已从环境变量加载配置");
        Ok(config)
    }
}

/// 解析抄送列表
///
/// 以逗号或分号分隔；开头的一个 `#` 会被去掉，其余地址照常使用。
pub fn parse_cc_list(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim) else {
        return Vec::new();
    };
    let raw = raw.strip_prefix('#').unwrap_or(raw);
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 获取默认配置文件路径
///
/// 优先使用当前目录下的 `api-monitor.toml`，其次是用户配置目录。
/// 两者都不存在时返回 `None`，此时从环境变量加载。
pub fn find_default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from("api-monitor.toml");
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("api-health-monitor").join("config.toml"))
        .filter(|path| path.exists())
}

/// 根据可选的配置文件路径选择加载器
pub fn loader_for(path: Option<&Path>) -> Box<dyn ConfigLoader> {
    match path {
        Some(path) => Box::new(TomlConfigLoader::new(path, true)),
        None => match find_default_config_path() {
            Some(path) => Box::new(TomlConfigLoader::new(path, true)),
            None => Box::new(EnvConfigLoader::new()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> EnvLookup {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(move |name: &str| map.get(name).cloned())
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("API_BASE_URL", "https://api.example.com"),
            ("API_USERNAME", "monitor"),
            ("API_TOKEN", "token-123"),
            ("MAIL_FROM", "monitor@example.com"),
            ("MAIL_TO", "ops@example.com"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "465"),
            ("SMTP_USER", "monitor@example.com"),
            ("SMTP_PASS", "pass"),
        ]
    }

    const TEST_CONFIG_TOML: &str = r#"
[target]
base_url = "https://api.example.com"
username = "monitor"
token = "${API_TOKEN}"

[mail]
from = "monitor@example.com"
to = "ops@example.com"
cc = ["a@example.com", "b@example.com"]
smtp_host = "smtp.example.com"
smtp_port = 587
smtp_user = "monitor@example.com"
smtp_password = "${SMTP_PASS}"

[logging]
retention_days = 7
"#;

    #[tokio::test]
    async fn test_env_loader_with_all_required_vars() {
        let mut env = full_env();
        env.push(("MAIL_CC", "a@example.com, b@example.com"));
        let loader = EnvConfigLoader::with_lookup(lookup_from(&env));

        let config = loader.load().await.unwrap();
        assert_eq!(config.target.base_url, "https://api.example.com");
        assert_eq!(config.target.request_timeout_seconds, 40);
        assert_eq!(config.mail.smtp_port, 465);
        assert_eq!(config.mail.cc, vec!["a@example.com", "b@example.com"]);
        assert_eq!(config.schedule, ScheduleConfig::default());
        assert_eq!(config.logging.retention_days, 30);
    }

    #[tokio::test]
    async fn test_env_loader_reports_all_missing_vars() {
        let env = vec![("API_BASE_URL", "https://api.example.com"), ("SMTP_PASS", "")];
        let loader = EnvConfigLoader::with_lookup(lookup_from(&env));

        let err = loader.load().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("API_USERNAME"));
        assert!(message.contains("SMTP_HOST"));
        assert!(message.contains("SMTP_PASS"));
        assert!(!message.contains("API_BASE_URL"));
    }

    #[tokio::test]
    async fn test_env_loader_rejects_non_numeric_port() {
        let mut env = full_env();
        env.retain(|(k, _)| *k != "SMTP_PORT");
        env.push(("SMTP_PORT", "smtp"));
        let loader = EnvConfigLoader::with_lookup(lookup_from(&env));

        let err = loader.load().await.unwrap_err();
        assert!(err.to_string().contains("SMTP_PORT"));
    }

    #[test]
    fn test_parse_cc_list() {
        assert!(parse_cc_list(None).is_empty());
        assert!(parse_cc_list(Some("  ")).is_empty());
        assert!(parse_cc_list(Some("#")).is_empty());
        assert_eq!(
            parse_cc_list(Some("#boss@example.com")),
            vec!["boss@example.com"]
        );
        assert_eq!(
            parse_cc_list(Some(" # boss@example.com, lead@example.com")),
            vec!["boss@example.com", "lead@example.com"]
        );
        assert_eq!(
            parse_cc_list(Some("a@example.com;b@example.com,")),
            vec!["a@example.com", "b@example.com"]
        );
    }

    #[test]
    fn test_toml_parsing_with_env_substitution() {
        let env = vec![("API_TOKEN", "tok"), ("SMTP_PASS", "pw")];
        let loader =
            TomlConfigLoader::new("unused.toml", true).with_lookup(lookup_from(&env));

        let config = loader.parse_str(TEST_CONFIG_TOML).unwrap();
        assert_eq!(config.target.token, "tok");
        assert_eq!(config.mail.smtp_password, "pw");
        assert_eq!(config.mail.cc.len(), 2);
        assert_eq!(config.logging.retention_days, 7);
        assert_eq!(config.schedule.hourly_check, "0 0 * * * *");
    }

    #[test]
    fn test_toml_parsing_missing_substitution_var() {
        let loader = TomlConfigLoader::new("unused.toml", true).with_lookup(lookup_from(&[]));

        let err = loader.parse_str(TEST_CONFIG_TOML).unwrap_err();
        assert!(err.to_string().contains("API_TOKEN"));
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new("unused.toml", false);
        let content = "test ${VAR} content";
        assert_eq!(loader.substitute_env_vars(content).unwrap(), content);
    }

    #[tokio::test]
    async fn test_toml_loader_missing_file() {
        let loader = TomlConfigLoader::new("/nonexistent/api-monitor.toml", false);
        let err = loader.load().await.unwrap_err();
        assert!(err.to_string().contains("配置文件不存在"));
    }

    #[tokio::test]
    async fn test_toml_loader_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api-monitor.toml");
        tokio::fs::write(&path, TEST_CONFIG_TOML).await.unwrap();

        let env = vec![("API_TOKEN", "tok"), ("SMTP_PASS", "pw")];
        let loader = TomlConfigLoader::new(&path, true).with_lookup(lookup_from(&env));
        let config = loader.load().await.unwrap();
        assert_eq!(config.mail.smtp_port, 587);
    }
}
