//! 日志系统模块
//!
//! 提供控制台和按天滚动的文件日志，以及过期日志清理

use crate::error::Result as MonitorResult;
use crate::health::scheduler::RetentionCleaner;
use async_trait::async_trait;
use log::LevelFilter;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer, Registry};

/// 日志文件名前缀
pub const LOG_FILE_PREFIX: &str = "health-check";
/// 日志文件扩展名
pub const LOG_FILE_SUFFIX: &str = "log";

/// 全局日志初始化状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 初始化失败时的错误信息
    init_error: Option<String>,
    /// 当前配置
    current_config: Option<LogConfig>,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 日志文件目录（None 表示不写文件）
    pub log_dir: Option<PathBuf>,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        let mut module_levels = HashMap::new();
        module_levels.insert("hyper".to_string(), LevelFilter::Warn);
        module_levels.insert("rustls".to_string(), LevelFilter::Warn);

        Self {
            level: LevelFilter::Info,
            console: true,
            json_format: false,
            log_dir: None,
            module_levels,
        }
    }
}

/// 日志系统管理器
///
/// 持有文件写入线程的 guard，实例被释放时会刷新剩余日志。
pub struct LoggingSystem {
    config: LogConfig,
    _guard: Option<WorkerGuard>,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// # 参数
    /// * `config` - 日志配置
    ///
    /// # 返回
    /// * `Result<LoggingSystem, anyhow::Error>` - 初始化结果
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        let state_mutex =
            GLOBAL_LOGGING_STATE.get_or_init(|| Mutex::new(GlobalLoggingState::default()));

        {
            let state = state_mutex
                .lock()
                .map_err(|_| anyhow::anyhow!("日志状态锁已损坏"))?;
            if state.initialized {
                if let Some(e) = &state.init_error {
                    return Err(anyhow::anyhow!("日志系统之前初始化失败: {}", e));
                }
                return Ok(Self {
                    config,
                    _guard: None,
                });
            }
        }

        let init_result = Self::perform_initialization(&config);

        let mut state = state_mutex
            .lock()
            .map_err(|_| anyhow::anyhow!("日志状态锁已损坏"))?;
        state.initialized = true;
        state.current_config = Some(config.clone());
        state.init_error = init_result.as_ref().err().map(|e| e.to_string());

        let guard = init_result?;
        Ok(Self {
            config,
            _guard: guard,
        })
    }

    /// 执行实际的日志系统初始化
    fn perform_initialization(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(config)
    }

    /// 初始化 LogTracer
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 构建过滤器
    fn build_env_filter(config: &LogConfig) -> EnvFilter {
        let mut env_filter =
            EnvFilter::from_default_env().add_directive(Self::level_directive(config.level));

        for (module, level) in &config.module_levels {
            let directive = format!("{}={}", module, Self::level_to_string(*level));
            match directive.parse::<Directive>() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(e) => eprintln!("忽略无效的模块日志级别 {module}: {e}"),
            }
        }
        env_filter
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        if config.console {
            let console_layer = if config.json_format {
                fmt::layer()
                    .json()
                    .with_timer(fmt::time::ChronoLocal::rfc_3339())
                    .with_target(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_timer(fmt::time::ChronoLocal::rfc_3339())
                    .with_ansi(true)
                    .with_target(false)
                    .boxed()
            };
            layers.push(console_layer);
        }

        let mut guard = None;
        if let Some(dir) = &config.log_dir {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow::anyhow!("创建日志目录失败 {}: {}", dir.display(), e))?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix(LOG_FILE_SUFFIX)
                .build(dir)
                .map_err(|e| anyhow::anyhow!("创建日志文件失败: {}", e))?;
            let (writer, worker_guard) = tracing_appender::non_blocking(appender);
            guard = Some(worker_guard);

            let file_layer = if config.json_format {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_timer(fmt::time::ChronoLocal::rfc_3339())
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(writer)
                    .with_timer(fmt::time::ChronoLocal::rfc_3339())
                    .with_ansi(false)
                    .boxed()
            };
            layers.push(file_layer);
        }

        let result = registry()
            .with(layers)
            .with(Self::build_env_filter(config))
            .try_init();

        match result {
            Ok(()) => {
                tracing::info!("日志系统初始化完成");
                tracing::debug!("日志配置: {:?}", config);
                Ok(guard)
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains(
                    "attempted to set a logger after the logging system was already initialized",
                ) || error_msg.contains("a global default trace dispatcher has already been set")
                {
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(guard)
                } else {
                    Err(anyhow::anyhow!("tracing subscriber初始化失败: {}", error_msg))
                }
            }
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的指令
    fn level_directive(level: LevelFilter) -> Directive {
        use tracing_subscriber::filter::LevelFilter as TracingLevel;
        let level = match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        };
        Directive::from(level)
    }

    /// 将 log::LevelFilter 转换为字符串
    fn level_to_string(level: LevelFilter) -> &'static str {
        match level {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        }
    }

    /// 当前实例的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 检查日志系统是否已初始化
    pub fn is_initialized() -> bool {
        GLOBAL_LOGGING_STATE
            .get()
            .and_then(|state| state.lock().ok().map(|s| s.initialized))
            .unwrap_or(false)
    }

    /// 获取当前日志配置（如果已初始化）
    pub fn current_config() -> Option<LogConfig> {
        GLOBAL_LOGGING_STATE
            .get()
            .and_then(|state| state.lock().ok().and_then(|s| s.current_config.clone()))
    }

    /// 重置日志系统状态（主要用于测试）
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state_mutex) = GLOBAL_LOGGING_STATE.get() {
            if let Ok(mut state) = state_mutex.lock() {
                *state = GlobalLoggingState::default();
            }
        }
    }
}

/// 日志清理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// 已删除的文件数
    pub deleted: usize,
    /// 保留的文件数
    pub remaining: usize,
}

/// 删除过期的日志文件
///
/// 只处理 `health-check*.log` 文件，修改时间早于保留期的会被删除。
/// 单个文件删除失败只记录警告，不会中断清理。
///
/// # 参数
/// * `dir` - 日志目录
/// * `retention_days` - 保留天数
/// * `now` - 当前时间
///
/// # 返回
/// * `io::Result<PurgeReport>` - 清理结果，目录不存在时返回空结果
pub fn purge_expired_logs(
    dir: &Path,
    retention_days: u32,
    now: SystemTime,
) -> io::Result<PurgeReport> {
    let mut report = PurgeReport::default();
    if !dir.exists() {
        return Ok(report);
    }

    let retention = Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60);
    let suffix = format!(".{LOG_FILE_SUFFIX}");

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if !name.starts_with(LOG_FILE_PREFIX) || !name.ends_with(&suffix) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }

        let age = now
            .duration_since(metadata.modified()?)
            .unwrap_or(Duration::ZERO);
        if age <= retention {
            report.remaining += 1;
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::info!("已删除过期日志: {}", name);
                report.deleted += 1;
            }
            Err(e) => {
                tracing::warn!("删除日志文件失败 {}: {}", name, e);
                report.remaining += 1;
            }
        }
    }

    Ok(report)
}

/// 日志保留策略
#[derive(Debug, Clone)]
pub struct LogRetention {
    dir: PathBuf,
    retention_days: u32,
}

impl LogRetention {
    /// 创建保留策略
    pub fn new(dir: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            dir: dir.into(),
            retention_days,
        }
    }

    /// 立即执行一次清理
    pub fn purge_now(&self) -> io::Result<PurgeReport> {
        let report = purge_expired_logs(&self.dir, self.retention_days, SystemTime::now())?;
        tracing::info!(
            "日志清理: 目录 {}，删除 {} 个，保留 {} 个（保留 {} 天）",
            self.dir.display(),
            report.deleted,
            report.remaining,
            self.retention_days
        );
        Ok(report)
    }
}

#[async_trait]
impl RetentionCleaner for LogRetention {
    async fn cleanup(&self) -> MonitorResult<usize> {
        let retention = self.clone();
        let report = tokio::task::spawn_blocking(move || retention.purge_now())
            .await
            .map_err(|e| anyhow::anyhow!("日志清理任务失败: {}", e))??;
        Ok(report.deleted)
    }
}
