//! 任务调度器模块
//!
//! 管理三个周期触发器（每小时检测、每日成功报告、每日日志清理），
//! 并负责调度器的启动、停止和状态查询。

use crate::config::{Config, MailConfig};
use crate::error::{ConfigError, NotificationError, Result};
use crate::health::catalog::{default_catalog, EndpointCheck};
use crate::health::probe::EndpointProber;
use crate::health::result::ResultSummary;
use crate::health::runner::SuiteRunner;
use crate::notification::{decide, EmailMessage, MailTransport, Recipients, ReportRenderer};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use cron::Schedule;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 触发来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerContext {
    /// 每小时例行检测
    HourlyCheck,
    /// 每日成功报告
    DailySuccessReport,
    /// 手动执行
    ManualRun,
}

impl std::fmt::Display for TriggerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerContext::HourlyCheck => write!(f, "hourly-check"),
            TriggerContext::DailySuccessReport => write!(f, "daily-success-report"),
            TriggerContext::ManualRun => write!(f, "manual-run"),
        }
    }
}

/// 调度器内部状态
///
/// 只能通过 start/stop/execute 对应的转换方法修改。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    running: bool,
    last_run: Option<DateTime<Local>>,
    next_run: Option<DateTime<Local>>,
    last_success_report: Option<DateTime<Local>>,
}

impl SchedulerState {
    /// Stopped -> Running，已在运行时返回 false
    fn mark_started(&mut self, next_run: Option<DateTime<Local>>) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.next_run = next_run;
        true
    }

    /// Running -> Stopped，未运行时返回 false
    fn mark_stopped(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.next_run = None;
        true
    }

    /// 记录一次运行完成
    fn record_run(&mut self, finished_at: DateTime<Local>, next_run: Option<DateTime<Local>>) {
        self.last_run = Some(finished_at);
        if self.running {
            self.next_run = next_run;
        }
    }

    /// 记录成功报告已送达
    fn record_success_report(&mut self, delivered_at: DateTime<Local>) {
        self.last_success_report = Some(delivered_at);
    }
}

/// 调度器状态快照
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// 是否运行中
    pub running: bool,
    /// 最近一次运行时间
    pub last_run: Option<DateTime<Local>>,
    /// 下次每小时检测时间
    pub next_run: Option<DateTime<Local>>,
    /// 最近一次成功报告送达时间
    pub last_success_report: Option<DateTime<Local>>,
    /// 目标API基础URL
    pub base_url: String,
    /// API用户名
    pub username: String,
}

/// 时钟抽象
pub trait Clock: Send + Sync {
    /// 当前本地时间
    fn now(&self) -> DateTime<Local>;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// 触发器回调
pub type TriggerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// 触发器取消句柄
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl CancelHandle {
    /// 创建取消句柄
    ///
    /// # 参数
    /// * `cancelled` - 与触发器共享的取消标志
    /// * `task` - 触发器所在的任务（可选）
    pub fn new(cancelled: Arc<AtomicBool>, task: Option<JoinHandle<()>>) -> Self {
        Self { cancelled, task }
    }

    /// 取消触发器
    pub fn cancel(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(task) = self.task {
            task.abort();
        }
    }

    /// 是否已取消
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// 周期触发器抽象
pub trait TriggerTimer: Send + Sync {
    /// 注册周期触发器
    ///
    /// # 参数
    /// * `name` - 触发器名称
    /// * `schedule` - cron 计划
    /// * `callback` - 每次触发时执行的回调
    ///
    /// # 返回
    /// * `CancelHandle` - 用于取消该触发器
    fn schedule_recurring(
        &self,
        name: &str,
        schedule: &Schedule,
        callback: TriggerCallback,
    ) -> CancelHandle;
}

/// 基于 tokio 的触发器，休眠到下一个 cron 时间点再触发
pub struct TokioTriggerTimer {
    clock: Arc<dyn Clock>,
}

impl TokioTriggerTimer {
    /// 创建触发器
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl TriggerTimer for TokioTriggerTimer {
    fn schedule_recurring(
        &self,
        name: &str,
        schedule: &Schedule,
        callback: TriggerCallback,
    ) -> CancelHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let clock = Arc::clone(&self.clock);
        let schedule = schedule.clone();
        let name = name.to_string();

        let task = tokio::spawn(async move {
            let mut last_fired: Option<DateTime<Local>> = None;
            loop {
                let now = clock.now();
                // 从上一个已触发的时间点向后推算，时钟回拨时同一时间点不会重复触发
                let from = match last_fired {
                    Some(fired) if fired > now => fired,
                    _ => now,
                };
                let Some(next) = schedule.after(&from).next() else {
                    warn!("触发器 {} 没有后续执行时间，停止", name);
                    break;
                };
                debug!("触发器 {} 下次执行: {}", name, next);

                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                if flag.load(Ordering::SeqCst) {
                    break;
                }
                last_fired = Some(next);
                // 回调在独立任务中执行
                tokio::spawn(callback());
            }
        });

        CancelHandle::new(cancelled, Some(task))
    }
}

/// 手动触发器
///
/// 不依赖真实时间，通过 [`ManualTriggerTimer::fire`] 主动触发已注册的回调。
#[derive(Default)]
pub struct ManualTriggerTimer {
    registrations: std::sync::Mutex<Vec<ManualRegistration>>,
}

struct ManualRegistration {
    name: String,
    callback: TriggerCallback,
    cancelled: Arc<AtomicBool>,
}

impl ManualTriggerTimer {
    /// 创建手动触发器
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前仍有效的触发器名称
    pub fn active_triggers(&self) -> Vec<String> {
        let registrations = self
            .registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registrations
            .iter()
            .filter(|r| !r.cancelled.load(Ordering::SeqCst))
            .map(|r| r.name.clone())
            .collect()
    }

    /// 触发指定名称的有效触发器并等待回调完成
    ///
    /// # 返回
    /// * `usize` - 实际触发的回调数量
    pub async fn fire(&self, name: &str) -> usize {
        let callbacks: Vec<TriggerCallback> = {
            let registrations = self
                .registrations
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            registrations
                .iter()
                .filter(|r| r.name == name && !r.cancelled.load(Ordering::SeqCst))
                .map(|r| Arc::clone(&r.callback))
                .collect()
        };

        for callback in &callbacks {
            callback().await;
        }
        callbacks.len()
    }
}

impl TriggerTimer for ManualTriggerTimer {
    fn schedule_recurring(
        &self,
        name: &str,
        _schedule: &Schedule,
        callback: TriggerCallback,
    ) -> CancelHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut registrations = self
            .registrations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registrations.retain(|r| !r.cancelled.load(Ordering::SeqCst));
        registrations.push(ManualRegistration {
            name: name.to_string(),
            callback,
            cancelled: Arc::clone(&cancelled),
        });
        CancelHandle::new(cancelled, None)
    }
}

/// 日志保留清理
#[async_trait]
pub trait RetentionCleaner: Send + Sync {
    /// 删除过期文件
    ///
    /// # 返回
    /// * `Result<usize>` - 删除的文件数量
    async fn cleanup(&self) -> Result<usize>;
}

/// 触发器名称
pub const HOURLY_CHECK_TRIGGER: &str = "hourly-check";
pub const SUCCESS_REPORT_TRIGGER: &str = "daily-success-report";
pub const LOG_CLEANUP_TRIGGER: &str = "daily-log-cleanup";

/// 已解析的 cron 计划
#[derive(Debug, Clone)]
struct TriggerSchedules {
    hourly_check: Schedule,
    success_report: Schedule,
    log_cleanup: Schedule,
}

fn parse_schedule(field: &str, expression: &str) -> Result<Schedule> {
    Schedule::from_str(expression).map_err(|e| {
        ConfigError::ValidationError(format!("{field} cron表达式无效 '{expression}': {e}")).into()
    })
}

/// 健康检测调度器
pub struct HealthCheckScheduler {
    runner: SuiteRunner,
    catalog: Vec<EndpointCheck>,
    renderer: ReportRenderer,
    mailer: Arc<dyn MailTransport>,
    mail: MailConfig,
    cleaner: Option<Arc<dyn RetentionCleaner>>,
    /// 未注入时在启动时按当前时钟创建 `TokioTriggerTimer`
    timer: Option<Arc<dyn TriggerTimer>>,
    clock: Arc<dyn Clock>,
    schedules: TriggerSchedules,
    state: RwLock<SchedulerState>,
    handles: Mutex<Vec<CancelHandle>>,
    run_guard: Mutex<()>,
    base_url: String,
    username: String,
}

impl HealthCheckScheduler {
    /// 创建新的调度器
    ///
    /// # 参数
    /// * `config` - 已验证的配置
    /// * `prober` - 端点探测器
    /// * `mailer` - 邮件发送器
    ///
    /// # 返回
    /// * `Result<Self>` - 调度器实例，cron 表达式无效时返回错误
    pub fn new(
        config: &Config,
        prober: Arc<dyn EndpointProber>,
        mailer: Arc<dyn MailTransport>,
    ) -> Result<Self> {
        let schedules = TriggerSchedules {
            hourly_check: parse_schedule("hourly_check", &config.schedule.hourly_check)?,
            success_report: parse_schedule("success_report", &config.schedule.success_report)?,
            log_cleanup: parse_schedule("log_cleanup", &config.schedule.log_cleanup)?,
        };

        Ok(Self {
            runner: SuiteRunner::new(prober, config.target.base_url.clone()),
            catalog: default_catalog(),
            renderer: ReportRenderer::new(&config.target.base_url)?,
            mailer,
            mail: config.mail.clone(),
            cleaner: None,
            timer: None,
            clock: Arc::new(SystemClock),
            schedules,
            state: RwLock::new(SchedulerState::default()),
            handles: Mutex::new(Vec::new()),
            run_guard: Mutex::new(()),
            base_url: config.target.base_url.clone(),
            username: config.target.username.clone(),
        })
    }

    /// 替换时钟
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 替换触发器实现
    pub fn with_timer(mut self, timer: Arc<dyn TriggerTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// 替换检测目录
    pub fn with_catalog(mut self, catalog: Vec<EndpointCheck>) -> Self {
        self.catalog = catalog;
        self
    }

    /// 设置日志清理器
    pub fn with_retention(mut self, cleaner: Arc<dyn RetentionCleaner>) -> Self {
        self.cleaner = Some(cleaner);
        self
    }

    /// 启动调度器
    ///
    /// 注册三个周期触发器并立即执行一次每小时检测（不等待完成）。
    /// 已在运行时不做任何操作。
    pub async fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock().await;
        let mut state = self.state.write().await;
        if state.running {
            warn!("调度器已在运行，忽略重复启动");
            return;
        }

        let timer = self.trigger_timer();
        handles.push(timer.schedule_recurring(
            HOURLY_CHECK_TRIGGER,
            &self.schedules.hourly_check,
            self.run_callback(TriggerContext::HourlyCheck),
        ));
        handles.push(timer.schedule_recurring(
            SUCCESS_REPORT_TRIGGER,
            &self.schedules.success_report,
            self.run_callback(TriggerContext::DailySuccessReport),
        ));
        handles.push(timer.schedule_recurring(
            LOG_CLEANUP_TRIGGER,
            &self.schedules.log_cleanup,
            self.cleanup_callback(),
        ));

        let next_run = self.next_hourly_run();
        state.mark_started(next_run);
        drop(state);
        drop(handles);

        info!("调度器已启动");
        info!("每小时检测: {}", self.schedules.hourly_check);
        info!("每日成功报告: {}", self.schedules.success_report);
        info!("每日日志清理: {}", self.schedules.log_cleanup);
        if let Some(next_run) = next_run {
            info!("下次检测时间: {}", next_run.format("%Y-%m-%d %H:%M:%S"));
        }

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            info!("执行启动时的首次检测...");
            scheduler.execute(TriggerContext::HourlyCheck).await;
        });
    }

    /// 停止调度器
    ///
    /// 取消所有触发器，正在执行的检测不会被等待。未运行时不做任何操作。
    pub async fn stop(&self) {
        let mut handles = self.handles.lock().await;
        let mut state = self.state.write().await;
        if !state.mark_stopped() {
            info!("调度器未运行，无需停止");
            return;
        }
        let count = handles.len();
        for handle in handles.drain(..) {
            handle.cancel();
        }
        info!("调度器已停止，取消 {} 个触发器", count);
    }

    /// 立即执行一次手动检测
    pub async fn run_manually(&self) -> Option<ResultSummary> {
        info!("手动执行健康检测");
        self.execute(TriggerContext::ManualRun).await
    }

    /// 获取状态快照
    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.read().await;
        SchedulerStatus {
            running: state.running,
            last_run: state.last_run,
            next_run: state.next_run,
            last_success_report: state.last_success_report,
            base_url: self.base_url.clone(),
            username: self.username.clone(),
        }
    }

    /// 执行一次完整的检测流程
    ///
    /// 运行测试套件，按通知策略决定是否发送报告，并更新状态。
    /// 已有检测在执行时跳过本次触发。
    ///
    /// # 返回
    /// * `Option<ResultSummary>` - 被跳过时为 None
    pub async fn execute(&self, trigger: TriggerContext) -> Option<ResultSummary> {
        let guard = match self.run_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("已有检测正在执行，跳过本次触发: {}", trigger);
                return None;
            }
        };

        info!("开始执行检测，触发来源: {}", trigger);
        let summary = self.runner.run(&self.catalog).await;

        let decision = decide(&summary, trigger);
        let mut delivered = false;
        if decision.send {
            match self.deliver(&summary, decision.recipients).await {
                Ok(message_id) => {
                    info!("报告邮件发送成功: {}", message_id);
                    delivered = true;
                }
                Err(e) => {
                    error!("报告邮件发送失败: {}", e);
                }
            }
        } else {
            info!("全部检测通过，本次无需发送邮件");
        }

        // 状态对外可见前先释放运行锁
        drop(guard);

        let finished_at = self.clock.now();
        let next_run = self.next_hourly_run();
        let mut state = self.state.write().await;
        state.record_run(finished_at, next_run);
        if delivered && trigger == TriggerContext::DailySuccessReport {
            state.record_success_report(finished_at);
        }

        Some(summary)
    }

    /// 渲染并发送报告
    async fn deliver(
        &self,
        summary: &ResultSummary,
        recipients: Recipients,
    ) -> std::result::Result<String, NotificationError> {
        let report = self.renderer.render(summary)?;
        let message = EmailMessage::for_report(&self.mail, recipients, &report);
        info!("发送报告邮件: {} -> {}", message.subject, message.recipient_list());
        self.mailer.send(&message).await
    }

    /// 执行日志清理
    async fn run_cleanup(&self) {
        let Some(cleaner) = &self.cleaner else {
            debug!("未配置日志清理器");
            return;
        };
        match cleaner.cleanup().await {
            Ok(deleted) => info!("日志清理完成，删除 {} 个文件", deleted),
            Err(e) => error!("日志清理失败: {}", e),
        }
    }

    fn trigger_timer(&self) -> Arc<dyn TriggerTimer> {
        match &self.timer {
            Some(timer) => Arc::clone(timer),
            None => Arc::new(TokioTriggerTimer::new(Arc::clone(&self.clock))),
        }
    }

    fn next_hourly_run(&self) -> Option<DateTime<Local>> {
        self.schedules.hourly_check.after(&self.clock.now()).next()
    }

    fn run_callback(self: &Arc<Self>, trigger: TriggerContext) -> TriggerCallback {
        let scheduler: Weak<Self> = Arc::downgrade(self);
        Arc::new(move || {
            let scheduler = scheduler.clone();
            async move {
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.execute(trigger).await;
                }
            }
            .boxed()
        })
    }

    fn cleanup_callback(self: &Arc<Self>) -> TriggerCallback {
        let scheduler: Weak<Self> = Arc::downgrade(self);
        Arc::new(move || {
            let scheduler = scheduler.clone();
            async move {
                if let Some(scheduler) = scheduler.upgrade() {
                    scheduler.run_cleanup().await;
                }
            }
            .boxed()
        })
    }
}

impl Drop for HealthCheckScheduler {
    fn drop(&mut self) {
        if let Ok(mut handles) = self.handles.try_lock() {
            for handle in handles.drain(..) {
                handle.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::tests::create_test_config;
    use crate::health::result::ProbeOutcome;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    struct FixedClock(DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 10, 15, 0).unwrap()
    }

    struct StubProber {
        fail: bool,
    }

    #[async_trait]
    impl EndpointProber for StubProber {
        async fn probe(&self, check: &EndpointCheck) -> ProbeOutcome {
            let url = check.url("https://api.example.com");
            if self.fail && check.name == "second" {
                ProbeOutcome::status_mismatch(
                    &check.name,
                    &url,
                    500,
                    Duration::from_millis(3),
                    "{\"erro\":\"interno\"}".to_string(),
                )
            } else {
                ProbeOutcome::success(&check.name, &url, 200, Duration::from_millis(3))
            }
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        fail: bool,
        sent: std::sync::Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl MailTransport for RecordingMailer {
        async fn send(
            &self,
            message: &EmailMessage,
        ) -> std::result::Result<String, NotificationError> {
            if self.fail {
                return Err(NotificationError::SendError("smtp unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok("queued".to_string())
        }
    }

    #[derive(Default)]
    struct CountingCleaner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RetentionCleaner for CountingCleaner {
        async fn cleanup(&self) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(2)
        }
    }

    struct Harness {
        scheduler: Arc<HealthCheckScheduler>,
        timer: Arc<ManualTriggerTimer>,
        mailer: Arc<RecordingMailer>,
        cleaner: Arc<CountingCleaner>,
    }

    fn harness(prober_fails: bool, mailer_fails: bool) -> Harness {
        let config = create_test_config();
        let timer = Arc::new(ManualTriggerTimer::new());
        let mailer = Arc::new(RecordingMailer {
            fail: mailer_fails,
            ..Default::default()
        });
        let cleaner = Arc::new(CountingCleaner::default());
        let scheduler = HealthCheckScheduler::new(
            &config,
            Arc::new(StubProber { fail: prober_fails }),
            mailer.clone(),
        )
        .unwrap()
        .with_clock(Arc::new(FixedClock(fixed_now())))
        .with_timer(timer.clone())
        .with_retention(cleaner.clone())
        .with_catalog(vec![
            EndpointCheck::get("Group", "first", "/first"),
            EndpointCheck::get("Group", "second", "/second"),
        ]);

        Harness {
            scheduler: Arc::new(scheduler),
            timer,
            mailer,
            cleaner,
        }
    }

    /// 等待 start() 触发的首次检测完成
    async fn wait_for_initial_run(scheduler: &HealthCheckScheduler) {
        for _ in 0..200 {
            if scheduler.status().await.last_run.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("initial run did not finish");
    }

    #[tokio::test]
    async fn test_start_twice_keeps_one_set_of_triggers() {
        let h = harness(false, false);

        h.scheduler.start().await;
        h.scheduler.start().await;
        wait_for_initial_run(&h.scheduler).await;

        let mut active = h.timer.active_triggers();
        active.sort();
        assert_eq!(
            active,
            [LOG_CLEANUP_TRIGGER, SUCCESS_REPORT_TRIGGER, HOURLY_CHECK_TRIGGER]
        );

        let status = h.scheduler.status().await;
        assert!(status.running);
        assert_eq!(
            status.next_run,
            Some(Local.with_ymd_and_hms(2026, 10, 19, 11, 0, 0).unwrap())
        );
        assert_eq!(status.base_url, "https://api.example.com");
        assert_eq!(status.username, "monitor");
    }

    #[tokio::test]
    async fn test_stop_cancels_triggers_and_clears_next_run() {
        let h = harness(false, false);
        h.scheduler.start().await;
        wait_for_initial_run(&h.scheduler).await;

        h.scheduler.stop().await;
        h.scheduler.stop().await;

        let status = h.scheduler.status().await;
        assert!(!status.running);
        assert!(status.next_run.is_none());
        assert!(status.last_run.is_some());
        assert!(h.timer.active_triggers().is_empty());
        assert_eq!(h.timer.fire(HOURLY_CHECK_TRIGGER).await, 0);
    }

    #[tokio::test]
    async fn test_hourly_run_without_failures_sends_nothing() {
        let h = harness(false, false);
        h.scheduler.start().await;
        wait_for_initial_run(&h.scheduler).await;

        assert_eq!(h.timer.fire(HOURLY_CHECK_TRIGGER).await, 1);
        assert!(h.mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hourly_failure_mails_primary_and_cc() {
        let h = harness(true, false);
        h.scheduler.start().await;
        wait_for_initial_run(&h.scheduler).await;
        h.timer.fire(HOURLY_CHECK_TRIGGER).await;

        let sent = h.mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "ops@example.com");
        assert_eq!(sent[1].cc, vec!["team@example.com".to_string()]);
        assert!(sent[1].subject.contains("Problems"));
        assert!(h.scheduler.status().await.last_success_report.is_none());
    }

    #[tokio::test]
    async fn test_daily_success_report_goes_to_primary_only() {
        let h = harness(false, false);
        h.scheduler.start().await;
        wait_for_initial_run(&h.scheduler).await;

        h.timer.fire(SUCCESS_REPORT_TRIGGER).await;

        let sent = h.mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ops@example.com");
        assert!(sent[0].cc.is_empty());
        assert!(sent[0].subject.contains("100.0% success"));
        assert_eq!(
            h.scheduler.status().await.last_success_report,
            Some(fixed_now())
        );
    }

    #[tokio::test]
    async fn test_mail_failure_is_logged_and_scheduler_keeps_running() {
        let h = harness(false, true);
        h.scheduler.start().await;
        wait_for_initial_run(&h.scheduler).await;

        let summary = h.scheduler.execute(TriggerContext::DailySuccessReport).await;
        assert!(summary.is_some());

        let status = h.scheduler.status().await;
        assert!(status.running);
        assert!(status.last_success_report.is_none());
        assert_eq!(h.timer.fire(HOURLY_CHECK_TRIGGER).await, 1);
    }

    #[tokio::test]
    async fn test_overlapping_run_is_skipped() {
        let h = harness(false, false);
        let _guard = h.scheduler.run_guard.lock().await;

        assert!(h.scheduler.run_manually().await.is_none());
        assert!(h.scheduler.status().await.last_run.is_none());
    }

    #[tokio::test]
    async fn test_manual_run_while_stopped_leaves_next_run_empty() {
        let h = harness(true, false);

        let summary = h.scheduler.run_manually().await.unwrap();

        assert_eq!(summary.total(), 2);
        assert_eq!(summary.failure(), 1);
        let status = h.scheduler.status().await;
        assert!(!status.running);
        assert!(status.next_run.is_none());
        assert_eq!(status.last_run, Some(fixed_now()));
        assert_eq!(h.mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_trigger_runs_retention() {
        let h = harness(false, false);
        h.scheduler.start().await;
        wait_for_initial_run(&h.scheduler).await;

        h.timer.fire(LOG_CLEANUP_TRIGGER).await;

        assert_eq!(h.cleaner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_restart_prunes_cancelled_manual_registrations() {
        let h = harness(false, false);
        for _ in 0..3 {
            h.scheduler.start().await;
            h.scheduler.stop().await;
        }
        h.scheduler.start().await;

        let registered = h.timer.registrations.lock().unwrap().len();
        assert_eq!(registered, 3);
        assert_eq!(h.timer.active_triggers().len(), 3);
        h.scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_default_timer_follows_injected_clock_and_fires_slot_once() {
        let mut config = create_test_config();
        config.schedule.log_cleanup = "0 0 11 * * *".to_string();
        // 时钟停在 11:00 前 50ms，之后不再前进
        let just_before = Local.with_ymd_and_hms(2026, 10, 19, 10, 59, 59).unwrap()
            + chrono::Duration::milliseconds(950);
        let cleaner = Arc::new(CountingCleaner::default());
        let scheduler = Arc::new(
            HealthCheckScheduler::new(
                &config,
                Arc::new(StubProber { fail: false }),
                Arc::new(RecordingMailer::default()),
            )
            .unwrap()
            .with_clock(Arc::new(FixedClock(just_before)))
            .with_retention(cleaner.clone())
            .with_catalog(vec![EndpointCheck::get("Group", "first", "/first")]),
        );

        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cleaner.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cleaner.calls.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
    }

    #[test]
    fn test_invalid_cron_expression_is_rejected() {
        let mut config = create_test_config();
        config.schedule.hourly_check = "every hour".to_string();
        let result = HealthCheckScheduler::new(
            &config,
            Arc::new(StubProber { fail: false }),
            Arc::new(RecordingMailer::default()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_state_transitions() {
        let mut state = SchedulerState::default();
        assert!(state.mark_started(Some(fixed_now())));
        assert!(!state.mark_started(None));
        assert_eq!(state.next_run, Some(fixed_now()));
        assert!(state.mark_stopped());
        assert!(!state.mark_stopped());
        assert!(state.next_run.is_none());
    }
}
