//! 健康检测模块
//!
//! 包含端点目录、探测器、测试套件运行器和调度器

pub mod catalog;
pub mod probe;
pub mod result;
pub mod runner;
pub mod scheduler;

pub use catalog::{default_catalog, EndpointCheck, Inspection};
pub use probe::{EndpointProber, HttpProber};
pub use result::{HealthTier, OutcomeKind, ProbeOutcome, ResultSummary};
pub use runner::SuiteRunner;
pub use scheduler::{
    CancelHandle, Clock, HealthCheckScheduler, ManualTriggerTimer, RetentionCleaner,
    SchedulerStatus, SystemClock, TokioTriggerTimer, TriggerCallback, TriggerContext,
    TriggerTimer,
};
