//! 测试套件运行器
//!
//! 按目录顺序逐个执行端点检测，单个检测失败不会中断后续检测。

use crate::health::catalog::EndpointCheck;
use crate::health::probe::EndpointProber;
use crate::health::result::{HealthTier, ResultSummary};
use chrono::Local;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 测试套件运行器
#[derive(Clone)]
pub struct SuiteRunner {
    /// 端点探测器
    prober: Arc<dyn EndpointProber>,
    /// 基础URL（仅用于日志）
    base_url: String,
}

impl SuiteRunner {
    /// 创建新的运行器
    pub fn new(prober: Arc<dyn EndpointProber>, base_url: impl Into<String>) -> Self {
        Self {
            prober,
            base_url: base_url.into(),
        }
    }

    /// 顺序执行整个目录
    ///
    /// # 参数
    /// * `catalog` - 按执行顺序排列的检测列表
    ///
    /// # 返回
    /// * `ResultSummary` - 完成后的汇总结果
    pub async fn run(&self, catalog: &[EndpointCheck]) -> ResultSummary {
        let started_at = Local::now();
        let mut summary = ResultSummary::begin(started_at);

        info!("{}", "=".repeat(60));
        info!("开始API健康检测 (run {})", summary.run_id);
        info!("基础URL: {}", self.base_url);
        info!("时间: {}", started_at.format("%d/%m/%Y %H:%M:%S"));
        info!("{}", "=".repeat(60));

        let mut current_group: Option<&str> = None;
        let mut group_number = 0;
        for check in catalog {
            if current_group != Some(check.group.as_str()) {
                group_number += 1;
                info!("--- {}. {} ---", group_number, check.group);
                current_group = Some(check.group.as_str());
            }

            let outcome = self.prober.probe(check).await;

            if let (Some(inspection), Some(payload)) = (check.inspection, outcome.payload.as_ref()) {
                if outcome.kind.is_success() {
                    info!("检查 {} 的返回数据...", check.name);
                    inspection.log_fields(&check.name, payload);
                }
            }

            summary.record(outcome);
        }

        log_final_report(&summary);
        summary
    }
}

/// 输出最终报告
fn log_final_report(summary: &ResultSummary) {
    info!("{}", "=".repeat(60));
    info!("最终报告");
    info!("{}", "=".repeat(60));
    info!("检测总数: {}", summary.total());
    info!("成功: {}", summary.success());
    if summary.has_failures() {
        error!("失败: {}", summary.failure());
    } else {
        info!("失败: 0");
    }
    info!("成功率: {:.1}%", summary.success_rate());

    match summary.tier() {
        HealthTier::Healthy => info!("全部检测通过，API运行正常"),
        HealthTier::Alerts => warn!("大部分检测通过，但存在部分失败"),
        HealthTier::Problems => error!("大量检测失败，API存在问题"),
    }
    info!("{}", "=".repeat(60));
}
