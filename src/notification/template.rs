//! 报告模板模块
//!
//! 使用 Handlebars 将运行汇总渲染为邮件标题和HTML正文

use crate::error::NotificationError;
use crate::health::probe::truncate_chars;
use crate::health::result::{ProbeOutcome, ResultSummary};
use handlebars::Handlebars;
use serde::Serialize;

const REPORT_TEMPLATE_NAME: &str = "report";
const REPORT_TEMPLATE: &str = include_str!("report.hbs");

/// 报告表格中错误详情的最大字符数
pub const TABLE_ERROR_CHARS: usize = 50;

/// 渲染后的报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    /// 邮件标题
    pub subject: String,
    /// HTML正文
    pub body: String,
}

#[derive(Serialize)]
struct TierView {
    label: &'static str,
    emoji: &'static str,
    color: &'static str,
}

#[derive(Serialize)]
struct RowView {
    css_class: &'static str,
    icon: &'static str,
    name: String,
    outcome: String,
    status: String,
    latency: String,
    detail: String,
}

#[derive(Serialize)]
struct ReportView<'a> {
    tier: TierView,
    report_date: String,
    executed_at: String,
    base_url: &'a str,
    total: usize,
    success: usize,
    failure: usize,
    rate: String,
    has_failures: bool,
    rows: Vec<RowView>,
}

impl RowView {
    fn from_outcome(outcome: &ProbeOutcome) -> Self {
        let passed = outcome.kind.is_success();
        Self {
            css_class: if passed { "success" } else { "error" },
            icon: if passed { "✅" } else { "❌" },
            name: outcome.check_name.clone(),
            outcome: outcome.kind.to_string(),
            status: outcome
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            latency: format!("{}ms", outcome.latency_ms()),
            detail: match &outcome.error_detail {
                Some(detail) => format!("{}...", truncate_chars(detail, TABLE_ERROR_CHARS)),
                None => "-".to_string(),
            },
        }
    }
}

/// 报告渲染器
pub struct ReportRenderer {
    registry: Handlebars<'static>,
    base_url: String,
}

impl ReportRenderer {
    /// 创建新的渲染器
    ///
    /// # 参数
    /// * `base_url` - 报告中显示的目标API地址
    ///
    /// # 返回
    /// * `Result<Self, NotificationError>` - 模板注册失败时返回错误
    pub fn new(base_url: &str) -> Result<Self, NotificationError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry
            .register_template_string(REPORT_TEMPLATE_NAME, REPORT_TEMPLATE)
            .map_err(|e| NotificationError::TemplateError(e.to_string()))?;

        Ok(Self {
            registry,
            base_url: base_url.to_string(),
        })
    }

    /// 生成邮件标题
    pub fn subject(summary: &ResultSummary) -> String {
        let tier = summary.tier();
        format!(
            "{} API {} - Health Check API ({:.1}% success)",
            tier.emoji(),
            tier.label(),
            summary.success_rate()
        )
    }

    /// 渲染报告
    ///
    /// 所有时间取自汇总本身，相同的汇总总是得到相同的输出。
    ///
    /// # 参数
    /// * `summary` - 运行汇总
    ///
    /// # 返回
    /// * `Result<RenderedReport, NotificationError>` - 渲染结果
    pub fn render(&self, summary: &ResultSummary) -> Result<RenderedReport, NotificationError> {
        let tier = summary.tier();
        let view = ReportView {
            tier: TierView {
                label: tier.label(),
                emoji: tier.emoji(),
                color: tier.color(),
            },
            report_date: summary.timestamp.format("%d %B %Y").to_string(),
            executed_at: summary.timestamp.format("%d/%m/%Y %H:%M:%S").to_string(),
            base_url: &self.base_url,
            total: summary.total(),
            success: summary.success(),
            failure: summary.failure(),
            rate: format!("{:.1}", summary.success_rate()),
            has_failures: summary.has_failures(),
            rows: summary.outcomes().iter().map(RowView::from_outcome).collect(),
        };

        let body = self
            .registry
            .render(REPORT_TEMPLATE_NAME, &view)
            .map_err(|e| NotificationError::TemplateError(e.to_string()))?;

        Ok(RenderedReport {
            subject: Self::subject(summary),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::time::Duration;

    fn summary(success: usize, failure: usize) -> ResultSummary {
        let latency = Duration::from_millis(87);
        let timestamp = Local.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let outcomes = (0..success)
            .map(|i| {
                ProbeOutcome::success(&format!("Check {i}"), "https://api.example.com/x", 200, latency)
            })
            .chain((0..failure).map(|i| {
                ProbeOutcome::status_mismatch(
                    &format!("Broken {i}"),
                    "https://api.example.com/y",
                    503,
                    latency,
                    "x".repeat(120),
                )
            }));
        ResultSummary::from_outcomes(outcomes, timestamp)
    }

    fn renderer() -> ReportRenderer {
        ReportRenderer::new("https://api.example.com").unwrap()
    }

    #[test]
    fn test_render_is_deterministic() {
        let summary = summary(3, 2);
        let first = renderer().render(&summary).unwrap();
        let second = renderer().render(&summary).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_subject_per_tier() {
        assert_eq!(
            ReportRenderer::subject(&summary(5, 0)),
            "✅ API Healthy - Health Check API (100.0% success)"
        );
        assert_eq!(
            ReportRenderer::subject(&summary(4, 1)),
            "⚠️ API Alerts - Health Check API (80.0% success)"
        );
        assert_eq!(
            ReportRenderer::subject(&summary(3, 2)),
            "🚨 API Problems - Health Check API (60.0% success)"
        );
        assert_eq!(
            ReportRenderer::subject(&summary(0, 0)),
            "🚨 API Problems - Health Check API (0.0% success)"
        );
    }

    #[test]
    fn test_body_contains_summary_and_rows() {
        let report = renderer().render(&summary(4, 1)).unwrap();
        let body = &report.body;

        assert!(body.contains("14/03/2026 09:26:53"));
        assert!(body.contains("https://api.example.com"));
        assert!(body.contains("<h3>80.0%</h3>"));
        assert!(body.contains("background-color: #ffc107; color: #fff;"));
        assert!(body.contains("Check 0"));
        assert!(body.contains("<td>503</td>"));
        assert!(body.contains("<td>87ms</td>"));
        assert!(body.contains(&format!("{}...", "x".repeat(TABLE_ERROR_CHARS))));
        assert!(!body.contains(&"x".repeat(TABLE_ERROR_CHARS + 1)));
        assert!(body.contains("1 failing check(s) detected"));
        assert!(body.contains("Checks run every hour"));
    }

    #[test]
    fn test_clean_run_has_no_warning_banner() {
        let report = renderer().render(&summary(2, 0)).unwrap();
        assert!(!report.body.contains("failing check(s) detected"));
        assert!(report.body.contains("<td class=\"detail\">-</td>"));
    }

    #[test]
    fn test_transport_error_shows_na_status() {
        let outcome = ProbeOutcome::transport_error(
            "Offline",
            "https://api.example.com/z",
            Duration::from_millis(40_000),
            "Connection failed: refused".to_string(),
        );
        let summary = ResultSummary::from_outcomes([outcome], Local::now());
        let report = renderer().render(&summary).unwrap();
        assert!(report.body.contains("<td>N/A</td>"));
        assert!(report.body.contains("Connection failed: refused..."));
    }

    #[test]
    fn test_check_names_are_html_escaped() {
        let outcome = ProbeOutcome::success(
            "<script>alert(1)</script>",
            "https://api.example.com/x",
            200,
            Duration::from_millis(1),
        );
        let summary = ResultSummary::from_outcomes([outcome], Local::now());
        let report = renderer().render(&summary).unwrap();
        assert!(!report.body.contains("<script>"));
        assert!(report.body.contains("&lt;script&gt;"));
    }
}
