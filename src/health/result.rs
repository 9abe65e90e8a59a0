//! 探测结果数据结构
//!
//! 定义单次探测结果、一次运行的汇总以及健康等级

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 探测结果类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// 状态码符合预期
    Success,
    /// 状态码不符合预期
    StatusMismatch,
    /// 网络、超时或请求构建失败
    TransportError,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Success => write!(f, "SUCCESS"),
            OutcomeKind::StatusMismatch => write!(f, "FAILURE"),
            OutcomeKind::TransportError => write!(f, "ERROR"),
        }
    }
}

impl OutcomeKind {
    /// 判断是否为成功
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Success)
    }
}

/// 单个端点的探测结果
///
/// 每次探测创建一次，创建后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// 检测名称
    pub check_name: String,
    /// 结果类型
    pub kind: OutcomeKind,
    /// 实际HTTP状态码
    pub status_code: Option<u16>,
    /// 响应时间
    #[serde(with = "duration_serde")]
    pub latency: Duration,
    /// 错误详情（已截断）
    pub error_detail: Option<String>,
    /// 请求URL
    pub url: String,
    /// 成功响应的JSON内容，仅用于日志检查
    #[serde(skip)]
    pub payload: Option<serde_json::Value>,
}

impl ProbeOutcome {
    /// 创建成功结果
    pub fn success(check_name: &str, url: &str, status_code: u16, latency: Duration) -> Self {
        Self {
            check_name: check_name.to_string(),
            kind: OutcomeKind::Success,
            status_code: Some(status_code),
            latency,
            error_detail: None,
            url: url.to_string(),
            payload: None,
        }
    }

    /// 创建状态码不匹配结果
    pub fn status_mismatch(
        check_name: &str,
        url: &str,
        status_code: u16,
        latency: Duration,
        detail: String,
    ) -> Self {
        Self {
            check_name: check_name.to_string(),
            kind: OutcomeKind::StatusMismatch,
            status_code: Some(status_code),
            latency,
            error_detail: Some(detail),
            url: url.to_string(),
            payload: None,
        }
    }

    /// 创建传输错误结果
    pub fn transport_error(check_name: &str, url: &str, latency: Duration, detail: String) -> Self {
        Self {
            check_name: check_name.to_string(),
            kind: OutcomeKind::TransportError,
            status_code: None,
            latency,
            error_detail: Some(detail),
            url: url.to_string(),
            payload: None,
        }
    }

    /// 附加响应内容
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// 获取响应时间（毫秒）
    pub fn latency_ms(&self) -> u64 {
        self.latency.as_millis() as u64
    }
}

/// Duration序列化模块
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// 一次运行的汇总结果
///
/// 由测试套件运行器逐条累积，运行结束后只读。
#[derive(Debug, Clone, Serialize)]
pub struct ResultSummary {
    /// 运行ID
    pub run_id: Uuid,
    /// 运行开始时间
    pub timestamp: DateTime<Local>,
    total: usize,
    success: usize,
    failure: usize,
    outcomes: Vec<ProbeOutcome>,
}

impl ResultSummary {
    /// 创建空的汇总
    pub(crate) fn begin(timestamp: DateTime<Local>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp,
            total: 0,
            success: 0,
            failure: 0,
            outcomes: Vec::new(),
        }
    }

    /// 记录一条探测结果
    pub(crate) fn record(&mut self, outcome: ProbeOutcome) {
        self.total += 1;
        if outcome.kind.is_success() {
            self.success += 1;
        } else {
            self.failure += 1;
        }
        self.outcomes.push(outcome);
    }

    /// 由已有的探测结果构建汇总，顺序保持不变
    pub fn from_outcomes(
        outcomes: impl IntoIterator<Item = ProbeOutcome>,
        timestamp: DateTime<Local>,
    ) -> Self {
        let mut summary = Self::begin(timestamp);
        for outcome in outcomes {
            summary.record(outcome);
        }
        summary
    }

    /// 总检测数
    pub fn total(&self) -> usize {
        self.total
    }

    /// 成功数
    pub fn success(&self) -> usize {
        self.success
    }

    /// 失败数
    pub fn failure(&self) -> usize {
        self.failure
    }

    /// 按目录顺序排列的探测结果
    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    /// 是否存在失败
    pub fn has_failures(&self) -> bool {
        self.failure > 0
    }

    /// 成功率（百分比，保留一位小数；无检测时为0）
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let rate = self.success as f64 / self.total as f64 * 100.0;
        (rate * 10.0).round() / 10.0
    }

    /// 健康等级
    pub fn tier(&self) -> HealthTier {
        HealthTier::classify(self.total, self.success)
    }
}

/// 健康等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthTier {
    /// 全部通过
    Healthy,
    /// 80% 及以上通过
    Alerts,
    /// 低于 80%
    Problems,
}

impl HealthTier {
    /// 根据成功数和总数分级
    ///
    /// 只有全部通过才算 Healthy，即使一位小数的成功率被四舍五入为 100.0。
    pub fn classify(total: usize, success: usize) -> Self {
        if total > 0 && success == total {
            return HealthTier::Healthy;
        }
        let rate = if total == 0 {
            0.0
        } else {
            success as f64 / total as f64 * 100.0
        };
        if rate >= 80.0 {
            HealthTier::Alerts
        } else {
            HealthTier::Problems
        }
    }

    /// 等级标签
    pub fn label(&self) -> &'static str {
        match self {
            HealthTier::Healthy => "Healthy",
            HealthTier::Alerts => "Alerts",
            HealthTier::Problems => "Problems",
        }
    }

    /// 标题中使用的图标
    pub fn emoji(&self) -> &'static str {
        match self {
            HealthTier::Healthy => "✅",
            HealthTier::Alerts => "⚠️",
            HealthTier::Problems => "🚨",
        }
    }

    /// 报告中使用的颜色
    pub fn color(&self) -> &'static str {
        match self {
            HealthTier::Healthy => "#28a745",
            HealthTier::Alerts => "#ffc107",
            HealthTier::Problems => "#dc3545",
        }
    }
}

impl std::fmt::Display for HealthTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(name: &str, kind: OutcomeKind) -> ProbeOutcome {
        let latency = Duration::from_millis(120);
        match kind {
            OutcomeKind::Success => ProbeOutcome::success(name, "https://api/x", 200, latency),
            OutcomeKind::StatusMismatch => ProbeOutcome::status_mismatch(
                name,
                "https://api/x",
                500,
                latency,
                "boom".to_string(),
            ),
            OutcomeKind::TransportError => ProbeOutcome::transport_error(
                name,
                "https://api/x",
                latency,
                "connection refused".to_string(),
            ),
        }
    }

    fn summary(success: usize, failure: usize) -> ResultSummary {
        let outcomes = (0..success)
            .map(|i| outcome(&format!("ok-{i}"), OutcomeKind::Success))
            .chain((0..failure).map(|i| outcome(&format!("fail-{i}"), OutcomeKind::StatusMismatch)));
        ResultSummary::from_outcomes(outcomes, Local::now())
    }

    #[test]
    fn test_summary_counts_are_consistent() {
        let outcomes = vec![
            outcome("a", OutcomeKind::Success),
            outcome("b", OutcomeKind::TransportError),
            outcome("c", OutcomeKind::StatusMismatch),
            outcome("d", OutcomeKind::Success),
        ];
        let summary = ResultSummary::from_outcomes(outcomes, Local::now());

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.success(), 2);
        assert_eq!(summary.failure(), 2);
        assert_eq!(summary.total(), summary.success() + summary.failure());
        assert_eq!(summary.outcomes().len(), summary.total());
        let names: Vec<_> = summary.outcomes().iter().map(|o| o.check_name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_success_rate_rounding() {
        assert_eq!(summary(0, 0).success_rate(), 0.0);
        assert_eq!(summary(5, 0).success_rate(), 100.0);
        assert_eq!(summary(2, 1).success_rate(), 66.7);
        assert_eq!(summary(4, 1).success_rate(), 80.0);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(summary(5, 0).tier(), HealthTier::Healthy);
        assert_eq!(summary(4, 1).tier(), HealthTier::Alerts);
        assert_eq!(summary(3, 2).tier(), HealthTier::Problems);
        assert_eq!(summary(0, 0).tier(), HealthTier::Problems);
        // 99.95% 四舍五入为 100.0，但仍有失败
        assert_eq!(HealthTier::classify(2000, 1999), HealthTier::Alerts);
    }

    #[test]
    fn test_serialized_summary_counters_match_outcomes() {
        let value = serde_json::to_value(summary(3, 2)).unwrap();
        let outcomes = value["outcomes"].as_array().unwrap();

        assert_eq!(value["total"], 5);
        assert_eq!(value["success"], 3);
        assert_eq!(value["failure"], 2);
        assert_eq!(outcomes.len(), 5);
        let failures = outcomes
            .iter()
            .filter(|o| o["kind"] != "success")
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn test_outcome_serialization_skips_payload() {
        let outcome = outcome("a", OutcomeKind::Success).with_payload(serde_json::json!({"k": 1}));
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"kind\":\"success\""));
        assert!(json.contains("\"latency\":120"));
        assert!(!json.contains("payload"));
    }
}
