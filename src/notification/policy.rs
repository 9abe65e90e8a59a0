//! 通知策略
//!
//! 根据运行结果和触发来源决定是否发送邮件以及收件人范围

use crate::health::result::ResultSummary;
use crate::health::scheduler::TriggerContext;
use serde::Serialize;

/// 收件人范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipients {
    /// 仅主收件人
    Primary,
    /// 主收件人加抄送列表
    PrimaryPlusSecondary,
}

/// 通知决策
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationDecision {
    /// 是否发送
    pub send: bool,
    /// 收件人范围，`send` 为 false 时无意义
    pub recipients: Recipients,
}

impl NotificationDecision {
    fn send_to(recipients: Recipients) -> Self {
        Self {
            send: true,
            recipients,
        }
    }

    fn suppress() -> Self {
        Self {
            send: false,
            recipients: Recipients::Primary,
        }
    }
}

/// 决定是否发送通知
///
/// 优先级：存在失败时无论触发来源都发送给主收件人和抄送；
/// 否则仅每日成功报告发送给主收件人；其余情况不发送。
///
/// # 参数
/// * `summary` - 本次运行的汇总
/// * `trigger` - 触发来源
///
/// # 返回
/// * `NotificationDecision` - 通知决策
pub fn decide(summary: &ResultSummary, trigger: TriggerContext) -> NotificationDecision {
    if summary.failure() > 0 {
        return NotificationDecision::send_to(Recipients::PrimaryPlusSecondary);
    }
    match trigger {
        TriggerContext::DailySuccessReport => NotificationDecision::send_to(Recipients::Primary),
        TriggerContext::HourlyCheck | TriggerContext::ManualRun => NotificationDecision::suppress(),
    }
}
