//! 通知模块
//!
//! 提供通知策略、报告模板和邮件发送功能

pub mod mailer;
pub mod policy;
pub mod template;

// 重新导出主要类型
pub use mailer::{EmailMessage, MailTransport, NoOpMailer, SmtpMailer};
pub use policy::{decide, NotificationDecision, Recipients};
pub use template::{RenderedReport, ReportRenderer};
