//! 邮件发送模块
//!
//! 定义邮件发送 trait，并提供基于 SMTP 的实现

use crate::config::MailConfig;
use crate::error::NotificationError;
use crate::notification::policy::Recipients;
use crate::notification::template::RenderedReport;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info};

/// 使用隐式TLS的SMTP端口
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// 一封待发送的邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 发件人
    pub from: String,
    /// 主收件人
    pub to: String,
    /// 抄送列表
    pub cc: Vec<String>,
    /// 标题
    pub subject: String,
    /// HTML正文
    pub html_body: String,
}

impl EmailMessage {
    /// 根据报告和收件人范围构建邮件
    ///
    /// 抄送列表为空时，`PrimaryPlusSecondary` 退化为只发给主收件人。
    ///
    /// # 参数
    /// * `mail` - 邮件配置
    /// * `recipients` - 收件人范围
    /// * `report` - 渲染后的报告
    pub fn for_report(mail: &MailConfig, recipients: Recipients, report: &RenderedReport) -> Self {
        let cc = match recipients {
            Recipients::Primary => Vec::new(),
            Recipients::PrimaryPlusSecondary => {
                if mail.cc.is_empty() {
                    info!("未配置抄送地址，仅发送给主收件人");
                }
                mail.cc.clone()
            }
        };

        Self {
            from: mail.from.clone(),
            to: mail.to.clone(),
            cc,
            subject: report.subject.clone(),
            html_body: report.body.clone(),
        }
    }

    /// 用于日志的收件人描述
    pub fn recipient_list(&self) -> String {
        if self.cc.is_empty() {
            self.to.clone()
        } else {
            format!("{} + CC: {}", self.to, self.cc.join(", "))
        }
    }

    /// 转换为 lettre 消息
    fn to_lettre(&self) -> Result<Message, NotificationError> {
        let mut builder = Message::builder()
            .from(parse_mailbox(&self.from)?)
            .to(parse_mailbox(&self.to)?)
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_HTML);
        for cc in &self.cc {
            builder = builder.cc(parse_mailbox(cc)?);
        }
        builder
            .body(self.html_body.clone())
            .map_err(|e| NotificationError::MessageError(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotificationError::MessageError(format!("无效的邮件地址 '{address}': {e}")))
}

/// 邮件发送 trait
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// 发送邮件
    ///
    /// # 参数
    /// * `message` - 待发送的邮件
    ///
    /// # 返回
    /// * `Result<String, NotificationError>` - 服务器返回的投递标识
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError>;

    /// 测试连接
    async fn test_connection(&self) -> Result<(), NotificationError> {
        Ok(())
    }
}

/// SMTP 邮件发送器
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
}

impl SmtpMailer {
    /// 创建新的SMTP发送器
    ///
    /// 465 端口使用隐式TLS，其他端口使用 STARTTLS。
    ///
    /// # 参数
    /// * `mail` - 邮件配置
    ///
    /// # 返回
    /// * `Result<Self, NotificationError>` - 发送器实例
    pub fn new(mail: &MailConfig) -> Result<Self, NotificationError> {
        let builder = if mail.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&mail.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&mail.smtp_host)
        }
        .map_err(|e| NotificationError::ConfigError(format!("创建SMTP连接失败: {e}")))?;

        let transport = builder
            .port(mail.smtp_port)
            .credentials(Credentials::new(
                mail.smtp_user.clone(),
                mail.smtp_password.clone(),
            ))
            .timeout(Some(Duration::from_secs(30)))
            .build();

        Ok(Self {
            transport,
            host: mail.smtp_host.clone(),
            port: mail.smtp_port,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError> {
        debug!("通过SMTP发送邮件: {}:{}", self.host, self.port);
        let email = message.to_lettre()?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NotificationError::SendError(e.to_string()))?;

        let detail = response.message().collect::<Vec<_>>().join(" ");
        Ok(format!("{} {}", response.code(), detail))
    }

    async fn test_connection(&self) -> Result<(), NotificationError> {
        match self.transport.test_connection().await {
            Ok(true) => {
                info!("SMTP连接测试成功: {}:{}", self.host, self.port);
                Ok(())
            }
            Ok(false) => Err(NotificationError::SendError(format!(
                "SMTP服务器无响应: {}:{}",
                self.host, self.port
            ))),
            Err(e) => Err(NotificationError::SendError(e.to_string())),
        }
    }
}

/// 空的邮件发送器（试运行时使用）
pub struct NoOpMailer;

#[async_trait]
impl MailTransport for NoOpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<String, NotificationError> {
        info!("试运行，未发送邮件: {} -> {}", message.subject, message.recipient_list());
        Ok("dry-run".to_string())
    }
}
