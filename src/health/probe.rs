//! HTTP端点探测器实现
//!
//! 对单个端点发起一次HTTP请求，分类结果并记录响应时间。
//! 任何状态码都被视为正常响应，只与期望值比较，不会抛出错误。

use crate::config::TargetConfig;
use crate::error::{ProbeError, Result};
use crate::health::catalog::EndpointCheck;
use crate::health::result::ProbeOutcome;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info};

/// 错误详情的最大长度（字符）
pub const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// 端点探测器trait
#[async_trait]
pub trait EndpointProber: Send + Sync {
    /// 执行一次探测
    ///
    /// # 参数
    /// * `check` - 端点检测定义
    ///
    /// # 返回
    /// * `ProbeOutcome` - 探测结果，失败也以结果形式返回
    async fn probe(&self, check: &EndpointCheck) -> ProbeOutcome;
}

/// HTTP探测器实现
pub struct HttpProber {
    /// HTTP客户端
    client: Client,
    /// 基础URL
    base_url: String,
    /// Basic认证用户名
    username: String,
    /// Basic认证令牌
    token: String,
    /// 单次请求超时
    request_timeout: Duration,
}

impl HttpProber {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `target` - 目标API配置
    ///
    /// # 返回
    /// * `Result<Self>` - 探测器实例
    pub fn new(target: &TargetConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(ProbeError::Transport)?;

        Ok(Self {
            client,
            base_url: target.base_url.clone(),
            username: target.username.clone(),
            token: target.token.clone(),
            request_timeout: Duration::from_secs(target.request_timeout_seconds),
        })
    }

    /// 覆盖请求超时
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// 构建HTTP请求
    ///
    /// 只支持GET和POST，其他方法属于目录定义错误。
    fn build_request(
        &self,
        check: &EndpointCheck,
        url: &str,
    ) -> std::result::Result<RequestBuilder, ProbeError> {
        let request = if check.method == Method::GET {
            self.client.get(url)
        } else if check.method == Method::POST {
            let request = self.client.post(url);
            match &check.body {
                Some(body) => request.json(body),
                None => request,
            }
        } else {
            return Err(ProbeError::UnsupportedMethod {
                method: check.method.to_string(),
            });
        };

        Ok(request.basic_auth(&self.username, Some(&self.token)))
    }

    /// 发送请求并读取响应体
    async fn send(&self, request: RequestBuilder) -> std::result::Result<(u16, String), ProbeError> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        match timeout(self.request_timeout, exchange).await {
            Ok(result) => result.map_err(ProbeError::Transport),
            Err(_) => Err(ProbeError::Timeout {
                millis: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl EndpointProber for HttpProber {
    async fn probe(&self, check: &EndpointCheck) -> ProbeOutcome {
        let url = check.url(&self.base_url);
        info!("测试: {}", check.name);
        let start_time = Instant::now();

        let request = match self.build_request(check, &url) {
            Ok(request) => request,
            Err(e) => {
                error!("{} - {} ({})", check.name, e, url);
                return ProbeOutcome::transport_error(
                    &check.name,
                    &url,
                    start_time.elapsed(),
                    format_probe_error(&e),
                );
            }
        };

        let result = self.send(request).await;
        let latency = start_time.elapsed();

        match result {
            Ok((status, body)) if status == check.expected_status => {
                info!("{} - 状态: {} ({}ms)", check.name, status, latency.as_millis());
                let outcome = ProbeOutcome::success(&check.name, &url, status, latency);
                match serde_json::from_str(&body) {
                    Ok(payload) => outcome.with_payload(payload),
                    Err(_) => {
                        debug!("{} 的响应不是JSON", check.name);
                        outcome
                    }
                }
            }
            Ok((status, body)) => {
                error!(
                    "{} - 期望状态: {}, 实际: {} ({})",
                    check.name, check.expected_status, status, url
                );
                ProbeOutcome::status_mismatch(&check.name, &url, status, latency, render_body(&body))
            }
            Err(e) => {
                let detail = format_probe_error(&e);
                error!("{} - 错误: {} ({})", check.name, detail, url);
                ProbeOutcome::transport_error(&check.name, &url, latency, detail)
            }
        }
    }
}

/// 截断响应体作为错误详情
pub fn render_body(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return "no response body".to_string();
    }
    // 尽量以紧凑JSON呈现
    let compact = serde_json::from_str::<serde_json::Value>(body)
        .map(|v| v.to_string())
        .unwrap_or_else(|_| body.to_string());
    truncate_chars(&compact, MAX_ERROR_DETAIL_CHARS)
}

/// 按字符截断
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// 格式化探测错误信息，使其更加清晰易读
fn format_probe_error(error: &ProbeError) -> String {
    let message = match error {
        ProbeError::Transport(e) if e.is_timeout() => "Request timeout".to_string(),
        ProbeError::Transport(e) if e.is_connect() => format!("Connection failed: {e}"),
        ProbeError::Transport(e) if e.is_decode() || e.is_body() => {
            format!("Response read error: {e}")
        }
        ProbeError::Transport(e) => format!("Request failed: {e}"),
        ProbeError::Timeout { millis } => format!("Request timeout after {millis}ms"),
        ProbeError::UnsupportedMethod { method } => format!("Unsupported method {method}"),
    };
    truncate_chars(&message, MAX_ERROR_DETAIL_CHARS)
}
