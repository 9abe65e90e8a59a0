//! 信号处理模块
//!
//! 监听 SIGINT/SIGTERM（非Unix系统为 Ctrl+C），通过广播通道通知关闭

use crate::error::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[cfg(unix)]
use signal_hook::consts::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook_tokio::Signals;

/// 设置信号处理器
///
/// # 参数
/// * `shutdown_tx` - 收到关闭信号时发送通知的通道
pub async fn setup_signal_handlers(shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    #[cfg(unix)]
    {
        setup_unix_signals(shutdown_tx).await
    }
    #[cfg(not(unix))]
    {
        setup_ctrl_c(shutdown_tx).await
    }
}

/// Unix/Linux系统信号处理
#[cfg(unix)]
async fn setup_unix_signals(shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    use futures::stream::StreamExt;

    let signals = Signals::new([SIGINT, SIGTERM])?;
    let handle = signals.handle();

    tokio::spawn(async move {
        let mut signals = signals;
        while let Some(signal) = signals.next().await {
            match signal {
                SIGINT => info!("接收到 SIGINT 信号，开始关闭..."),
                SIGTERM => info!("接收到 SIGTERM 信号，开始关闭..."),
                _ => {
                    warn!("接收到未处理的信号: {signal}");
                    continue;
                }
            }
            if let Err(e) = shutdown_tx.send(()) {
                error!("发送关闭信号失败: {e}");
            }
            break;
        }
        handle.close();
    });

    Ok(())
}

/// 非Unix系统使用 Ctrl+C
#[cfg(not(unix))]
async fn setup_ctrl_c(shutdown_tx: broadcast::Sender<()>) -> Result<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("接收到 Ctrl+C，开始关闭...");
                if let Err(e) = shutdown_tx.send(()) {
                    error!("发送关闭信号失败: {e}");
                }
            }
            Err(e) => error!("监听 Ctrl+C 失败: {e}"),
        }
    });
    Ok(())
}

/// 等待关闭信号
pub async fn wait_for_shutdown(mut shutdown_rx: broadcast::Receiver<()>) {
    match shutdown_rx.recv().await {
        Ok(()) => {
            info!("接收到关闭信号，开始清理资源...");
        }
        Err(e) => {
            error!("等待关闭信号时发生错误: {e}");
        }
    }
}
