//! Notification delivery worker
//!
//! 从出站队列取意图，投递到外部分发器，失败按线性退避重试。
//! 重试只发生在这里 — 工作流一侧永远不等待投递结果。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{NotificationIntent, NotificationTransport};

/// Drains the outbox and delivers intents with retry
pub struct NotificationWorker {
    rx: mpsc::Receiver<NotificationIntent>,
    transport: Arc<dyn NotificationTransport>,
    /// 第 n 次失败后等待 retry_base * n
    retry_base: Duration,
    max_attempts: u32,
}

impl NotificationWorker {
    pub fn new(
        rx: mpsc::Receiver<NotificationIntent>,
        transport: Arc<dyn NotificationTransport>,
        retry_base: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            rx,
            transport,
            retry_base,
            max_attempts,
        }
    }

    /// 运行工作者（阻塞直到通道关闭或收到 shutdown 信号）
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Notification worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification worker received shutdown signal");
                    break;
                }
                intent = self.rx.recv() => {
                    let Some(intent) = intent else {
                        tracing::info!("Notification channel closed, worker stopping");
                        break;
                    };
                    self.deliver_with_retry(intent, &shutdown).await;
                }
            }
        }
    }

    async fn deliver_with_retry(&self, intent: NotificationIntent, shutdown: &CancellationToken) {
        for attempt in 1..=self.max_attempts {
            match self.transport.deliver(&intent).await {
                Ok(()) => {
                    tracing::info!(
                        kind = ?intent.kind,
                        recipient = %intent.recipient,
                        "Notification intent dispatched"
                    );
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.retry_base * attempt;
                    tracing::warn!(
                        kind = ?intent.kind,
                        recipient = %intent.recipient,
                        attempt = attempt,
                        error = %e,
                        "Notification dispatch failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = shutdown.cancelled() => return,
                    }
                }
                Err(e) => {
                    tracing::error!(
                        kind = ?intent.kind,
                        recipient = %intent.recipient,
                        attempts = self.max_attempts,
                        error = %e,
                        "Notification dispatch failed permanently"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationKind, NotificationQueue};
    use crate::utils::AppError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Transport that fails a configured number of times, then succeeds
    struct FlakyTransport {
        failures: AtomicU32,
        delivered: Mutex<Vec<NotificationIntent>>,
    }

    impl FlakyTransport {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl NotificationTransport for FlakyTransport {
        async fn deliver(&self, intent: &NotificationIntent) -> Result<(), AppError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::external("dispatcher unavailable"));
            }
            self.delivered.lock().unwrap().push(intent.clone());
            Ok(())
        }
    }

    fn intent() -> NotificationIntent {
        NotificationIntent {
            kind: NotificationKind::OrderConfirmation,
            recipient: "user@example.com".to_string(),
            context: serde_json::json!({ "order_number": "BL-00000001" }),
        }
    }

    #[tokio::test]
    async fn test_retries_then_delivers_once() {
        let (queue, rx) = NotificationQueue::channel(8);
        let transport = Arc::new(FlakyTransport::new(2));
        let worker =
            NotificationWorker::new(rx, transport.clone(), Duration::from_millis(1), 3);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        queue.enqueue(intent());
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let delivered = transport.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipient, "user@example.com");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (queue, rx) = NotificationQueue::channel(8);
        let transport = Arc::new(FlakyTransport::new(10));
        let worker =
            NotificationWorker::new(rx, transport.clone(), Duration::from_millis(1), 3);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        queue.enqueue(intent());
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(transport.delivered.lock().unwrap().is_empty());
        // 3 attempts consumed exactly 3 of the 10 configured failures
        assert_eq!(transport.failures.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_enqueue_on_full_queue_does_not_panic() {
        let (queue, _rx) = NotificationQueue::channel(1);
        queue.enqueue(intent());
        // Queue is full now; the second enqueue is dropped with a warning
        queue.enqueue(intent());
    }
}
