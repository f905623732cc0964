//! Outbound Notification Intents
//!
//! 工作流只负责把意图塞进出站队列（fire-and-forget），渲染和投递由
//! 外部通知分发器完成。入队失败只告警，绝不反过来让订单创建回滚。

pub mod transport;
pub mod worker;

pub use transport::{HttpNotifyTransport, NotificationTransport};
pub use worker::NotificationWorker;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Intent type tag — the dispatcher selects template and channel from this
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderConfirmation,
    DeliveryConfirmation,
    SubscriptionEnding,
}

/// One outbound message intent
///
/// `context` carries whatever the dispatcher needs to render independently
/// (order number, tracking number, period dates, …).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub kind: NotificationKind,
    /// Recipient identity (email)
    pub recipient: String,
    pub context: serde_json::Value,
}

/// Cloneable enqueue handle over the bounded outbox channel
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<NotificationIntent>,
}

impl NotificationQueue {
    /// Create the queue and the receiver end for the delivery worker
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationIntent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Fire-and-forget enqueue; a full or closed queue is logged, not returned
    pub fn enqueue(&self, intent: NotificationIntent) {
        if let Err(e) = self.tx.try_send(intent) {
            tracing::warn!(error = %e, "Failed to enqueue notification intent");
        }
    }
}
