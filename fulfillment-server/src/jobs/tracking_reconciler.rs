//! Shipment tracking reconciliation
//!
//! 水平触发轮询 + 边沿触发副作用：每轮对每个非终态 shipment 调一次
//! 运营商 API，状态整体覆盖（运营商是权威，回退也照单全收）；只有
//! "非 delivered → delivered" 这次状态迁移才触发送达通知，重复观察到
//! delivered 不会再发。
//!
//! 批内顺序处理，同一 shipment 同时至多一个写入方。

use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use crate::carrier::{CarrierTracker, TrackOutcome, TrackingResult};
use crate::db::models::{Shipment, ShipmentStatus};
use crate::db::repository::{OrderRepository, ShipmentRepository, UserRepository};
use crate::db::repository::shipment::TrackingPatch;
use crate::notify::{NotificationIntent, NotificationKind, NotificationQueue};
use crate::utils::{AppError, AppResult, Clock};

/// Polls active shipments and reconciles local state with the carrier
pub struct ShipmentReconciler {
    db: Surreal<Db>,
    carrier: Arc<dyn CarrierTracker>,
    notifications: NotificationQueue,
    /// 连续 not-found 超过该值后每轮告警（人工处理，不自动终结）
    not_found_flag_threshold: u32,
}

impl ShipmentReconciler {
    pub fn new(
        db: Surreal<Db>,
        carrier: Arc<dyn CarrierTracker>,
        notifications: NotificationQueue,
        not_found_flag_threshold: u32,
    ) -> Self {
        Self {
            db,
            carrier,
            notifications,
            not_found_flag_threshold,
        }
    }

    /// 执行一轮对账，返回本轮更新的 shipment 数
    pub async fn run(&self, clock: &dyn Clock) -> usize {
        let shipments = match ShipmentRepository::new(self.db.clone()).find_active().await {
            Ok(shipments) => shipments,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load active shipments");
                return 0;
            }
        };

        let total = shipments.len();
        let mut updated = 0;
        for shipment in shipments {
            let tracking_number = shipment.tracking_number.clone();
            match self.reconcile_shipment(shipment, clock).await {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        tracking_number = %tracking_number,
                        error = %e,
                        "Failed to reconcile shipment"
                    );
                }
            }
        }

        tracing::info!(updated = updated, polled = total, "Tracking reconciliation finished");
        updated
    }

    /// 对单个 shipment 执行一次读取-计算-写入
    async fn reconcile_shipment(&self, shipment: Shipment, clock: &dyn Clock) -> AppResult<bool> {
        let shipment_id = shipment
            .id
            .clone()
            .ok_or_else(|| AppError::internal("Shipment loaded without id"))?;

        match self.carrier.track(&shipment.tracking_number).await {
            TrackOutcome::Unavailable => {
                // 暂时性故障：保持原状，下个周期即重试
                tracing::debug!(
                    tracking_number = %shipment.tracking_number,
                    "Carrier unavailable, deferring to next cycle"
                );
                Ok(false)
            }
            TrackOutcome::NotFound => {
                let count = ShipmentRepository::new(self.db.clone())
                    .record_not_found(&shipment_id, clock.now())
                    .await?;
                if count >= self.not_found_flag_threshold {
                    tracing::warn!(
                        tracking_number = %shipment.tracking_number,
                        consecutive_misses = count,
                        "Tracking number unresolved for many cycles, flagging for manual review"
                    );
                }
                Ok(false)
            }
            TrackOutcome::Found(result) => {
                self.apply_result(&shipment, &shipment_id, result, clock)
                    .await?;
                Ok(true)
            }
        }
    }

    async fn apply_result(
        &self,
        shipment: &Shipment,
        shipment_id: &surrealdb::RecordId,
        result: TrackingResult,
        clock: &dyn Clock,
    ) -> AppResult<()> {
        // 状态迁移检测针对已持久化的旧状态，而不是本轮观察值
        let delivery_transition = result.status == ShipmentStatus::Delivered
            && shipment.status != ShipmentStatus::Delivered;

        let actual_delivery = if delivery_transition {
            Some(
                result
                    .actual_delivery
                    .or_else(|| result.events.first().map(|e| e.timestamp))
                    .unwrap_or_else(|| clock.now()),
            )
        } else {
            None
        };

        ShipmentRepository::new(self.db.clone())
            .apply_tracking(
                shipment_id,
                TrackingPatch {
                    status: result.status,
                    tracking_events: result.events.clone(),
                    estimated_delivery: result.estimated_delivery.map(|ts| ts.date_naive()),
                    actual_delivery,
                    last_tracking_update: clock.now(),
                    not_found_count: 0,
                },
            )
            .await?;

        tracing::info!(
            tracking_number = %result.tracking_number,
            status = %result.status.as_str(),
            vendor_status = %result.vendor_status_code,
            events = result.events.len(),
            "Updated shipment tracking"
        );

        if delivery_transition {
            let delivered_at = actual_delivery.unwrap_or_else(|| clock.now());
            let order_repo = OrderRepository::new(self.db.clone());
            order_repo
                .mark_delivered(&shipment.order, delivered_at)
                .await?;

            let order = order_repo
                .find_by_id(&shipment.order)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("Order {} not found", shipment.order))
                })?;
            let user = UserRepository::new(self.db.clone())
                .find_by_id(&order.user)
                .await?
                .ok_or_else(|| AppError::not_found(format!("User {} not found", order.user)))?;

            self.notifications.enqueue(NotificationIntent {
                kind: NotificationKind::DeliveryConfirmation,
                recipient: user.email.clone(),
                context: serde_json::json!({
                    "order_number": order.order_number,
                    "tracking_number": shipment.tracking_number,
                    "delivered_at": delivered_at,
                }),
            });

            tracing::info!(
                order_number = %order.order_number,
                tracking_number = %shipment.tracking_number,
                delivered_at = %delivered_at,
                "Shipment delivered"
            );
        }

        Ok(())
    }
}
