//! End-to-end pipeline tests against an in-memory database
//!
//! Covers order generation (idempotency, snapshots, empty medication lists)
//! and shipment reconciliation (transition-gated notification, soft failures,
//! vendor regressions) with a scripted carrier and a captured outbox.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};
use tokio::sync::mpsc;

use fulfillment_server::carrier::{CarrierTracker, TrackOutcome, TrackingResult};
use fulfillment_server::db;
use fulfillment_server::db::models::{
    Medication, Order, OrderStatus, PlanSnapshot, Shipment, ShipmentStatus, Subscription,
    SubscriptionStatus, TrackingEvent, UserProfile,
};
use fulfillment_server::db::repository::{
    MedicationRepository, OrderRepository, ShipmentRepository, SubscriptionRepository,
    UserRepository,
};
use fulfillment_server::jobs::{OrderGenerator, ShipmentReconciler, SubscriptionReminders};
use fulfillment_server::notify::{NotificationIntent, NotificationKind, NotificationQueue};
use fulfillment_server::utils::FixedClock;

// =============================================================================
// Fixtures
// =============================================================================

async fn setup() -> (
    Surreal<Db>,
    NotificationQueue,
    mpsc::Receiver<NotificationIntent>,
) {
    let db = db::connect_memory().await.expect("in-memory db");
    let (queue, rx) = NotificationQueue::channel(32);
    (db, queue, rx)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Fixed clock pinned to 06:00 Berlin time on the given day
fn berlin_clock(day: NaiveDate) -> FixedClock {
    let now = Utc.from_utc_datetime(&day.and_hms_opt(4, 0, 0).unwrap());
    FixedClock::new(now, chrono_tz::Europe::Berlin)
}

fn drain(rx: &mut mpsc::Receiver<NotificationIntent>) -> Vec<NotificationIntent> {
    let mut intents = Vec::new();
    while let Ok(intent) = rx.try_recv() {
        intents.push(intent);
    }
    intents
}

async fn create_user(db: &Surreal<Db>) -> UserProfile {
    UserRepository::new(db.clone())
        .create(UserProfile {
            id: None,
            email: "erika@example.com".to_string(),
            first_name: "Erika".to_string(),
            last_name: "Mustermann".to_string(),
            street: "Musterstraße 1".to_string(),
            postal_code: "10115".to_string(),
            city: "Berlin".to_string(),
            country: "DE".to_string(),
        })
        .await
        .expect("create user")
}

async fn create_subscription(
    db: &Surreal<Db>,
    user: &RecordId,
    period_end: NaiveDate,
    interval_days: i64,
    cancel_at_period_end: bool,
    status: SubscriptionStatus,
) -> Subscription {
    SubscriptionRepository::new(db.clone())
        .create(Subscription {
            id: None,
            user: user.clone(),
            plan: PlanSnapshot {
                name: "Monatlich".to_string(),
                slug: "monatlich".to_string(),
                interval_days,
            },
            status,
            current_period_start: period_end - chrono::Duration::days(interval_days),
            current_period_end: period_end,
            cancel_at_period_end,
        })
        .await
        .expect("create subscription")
}

async fn create_medication(
    db: &Surreal<Db>,
    user: &RecordId,
    name: &str,
    dosage: &str,
    is_active: bool,
) -> Medication {
    MedicationRepository::new(db.clone())
        .create(Medication {
            id: None,
            user: user.clone(),
            name: name.to_string(),
            dosage: dosage.to_string(),
            pzn: "04351707".to_string(),
            morning: true,
            noon: false,
            evening: true,
            night: false,
            instructions: String::new(),
            is_active,
        })
        .await
        .expect("create medication")
}

/// Order + shipment pair as fulfillment would have left them
async fn create_shipped_order(
    db: &Surreal<Db>,
    user: &RecordId,
    shipment_status: ShipmentStatus,
) -> (Order, Shipment) {
    let order = OrderRepository::new(db.clone())
        .create(Order {
            id: None,
            user: user.clone(),
            subscription: None,
            order_number: Order::generate_order_number(),
            status: OrderStatus::Shipped,
            period_start: date(2024, 6, 10),
            period_end: date(2024, 7, 8),
            shipping_name: "Erika Mustermann".to_string(),
            shipping_street: "Musterstraße 1".to_string(),
            shipping_postal_code: "10115".to_string(),
            shipping_city: "Berlin".to_string(),
            shipping_country: "DE".to_string(),
            items: vec![],
            delivered_at: None,
            created_at: Utc::now(),
        })
        .await
        .expect("create order");

    let shipment = ShipmentRepository::new(db.clone())
        .create(Shipment {
            id: None,
            order: order.id.clone().unwrap(),
            tracking_number: "00340434161094000001".to_string(),
            carrier: "DHL".to_string(),
            status: shipment_status,
            tracking_events: vec![],
            estimated_delivery: None,
            actual_delivery: None,
            last_tracking_update: None,
            not_found_count: 0,
            created_at: Utc::now(),
        })
        .await
        .expect("create shipment");

    (order, shipment)
}

async fn all_orders(db: &Surreal<Db>) -> Vec<Order> {
    db.select("blister_order").await.expect("select orders")
}

/// Carrier stub returning a scripted outcome for every call
struct ScriptedCarrier {
    outcome: Mutex<TrackOutcome>,
    calls: Mutex<u32>,
}

impl ScriptedCarrier {
    fn new(outcome: TrackOutcome) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CarrierTracker for ScriptedCarrier {
    async fn track(&self, _tracking_number: &str) -> TrackOutcome {
        *self.calls.lock().unwrap() += 1;
        self.outcome.lock().unwrap().clone()
    }
}

fn delivered_result(delivered_at: DateTime<Utc>) -> TrackingResult {
    TrackingResult {
        tracking_number: "00340434161094000001".to_string(),
        status: ShipmentStatus::Delivered,
        vendor_status_code: "delivered".to_string(),
        origin: Some("Bonn, DE".to_string()),
        destination: Some("Berlin, DE".to_string()),
        estimated_delivery: None,
        actual_delivery: Some(delivered_at),
        events: vec![TrackingEvent {
            timestamp: delivered_at,
            location: "Berlin, DE".to_string(),
            status_code: "delivered".to_string(),
            description: "Delivered to recipient".to_string(),
        }],
    }
}

// =============================================================================
// Order generation
// =============================================================================

#[tokio::test]
async fn test_generates_order_for_due_subscription() {
    let (db, queue, mut rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    create_medication(&db, &uid, "Metformin", "500mg", true).await;
    create_medication(&db, &uid, "Ramipril", "5mg", true).await;
    create_subscription(&db, &uid, date(2024, 6, 10), 28, false, SubscriptionStatus::Active).await;

    let generator = OrderGenerator::new(db.clone(), queue.clone());
    let created = generator.run(&berlin_clock(date(2024, 6, 9))).await;
    assert_eq!(created, 1);

    let orders = all_orders(&db).await;
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.period_start, date(2024, 6, 10));
    assert_eq!(order.period_end, date(2024, 7, 8));
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.order_number.starts_with("BL-"));
    assert_eq!(order.shipping_name, "Erika Mustermann");
    assert_eq!(order.shipping_street, "Musterstraße 1");
    assert_eq!(order.items.len(), 2);

    let intents = drain(&mut rx);
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].kind, NotificationKind::OrderConfirmation);
    assert_eq!(intents[0].recipient, "erika@example.com");
}

#[tokio::test]
async fn test_second_run_creates_no_duplicate_order() {
    let (db, queue, mut rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    create_medication(&db, &uid, "Metformin", "500mg", true).await;
    create_subscription(&db, &uid, date(2024, 6, 10), 28, false, SubscriptionStatus::Active).await;

    let generator = OrderGenerator::new(db.clone(), queue.clone());
    let clock = berlin_clock(date(2024, 6, 9));
    assert_eq!(generator.run(&clock).await, 1);
    assert_eq!(generator.run(&clock).await, 0);

    assert_eq!(all_orders(&db).await.len(), 1);
    // Only the first run queued a confirmation
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn test_zero_active_medications_still_generates_order() {
    let (db, queue, _rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    create_medication(&db, &uid, "Metformin", "500mg", false).await;
    create_subscription(&db, &uid, date(2024, 6, 10), 28, false, SubscriptionStatus::Active).await;

    let generator = OrderGenerator::new(db.clone(), queue.clone());
    assert_eq!(generator.run(&berlin_clock(date(2024, 6, 9))).await, 1);

    let orders = all_orders(&db).await;
    assert_eq!(orders.len(), 1);
    assert!(orders[0].items.is_empty());
}

#[tokio::test]
async fn test_order_snapshot_survives_profile_and_medication_changes() {
    let (db, queue, _rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    let medication = create_medication(&db, &uid, "Metformin", "500mg", true).await;
    create_subscription(&db, &uid, date(2024, 6, 10), 28, false, SubscriptionStatus::Active).await;

    let generator = OrderGenerator::new(db.clone(), queue.clone());
    assert_eq!(generator.run(&berlin_clock(date(2024, 6, 9))).await, 1);

    // Profile and medication change after generation
    let mut moved = user.clone();
    moved.street = "Neue Straße 2".to_string();
    moved.city = "Hamburg".to_string();
    UserRepository::new(db.clone())
        .update(&uid, moved)
        .await
        .unwrap();
    let mut adjusted = medication.clone();
    adjusted.dosage = "850mg".to_string();
    MedicationRepository::new(db.clone())
        .update(&medication.id.clone().unwrap(), adjusted)
        .await
        .unwrap();

    // The frozen order is untouched
    let orders = all_orders(&db).await;
    assert_eq!(orders[0].shipping_street, "Musterstraße 1");
    assert_eq!(orders[0].shipping_city, "Berlin");
    assert_eq!(orders[0].items[0].medication_dosage, "500mg");
}

#[tokio::test]
async fn test_subscriptions_not_due_or_not_active_are_skipped() {
    let (db, queue, mut rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    // Due two days out
    create_subscription(&db, &uid, date(2024, 6, 11), 28, false, SubscriptionStatus::Active).await;

    let other = create_user(&db).await;
    let oid = other.id.clone().unwrap();
    // Due tomorrow but paused
    create_subscription(&db, &oid, date(2024, 6, 10), 28, false, SubscriptionStatus::Paused).await;

    let generator = OrderGenerator::new(db.clone(), queue.clone());
    assert_eq!(generator.run(&berlin_clock(date(2024, 6, 9))).await, 0);
    assert!(all_orders(&db).await.is_empty());
    assert!(drain(&mut rx).is_empty());
}

// =============================================================================
// Shipment reconciliation
// =============================================================================

#[tokio::test]
async fn test_delivery_transition_updates_state_and_notifies_exactly_once() {
    let (db, queue, mut rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    let (order, shipment) = create_shipped_order(&db, &uid, ShipmentStatus::InTransit).await;

    let delivered_at = Utc.with_ymd_and_hms(2024, 6, 12, 14, 12, 0).unwrap();
    let carrier = Arc::new(ScriptedCarrier::new(TrackOutcome::Found(delivered_result(
        delivered_at,
    ))));
    let reconciler =
        ShipmentReconciler::new(db.clone(), carrier.clone(), queue.clone(), 12);
    let clock = berlin_clock(date(2024, 6, 12));

    assert_eq!(reconciler.run(&clock).await, 1);

    let shipment = ShipmentRepository::new(db.clone())
        .find_by_id(&shipment.id.clone().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Delivered);
    assert_eq!(shipment.actual_delivery, Some(delivered_at));
    assert_eq!(shipment.tracking_events.len(), 1);
    assert!(shipment.last_tracking_update.is_some());

    let order = OrderRepository::new(db.clone())
        .find_by_id(&order.id.clone().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(order.delivered_at, Some(delivered_at));

    let intents = drain(&mut rx);
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].kind, NotificationKind::DeliveryConfirmation);

    // A later cycle sees the shipment as terminal: nothing polled, no second intent
    assert_eq!(reconciler.run(&clock).await, 0);
    assert_eq!(carrier.calls(), 1);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_carrier_unavailable_leaves_shipment_unchanged() {
    let (db, queue, mut rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    let (_, shipment) = create_shipped_order(&db, &uid, ShipmentStatus::InTransit).await;

    let carrier = Arc::new(ScriptedCarrier::new(TrackOutcome::Unavailable));
    let reconciler = ShipmentReconciler::new(db.clone(), carrier, queue.clone(), 12);

    assert_eq!(reconciler.run(&berlin_clock(date(2024, 6, 12))).await, 0);

    let shipment = ShipmentRepository::new(db.clone())
        .find_by_id(&shipment.id.clone().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::InTransit);
    assert!(shipment.last_tracking_update.is_none());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_not_found_counts_consecutive_misses() {
    let (db, queue, _rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    let (_, shipment) = create_shipped_order(&db, &uid, ShipmentStatus::LabelCreated).await;

    let carrier = Arc::new(ScriptedCarrier::new(TrackOutcome::NotFound));
    let reconciler = ShipmentReconciler::new(db.clone(), carrier, queue.clone(), 2);
    let clock = berlin_clock(date(2024, 6, 12));

    assert_eq!(reconciler.run(&clock).await, 0);
    assert_eq!(reconciler.run(&clock).await, 0);

    let shipment = ShipmentRepository::new(db.clone())
        .find_by_id(&shipment.id.clone().unwrap())
        .await
        .unwrap()
        .unwrap();
    // Still in rotation, just counted (and flagged in the logs past the threshold)
    assert_eq!(shipment.status, ShipmentStatus::LabelCreated);
    assert_eq!(shipment.not_found_count, 2);
}

#[tokio::test]
async fn test_vendor_status_regression_is_accepted() {
    let (db, queue, mut rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    let (_, shipment) = create_shipped_order(&db, &uid, ShipmentStatus::OutForDelivery).await;

    let regressed = TrackingResult {
        tracking_number: shipment.tracking_number.clone(),
        status: ShipmentStatus::InTransit,
        vendor_status_code: "transit".to_string(),
        origin: None,
        destination: None,
        estimated_delivery: Some(Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap()),
        actual_delivery: None,
        events: vec![TrackingEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 12, 9, 0, 0).unwrap(),
            location: "Leipzig, DE".to_string(),
            status_code: "transit".to_string(),
            description: "Rerouted".to_string(),
        }],
    };
    let carrier = Arc::new(ScriptedCarrier::new(TrackOutcome::Found(regressed)));
    let reconciler = ShipmentReconciler::new(db.clone(), carrier, queue.clone(), 12);

    assert_eq!(reconciler.run(&berlin_clock(date(2024, 6, 12))).await, 1);

    let shipment = ShipmentRepository::new(db.clone())
        .find_by_id(&shipment.id.clone().unwrap())
        .await
        .unwrap()
        .unwrap();
    // The vendor is authoritative: the regression is stored as-is
    assert_eq!(shipment.status, ShipmentStatus::InTransit);
    assert_eq!(shipment.estimated_delivery, Some(date(2024, 6, 14)));
    assert!(shipment.actual_delivery.is_none());
    assert!(drain(&mut rx).is_empty());
}

// =============================================================================
// Subscription expiry reminders
// =============================================================================

#[tokio::test]
async fn test_expiry_reminder_for_non_renewing_subscriptions() {
    let (db, queue, mut rx) = setup().await;
    let user = create_user(&db).await;
    let uid = user.id.clone().unwrap();
    // Ends in three days, does not renew -> reminded
    create_subscription(&db, &uid, date(2024, 6, 12), 28, true, SubscriptionStatus::Active).await;

    let other = create_user(&db).await;
    let oid = other.id.clone().unwrap();
    // Ends in three days but renews -> not reminded
    create_subscription(&db, &oid, date(2024, 6, 12), 28, false, SubscriptionStatus::Active).await;

    let reminders = SubscriptionReminders::new(db.clone(), queue.clone());
    assert_eq!(reminders.run(&berlin_clock(date(2024, 6, 9))).await, 1);

    let intents = drain(&mut rx);
    assert_eq!(intents.len(), 1);
    assert_eq!(intents[0].kind, NotificationKind::SubscriptionEnding);
    assert_eq!(intents[0].recipient, "erika@example.com");
}
