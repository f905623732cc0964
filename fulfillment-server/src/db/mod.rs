//! Database Module
//!
//! Embedded SurrealDB storage. The daemon runs on RocksDB under
//! `{work_dir}/database/`; tests use the in-memory engine.

pub mod models;
pub mod repository;

use std::path::Path;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem, RocksDb};

use crate::utils::AppError;

const NAMESPACE: &str = "blisterpost";
const DATABASE: &str = "fulfillment";

/// Open the embedded database at the given directory and apply the schema
pub async fn connect(path: &Path) -> Result<Surreal<Db>, AppError> {
    let db = Surreal::new::<RocksDb>(path)
        .await
        .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;
    select_and_init(&db).await?;
    tracing::info!(path = %path.display(), "Database connection established (SurrealDB/RocksDB)");
    Ok(db)
}

/// Open an in-memory database (tests, local experiments)
pub async fn connect_memory() -> Result<Surreal<Db>, AppError> {
    let db = Surreal::new::<Mem>(())
        .await
        .map_err(|e| AppError::database(format!("Failed to open in-memory database: {e}")))?;
    select_and_init(&db).await?;
    Ok(db)
}

async fn select_and_init(db: &Surreal<Db>) -> Result<(), AppError> {
    db.use_ns(NAMESPACE)
        .use_db(DATABASE)
        .await
        .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;
    init_schema(db).await
}

/// Schema definitions applied at startup (idempotent)
///
/// (user, period_start) 的唯一索引是重复生成的存储层保险：
/// 即使两个生成任务并发运行，同一周期也只能落库一单。
async fn init_schema(db: &Surreal<Db>) -> Result<(), AppError> {
    db.query(
        r#"
        DEFINE INDEX IF NOT EXISTS order_user_period ON TABLE blister_order FIELDS user, period_start UNIQUE;
        DEFINE INDEX IF NOT EXISTS order_number_unique ON TABLE blister_order FIELDS order_number UNIQUE;
        DEFINE INDEX IF NOT EXISTS shipment_order_unique ON TABLE shipment FIELDS order UNIQUE;
        DEFINE INDEX IF NOT EXISTS shipment_status_idx ON TABLE shipment FIELDS status;
        DEFINE INDEX IF NOT EXISTS subscription_period_end_idx ON TABLE subscription FIELDS current_period_end;
        "#,
    )
    .await
    .map_err(|e| AppError::database(format!("Failed to apply schema: {e}")))?;
    Ok(())
}
