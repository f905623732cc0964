//! Medication Repository
//!
//! Read-only access to the per-user medication list.

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::Medication;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

const TABLE: &str = "medication";

#[derive(Clone)]
pub struct MedicationRepository {
    base: BaseRepository,
}

impl MedicationRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Currently active medications for a user, ordered by name
    pub async fn find_active_for_user(&self, user: &RecordId) -> RepoResult<Vec<Medication>> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT * FROM medication \
                 WHERE user = $user AND is_active = true \
                 ORDER BY name",
            )
            // RecordId 字段落库为 "table:id" 字符串，按字符串比较
            .bind(("user", user.to_string()))
            .await?;
        let medications: Vec<Medication> = result.take(0)?;
        Ok(medications)
    }

    /// Insert a medication (test fixtures; production rows are owned by the care side)
    pub async fn create(&self, medication: Medication) -> RepoResult<Medication> {
        let created: Option<Medication> =
            self.base.db().create(TABLE).content(medication).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create medication".to_string()))
    }

    /// Overwrite a medication (test fixtures for snapshot-immutability checks)
    pub async fn update(&self, id: &RecordId, mut medication: Medication) -> RepoResult<()> {
        // id lives on the record, not in its content
        medication.id = None;
        let _: Option<Medication> = self.base.db().update(id.clone()).content(medication).await?;
        Ok(())
    }
}
