//! User Repository
//!
//! Read-only access to the profile store maintained by the accounts subsystem.

use super::{BaseRepository, RepoResult};
use crate::db::models::UserProfile;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

#[derive(Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find a user profile by record id
    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<UserProfile>> {
        let user: Option<UserProfile> = self.base.db().select(id.clone()).await?;
        Ok(user)
    }

    /// Insert a profile (test fixtures; production profiles are owned by accounts)
    pub async fn create(&self, user: UserProfile) -> RepoResult<UserProfile> {
        let created: Option<UserProfile> = self.base.db().create("user").content(user).await?;
        created.ok_or_else(|| super::RepoError::Database("Failed to create user".to_string()))
    }

    /// Overwrite profile fields (test fixtures for snapshot-immutability checks)
    pub async fn update(&self, id: &RecordId, mut user: UserProfile) -> RepoResult<()> {
        // id lives on the record, not in its content
        user.id = None;
        let _: Option<UserProfile> = self.base.db().update(id.clone()).content(user).await?;
        Ok(())
    }
}
