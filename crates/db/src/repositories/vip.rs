//! VIP repository.

use std::sync::Arc;

use crate::entities::{VipUser, vip_user};
use sea_orm::{DatabaseConnection, EntityTrait};
use standing_common::{AppError, AppResult};

/// VIP repository for database operations.
#[derive(Clone)]
pub struct VipRepository {
    db: Arc<DatabaseConnection>,
}

impl VipRepository {
    /// Create a new VIP repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get the VIP grant for a user, if any.
    pub async fn find_by_user_id(&self, user_id: &str) -> AppResult<Option<vip_user::Model>> {
        VipUser::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user holds a VIP grant.
    pub async fn is_vip(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.find_by_user_id(user_id).await?.is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    fn create_test_grant(user_id: &str, reason: Option<&str>) -> vip_user::Model {
        vip_user::Model {
            user_id: user_id.to_string(),
            reason: reason.map(ToString::to_string),
            granted_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_is_vip() {
        let grant = create_test_grant("user1", Some("Beta tester"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[grant]])
                .into_connection(),
        );

        let repo = VipRepository::new(db);
        assert!(repo.is_vip("user1").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_not_vip() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<vip_user::Model>::new()])
                .into_connection(),
        );

        let repo = VipRepository::new(db);
        assert!(!repo.is_vip("user1").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_user_id_returns_reason() {
        let grant = create_test_grant("user1", Some("Beta tester"));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[grant]])
                .into_connection(),
        );

        let repo = VipRepository::new(db);
        let result = repo.find_by_user_id("user1").await.unwrap().unwrap();
        assert_eq!(result.reason.as_deref(), Some("Beta tester"));
    }

    #[tokio::test]
    async fn test_is_vip_database_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("timeout".to_string())])
                .into_connection(),
        );

        let repo = VipRepository::new(db);
        assert!(matches!(repo.is_vip("user1").await, Err(AppError::Database(_))));
    }
}
