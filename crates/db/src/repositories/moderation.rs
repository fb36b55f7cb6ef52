//! Moderation repository for ban lookups.

use std::sync::Arc;

use crate::entities::{
    ModerationAction,
    moderation_action::{self, ActionType},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use standing_common::{AppError, AppResult};

/// Moderation repository for database operations.
#[derive(Clone)]
pub struct ModerationRepository {
    db: Arc<DatabaseConnection>,
}

impl ModerationRepository {
    /// Create a new moderation repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get the most recently created active action of the given kinds.
    ///
    /// Expiry is not filtered here; callers decide what an expired row means.
    pub async fn find_latest_active_action(
        &self,
        user_id: &str,
        kinds: &[ActionType],
    ) -> AppResult<Option<moderation_action::Model>> {
        if kinds.is_empty() {
            return Ok(None);
        }

        ModerationAction::find()
            .filter(moderation_action::Column::UserId.eq(user_id))
            .filter(moderation_action::Column::IsActive.eq(true))
            .filter(moderation_action::Column::ActionType.is_in(kinds.iter().copied()))
            .order_by_desc(moderation_action::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
