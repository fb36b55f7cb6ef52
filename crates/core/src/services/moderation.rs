//! Ban lookups and ban state evaluation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use standing_common::AppResult;
use standing_db::{entities::moderation_action, repositories::ModerationRepository};

pub use standing_db::entities::moderation_action::ActionType;

/// A moderation record as read from the status store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    pub id: String,
    pub action_type: ActionType,
    pub is_active: bool,
    pub is_fake: bool,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BanRecord {
    /// Whether the record has lapsed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl From<moderation_action::Model> for BanRecord {
    fn from(model: moderation_action::Model) -> Self {
        Self {
            id: model.id,
            action_type: model.action_type,
            is_active: model.is_active,
            is_fake: model.is_fake,
            reason: model.reason,
            expires_at: model.expires_at.map(|t| t.with_timezone(&Utc)),
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

/// Source of moderation records.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// The most recently created active record of one of `kinds`.
    async fn find_latest_active_action(
        &self,
        subject_id: &str,
        kinds: &[ActionType],
    ) -> AppResult<Option<BanRecord>>;
}

#[async_trait]
impl ModerationStore for ModerationRepository {
    async fn find_latest_active_action(
        &self,
        subject_id: &str,
        kinds: &[ActionType],
    ) -> AppResult<Option<BanRecord>> {
        Ok(ModerationRepository::find_latest_active_action(self, subject_id, kinds)
            .await?
            .map(BanRecord::from))
    }
}

/// Resolved ban state. The default value is "not banned".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanStatus {
    pub is_banned: bool,
    pub is_fake_ban: bool,
    pub is_temp_ban: bool,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub action_type: Option<ActionType>,
}

impl BanStatus {
    /// Evaluate the latest record at `now`.
    ///
    /// Missing, lifted, expired or non-ban records all clear the state.
    #[must_use]
    pub fn evaluate(record: Option<&BanRecord>, now: DateTime<Utc>) -> Self {
        let Some(record) = record else {
            return Self::default();
        };
        if !record.is_active || !record.action_type.is_ban() || record.is_expired_at(now) {
            return Self::default();
        }

        Self {
            is_banned: true,
            is_fake_ban: record.is_fake,
            is_temp_ban: record.action_type == ActionType::TempBan || record.expires_at.is_some(),
            reason: record.reason.clone(),
            expires_at: record.expires_at,
            action_type: Some(record.action_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(action_type: ActionType, expires_at: Option<DateTime<Utc>>) -> BanRecord {
        BanRecord {
            id: "action1".to_string(),
            action_type,
            is_active: true,
            is_fake: false,
            reason: Some("spam".to_string()),
            expires_at,
            created_at: Utc::now() - Duration::days(2),
        }
    }

    #[test]
    fn test_no_record_is_clear() {
        assert_eq!(BanStatus::evaluate(None, Utc::now()), BanStatus::default());
    }

    #[test]
    fn test_temp_ban_in_future() {
        let now = Utc::now();
        let expires_at = now + Duration::hours(1);
        let status = BanStatus::evaluate(Some(&record(ActionType::TempBan, Some(expires_at))), now);

        assert!(status.is_banned);
        assert!(status.is_temp_ban);
        assert!(!status.is_fake_ban);
        assert_eq!(status.reason.as_deref(), Some("spam"));
        assert_eq!(status.expires_at, Some(expires_at));
        assert_eq!(status.action_type, Some(ActionType::TempBan));
    }

    #[test]
    fn test_expired_ban_is_clear() {
        let now = Utc::now();
        let status = BanStatus::evaluate(
            Some(&record(ActionType::Ban, Some(now - Duration::days(1)))),
            now,
        );
        assert_eq!(status, BanStatus::default());
    }

    #[test]
    fn test_expired_ban_is_clear_for_every_kind() {
        let now = Utc::now();
        for kind in ActionType::BAN_KINDS {
            let status = BanStatus::evaluate(
                Some(&record(kind, Some(now - Duration::seconds(1)))),
                now,
            );
            assert!(!status.is_banned, "{kind:?} should have expired");
        }
    }

    #[test]
    fn test_any_expiry_makes_ban_temporary() {
        let now = Utc::now();
        let status = BanStatus::evaluate(
            Some(&record(ActionType::PermBan, Some(now + Duration::days(7)))),
            now,
        );
        assert!(status.is_banned);
        assert!(status.is_temp_ban);
    }

    #[test]
    fn test_indefinite_ban_is_not_temporary() {
        let status = BanStatus::evaluate(Some(&record(ActionType::Ban, None)), Utc::now());
        assert!(status.is_banned);
        assert!(!status.is_temp_ban);
        assert!(status.expires_at.is_none());
    }

    #[test]
    fn test_temp_ban_kind_without_expiry_is_temporary() {
        let status = BanStatus::evaluate(Some(&record(ActionType::TempBan, None)), Utc::now());
        assert!(status.is_temp_ban);
    }

    #[test]
    fn test_fake_ban() {
        let mut fake = record(ActionType::Ban, None);
        fake.is_fake = true;

        let status = BanStatus::evaluate(Some(&fake), Utc::now());
        assert!(status.is_banned);
        assert!(status.is_fake_ban);
    }

    #[test]
    fn test_lifted_record_is_clear() {
        let mut lifted = record(ActionType::Ban, None);
        lifted.is_active = false;
        assert!(!BanStatus::evaluate(Some(&lifted), Utc::now()).is_banned);
    }

    #[test]
    fn test_non_ban_kind_is_clear() {
        let warning = record(ActionType::Warning, None);
        assert!(!BanStatus::evaluate(Some(&warning), Utc::now()).is_banned);
    }

    #[test]
    fn test_from_model_converts_timestamps() {
        let created_at = Utc::now();
        let model = moderation_action::Model {
            id: "action1".to_string(),
            user_id: "user1".to_string(),
            action_type: ActionType::Ban,
            is_active: true,
            is_fake: true,
            reason: None,
            expires_at: None,
            created_at: created_at.into(),
        };

        let record = BanRecord::from(model);
        assert_eq!(record.created_at, created_at);
        assert!(record.is_fake);
        assert!(record.expires_at.is_none());
    }
}
