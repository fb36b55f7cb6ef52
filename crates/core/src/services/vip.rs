//! VIP lookups.

use async_trait::async_trait;
use standing_common::AppResult;
use standing_db::repositories::VipRepository;

/// Reason attached to a VIP grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipReason {
    pub reason: Option<String>,
}

/// Source of VIP grants.
#[async_trait]
pub trait VipStore: Send + Sync {
    /// Whether the subject currently holds a VIP grant.
    async fn is_vip(&self, subject_id: &str) -> AppResult<bool>;

    /// The reason record of the subject's grant, if one exists.
    async fn vip_reason(&self, subject_id: &str) -> AppResult<Option<VipReason>>;
}

#[async_trait]
impl VipStore for VipRepository {
    async fn is_vip(&self, subject_id: &str) -> AppResult<bool> {
        VipRepository::is_vip(self, subject_id).await
    }

    async fn vip_reason(&self, subject_id: &str) -> AppResult<Option<VipReason>> {
        Ok(self
            .find_by_user_id(subject_id)
            .await?
            .map(|grant| VipReason {
                reason: grant.reason,
            }))
    }
}
