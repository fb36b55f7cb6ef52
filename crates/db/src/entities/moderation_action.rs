//! Moderation action entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of moderation action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    #[sea_orm(string_value = "ban")]
    Ban,
    #[sea_orm(string_value = "temp_ban")]
    TempBan,
    #[sea_orm(string_value = "perm_ban")]
    PermBan,
    #[sea_orm(string_value = "warning")]
    Warning,
    #[sea_orm(string_value = "mute")]
    Mute,
}

impl ActionType {
    /// Action kinds that restrict access to the product.
    pub const BAN_KINDS: [Self; 3] = [Self::Ban, Self::TempBan, Self::PermBan];

    /// Whether this action is one of the ban kinds.
    #[must_use]
    pub fn is_ban(self) -> bool {
        Self::BAN_KINDS.contains(&self)
    }
}

/// Moderation action model.
///
/// Rows are soft-deleted through `is_active` and never removed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "moderation_action")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// The subject the action applies to.
    pub user_id: String,
    /// Kind of action.
    pub action_type: ActionType,
    /// Cleared when a moderator lifts the action.
    pub is_active: bool,
    /// Decoy ban: shown like a real one but not enforced.
    pub is_fake: bool,
    /// Reason shown to the subject.
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    /// When the action lapses (None = indefinite).
    pub expires_at: Option<DateTimeWithTimeZone>,
    /// When the action was issued.
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
