//! VIP grant entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// VIP grant model. A row present means the user is VIP.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vip_user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Human-readable reason for the grant.
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    /// When the grant was made.
    pub granted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
