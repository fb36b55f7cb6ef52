//! Database entities of the status store.

pub mod moderation_action;
pub mod vip_user;

pub use moderation_action::Entity as ModerationAction;
pub use vip_user::Entity as VipUser;
