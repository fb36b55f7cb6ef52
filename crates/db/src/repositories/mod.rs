//! Repositories over the status store.

pub mod moderation;
pub mod vip;

pub use moderation::ModerationRepository;
pub use vip::VipRepository;
