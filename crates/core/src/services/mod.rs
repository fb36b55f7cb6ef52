//! Business logic services.

pub mod identity;
pub mod marker;
pub mod moderation;
pub mod poller;
pub mod status;
pub mod vip;

pub use identity::{AccessClaims, AuthEvent, IdentityProvider, SessionIdentity, Subject};
pub use marker::{FileMarkerStore, MarkerStore, MemoryMarkerStore, welcome_seen_key};
pub use moderation::{ActionType, BanRecord, BanStatus, ModerationStore};
pub use poller::StatusPoller;
pub use status::{StatusCollaborators, StatusService, StatusState};
pub use vip::{VipReason, VipStore};
