//! Session identity.
//!
//! The reconciler only needs two things from authentication: who is signed
//! in right now, and a feed of session transitions. [`IdentityProvider`]
//! captures that contract; [`SessionIdentity`] implements it for a session
//! held in-process and authenticated with HS256 access tokens.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use standing_common::{AppError, AppResult};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

/// Capacity of the auth event channel.
const AUTH_EVENT_CAPACITY: usize = 16;

/// The authenticated entity whose status is checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
}

impl Subject {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Session transition observed from the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    TokenRefreshed,
    SignedOut,
}

/// Source of the current session identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the current subject. `Ok(None)` means nobody is signed in.
    async fn current_subject(&self) -> AppResult<Option<Subject>>;

    /// Subscribe to session transitions. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Claims read from an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject id.
    pub sub: String,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// In-process session backed by a verified access token.
pub struct SessionIdentity {
    decoding_key: DecodingKey,
    validation: Validation,
    token: RwLock<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionIdentity {
    /// Create a signed-out session verifying tokens with `secret`.
    #[must_use]
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.validate_aud = false;

        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token: RwLock::new(None),
            events,
        }
    }

    fn verify(&self, token: &str) -> AppResult<Subject> {
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(Subject::new(data.claims.sub))
    }

    fn emit(&self, event: AuthEvent) {
        // No receivers just means nothing is polling yet.
        if self.events.send(event).is_err() {
            debug!(?event, "No auth event subscribers");
        }
    }

    /// Start a session with `token`.
    pub async fn sign_in(&self, token: String) -> AppResult<Subject> {
        let subject = self.verify(&token)?;
        *self.token.write().await = Some(token);

        info!(subject_id = %subject.id, "Signed in");
        self.emit(AuthEvent::SignedIn);
        Ok(subject)
    }

    /// Replace the current session's token. The subject must not change.
    pub async fn refresh(&self, token: String) -> AppResult<Subject> {
        let subject = self.verify(&token)?;

        let mut current = self.token.write().await;
        let Some(previous) = current.as_deref() else {
            return Err(AppError::Unauthorized);
        };
        // An expired previous token is fine here; only its subject matters.
        let mut lenient = self.validation.clone();
        lenient.validate_exp = false;
        let previous_sub =
            jsonwebtoken::decode::<AccessClaims>(previous, &self.decoding_key, &lenient)?
                .claims
                .sub;
        if previous_sub != subject.id {
            return Err(AppError::BadRequest(
                "Refreshed token belongs to a different subject".to_string(),
            ));
        }
        *current = Some(token);
        drop(current);

        debug!(subject_id = %subject.id, "Session token refreshed");
        self.emit(AuthEvent::TokenRefreshed);
        Ok(subject)
    }

    /// End the session.
    pub async fn sign_out(&self) {
        let previous = self.token.write().await.take();
        if previous.is_some() {
            info!("Signed out");
        }
        self.emit(AuthEvent::SignedOut);
    }
}

#[async_trait]
impl IdentityProvider for SessionIdentity {
    async fn current_subject(&self) -> AppResult<Option<Subject>> {
        let token = self.token.read().await;
        token.as_deref().map(|t| self.verify(t)).transpose()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token_for(sub: &str, expires_in_secs: i64, secret: &str) -> String {
        let claims = AccessClaims {
            sub: sub.to_string(),
            exp: chrono::Utc::now().timestamp() + expires_in_secs,
            role: Some("authenticated".to_string()),
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_signed_out_by_default() {
        let identity = SessionIdentity::new(SECRET, 0);
        assert!(identity.current_subject().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let identity = SessionIdentity::new(SECRET, 0);
        let mut events = identity.subscribe();

        let subject = identity
            .sign_in(token_for("user1", 3600, SECRET))
            .await
            .unwrap();
        assert_eq!(subject, Subject::new("user1"));
        assert_eq!(
            identity.current_subject().await.unwrap(),
            Some(Subject::new("user1"))
        );
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn);

        identity.sign_out().await;
        assert!(identity.current_subject().await.unwrap().is_none());
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
    }

    #[tokio::test]
    async fn test_sign_in_rejects_bad_signature() {
        let identity = SessionIdentity::new(SECRET, 0);
        let result = identity.sign_in(token_for("user1", 3600, "other")).await;

        assert!(matches!(result, Err(AppError::Unauthorized)));
        assert!(identity.current_subject().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_rejects_expired_token() {
        let identity = SessionIdentity::new(SECRET, 0);
        let result = identity.sign_in(token_for("user1", -3600, SECRET)).await;

        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_refresh_emits_event() {
        let identity = SessionIdentity::new(SECRET, 0);
        identity
            .sign_in(token_for("user1", 3600, SECRET))
            .await
            .unwrap();
        let mut events = identity.subscribe();

        identity
            .refresh(token_for("user1", 7200, SECRET))
            .await
            .unwrap();
        assert_eq!(events.recv().await.unwrap(), AuthEvent::TokenRefreshed);
    }

    #[tokio::test]
    async fn test_refresh_requires_session() {
        let identity = SessionIdentity::new(SECRET, 0);
        let result = identity.refresh(token_for("user1", 3600, SECRET)).await;

        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_subject_change() {
        let identity = SessionIdentity::new(SECRET, 0);
        identity
            .sign_in(token_for("user1", 3600, SECRET))
            .await
            .unwrap();

        let result = identity.refresh(token_for("user2", 3600, SECRET)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(
            identity.current_subject().await.unwrap(),
            Some(Subject::new("user1"))
        );
    }
}
