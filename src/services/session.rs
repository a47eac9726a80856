//! Session manager
//!
//! Issues, validates, renews and invalidates sessions. A presented token is
//! in one of four states:
//!
//! - absent: no row for its hash
//! - expired: `now >= expires_at`; the row is deleted and the token reads as absent
//! - near expiry: inside the renewal window; `expires_at` is pushed to
//!   `now + duration` and the renewed session is returned
//! - fresh: returned unchanged
//!
//! Absent and expired are reported identically (`Ok(None)`). Store failures
//! propagate untouched as `StoreError`.

use crate::config::{ConfigError, SessionConfig, MAX_SESSION_DAYS};
use crate::db::repositories::SessionRepository;
use crate::db::{StoreError, StoreResult};
use crate::models::{PublicUser, Session};
use crate::services::token::hash_session_token;
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::sync::Arc;

/// Lifetime and renewal window of sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    duration: Duration,
    renewal_threshold: Duration,
}

impl SessionPolicy {
    /// Build a policy, rejecting windows that would renew fresh sessions.
    pub fn new(duration: Duration, renewal_threshold: Duration) -> Result<Self, ConfigError> {
        if duration <= Duration::zero() || renewal_threshold <= Duration::zero() {
            return Err(ConfigError::ValidationError(
                "session duration and renewal threshold must be positive".to_string(),
            ));
        }
        if duration > Duration::days(MAX_SESSION_DAYS) {
            return Err(ConfigError::ValidationError(format!(
                "session duration ({}s) exceeds {} days",
                duration.num_seconds(),
                MAX_SESSION_DAYS
            )));
        }
        if renewal_threshold >= duration {
            return Err(ConfigError::ValidationError(format!(
                "renewal threshold ({}s) must be less than session duration ({}s)",
                renewal_threshold.num_seconds(),
                duration.num_seconds()
            )));
        }

        Ok(Self {
            duration,
            renewal_threshold,
        })
    }

    /// Build a policy from the `session` config section
    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        let days = |value: i64, field: &str| {
            Duration::try_days(value).ok_or_else(|| {
                ConfigError::ValidationError(format!("session.{} out of range: {}", field, value))
            })
        };

        Self::new(
            days(config.duration_days, "duration_days")?,
            days(config.renewal_threshold_days, "renewal_threshold_days")?,
        )
    }

    /// Expiry of a session issued or renewed at `now`.
    ///
    /// Truncated to whole microseconds, the finest precision either backend
    /// stores, so the returned value matches the persisted row.
    fn expiry_from(&self, now: DateTime<Utc>) -> StoreResult<DateTime<Utc>> {
        now.checked_add_signed(self.duration)
            .and_then(|at| at.duration_trunc(Duration::microseconds(1)).ok())
            .ok_or_else(|| {
                StoreError::Unavailable(anyhow::anyhow!(
                    "session expiry out of range for {}",
                    now
                ))
            })
    }

    /// Total lifetime of a session
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time before expiry in which validation renews the session
    pub fn renewal_threshold(&self) -> Duration {
        self.renewal_threshold
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            duration: Duration::days(30),
            renewal_threshold: Duration::days(15),
        }
    }
}

/// A session that passed validation, with its owner's public profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSession {
    pub session: Session,
    pub user: PublicUser,
}

/// Session manager backed by a [`SessionRepository`]
pub struct SessionManager {
    repo: Arc<dyn SessionRepository>,
    policy: SessionPolicy,
}

impl SessionManager {
    /// Create a session manager with the default policy (30 days, renew within 15)
    pub fn new(repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_policy(repo, SessionPolicy::default())
    }

    /// Create a session manager with a custom policy
    pub fn with_policy(repo: Arc<dyn SessionRepository>, policy: SessionPolicy) -> Self {
        Self { repo, policy }
    }

    /// The policy in effect
    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Create and persist a session for `token`.
    ///
    /// The token should come from `generate_session_token()`. Only its hash is
    /// stored.
    ///
    /// # Errors
    ///
    /// - `StoreError::Conflict` if a session with the same hash exists
    /// - `StoreError::Unavailable` for database errors, or if `now + duration`
    ///   is not representable
    pub async fn create_session(&self, token: &str, user_id: i64) -> StoreResult<Session> {
        self.create_session_at(token, user_id, Utc::now()).await
    }

    /// [`create_session`](Self::create_session) as of `now`
    pub async fn create_session_at(
        &self,
        token: &str,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Session> {
        let session = Session {
            id: hash_session_token(token),
            user_id,
            expires_at: self.policy.expiry_from(now)?,
        };

        if let Err(e) = self.repo.insert(&session).await {
            if e.is_conflict() {
                tracing::warn!(
                    session_id = %session.id,
                    user_id,
                    "Session id collision on insert; token generated twice?"
                );
            }
            return Err(e);
        }

        tracing::debug!(session_id = %session.id, user_id, "Session created");
        Ok(session)
    }

    /// Validate a session token.
    ///
    /// Returns `None` when no session exists for the token or it has expired
    /// (an expired session is deleted on the way out). Sessions inside the
    /// renewal window are extended and returned with the new expiry.
    ///
    /// # Errors
    ///
    /// - `StoreError::Unavailable` for database errors
    pub async fn validate_session_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<ValidatedSession>> {
        self.validate_session_token_at(token, Utc::now()).await
    }

    /// [`validate_session_token`](Self::validate_session_token) as of `now`
    pub async fn validate_session_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ValidatedSession>> {
        let session_id = hash_session_token(token);

        let (mut session, user) = match self.repo.find_by_id_with_user(&session_id).await? {
            Some(found) => found,
            None => return Ok(None),
        };

        if session.is_expired_at(now) {
            self.repo.delete_by_id(&session.id).await?;
            tracing::debug!(session_id = %session.id, "Expired session removed");
            return Ok(None);
        }

        if session.needs_renewal_at(now, self.policy.renewal_threshold) {
            let expires_at = self.policy.expiry_from(now)?;
            self.repo.update_expiry(&session.id, expires_at).await?;
            session.expires_at = expires_at;
            tracing::debug!(
                session_id = %session.id,
                expires_at = %expires_at,
                "Session renewed"
            );
        }

        Ok(Some(ValidatedSession {
            session,
            user: user.into_public(),
        }))
    }

    /// Invalidate the session for `token`. Invalidating an unknown token succeeds.
    pub async fn invalidate_session(&self, token: &str) -> StoreResult<()> {
        let session_id = hash_session_token(token);
        self.repo.delete_by_id(&session_id).await?;
        tracing::debug!(session_id = %session_id, "Session invalidated");
        Ok(())
    }

    /// Delete every expired session.
    ///
    /// Validation already removes expired sessions it runs into; this is only
    /// for reclaiming rows of tokens that are never presented again.
    pub async fn purge_expired_sessions(&self) -> StoreResult<u64> {
        self.purge_expired_sessions_at(Utc::now()).await
    }

    /// [`purge_expired_sessions`](Self::purge_expired_sessions) as of `now`
    pub async fn purge_expired_sessions_at(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let removed = self.repo.delete_expired(now).await?;
        if removed > 0 {
            tracing::info!("Purged {} expired session(s)", removed);
        }
        Ok(removed)
    }
}
