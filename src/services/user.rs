//! User service
//!
//! Registration, login and logout on top of the session manager:
//! - `register` stores a user with an Argon2id password hash
//! - `login` checks credentials, mints a token and opens a session for it
//! - `logout` invalidates the session behind a token

use crate::db::repositories::UserRepository;
use crate::db::StoreError;
use crate::models::{Session, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::session::SessionManager;
use crate::services::token::{generate_session_token, TokenError};
use anyhow::Context;
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// User already exists
    #[error("User already exists: {0}")]
    UserExists(String),

    /// Session store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No entropy for a new token
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A freshly opened session and the raw token that unlocks it.
///
/// The token exists only here and in the client's cookie.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session: Session,
}

/// User service for registration and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    sessions: Arc<SessionManager>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, sessions: Arc<SessionManager>) -> Self {
        Self {
            user_repo,
            sessions,
        }
    }

    /// Register a new user
    ///
    /// # Errors
    ///
    /// - `UserExists` if the username or email is taken
    /// - `Store` for database errors
    /// - `InternalError` if hashing fails
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        if self.user_repo.get_by_username(&input.username).await?.is_some() {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }

        if self.user_repo.get_by_email(&input.email).await?.is_some() {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = User::new(input.username, input.email, password_hash);

        // Lost a race with a concurrent registration
        let created = match self.user_repo.create(&user).await {
            Ok(created) => created,
            Err(StoreError::Conflict(_)) => {
                return Err(UserServiceError::UserExists(format!(
                    "Username '{}' or email '{}' is already taken",
                    user.username, user.email
                )));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    /// Log in with a username or email and a password.
    ///
    /// Unknown users and wrong passwords fail with the same
    /// `AuthenticationError`.
    pub async fn login(&self, input: LoginInput) -> Result<IssuedSession, UserServiceError> {
        let user = match self.find_user_by_username_or_email(&input.username_or_email).await? {
            Some(user) => user,
            None => {
                tracing::debug!("Login failed: unknown user");
                return Err(UserServiceError::AuthenticationError(
                    INVALID_CREDENTIALS.to_string(),
                ));
            }
        };

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::debug!(user_id = user.id, "Login failed: wrong password");
            return Err(UserServiceError::AuthenticationError(
                INVALID_CREDENTIALS.to_string(),
            ));
        }

        let token = generate_session_token()?;
        let session = self.sessions.create_session(&token, user.id).await?;

        tracing::info!(user_id = user.id, session_id = %session.id, "User logged in");
        Ok(IssuedSession { token, session })
    }

    /// Log out the session behind `token`. Unknown tokens are accepted.
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.sessions.invalidate_session(token).await?;
        Ok(())
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        if let Some(user) = self.user_repo.get_by_username(username_or_email).await? {
            return Ok(Some(user));
        }
        Ok(self.user_repo.get_by_email(username_or_email).await?)
    }
}

/// Input for user registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterInput {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::token::hash_session_token;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    async fn setup_test_service() -> (UserService, Arc<SessionManager>) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let sessions = Arc::new(SessionManager::new(SqlxSessionRepository::boxed(
            pool.clone(),
        )));
        let service = UserService::new(SqlxUserRepository::boxed(pool), sessions.clone());

        (service, sessions)
    }

    // ========================================================================
    // Registration tests
    // ========================================================================

    #[tokio::test]
    async fn test_register_hashes_password() {
        let (service, _) = setup_test_service().await;

        let user = service
            .register(RegisterInput::new("agent", "agent@example.com", "password123"))
            .await
            .expect("Failed to register");

        assert!(user.id > 0);
        assert_eq!(user.username, "agent");
        assert_ne!(user.password_hash, "password123");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_duplicate_username_fails() {
        let (service, _) = setup_test_service().await;
        service
            .register(RegisterInput::new("agent", "a@example.com", "password123"))
            .await
            .unwrap();

        let result = service
            .register(RegisterInput::new("agent", "b@example.com", "password123"))
            .await;

        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_fails() {
        let (service, _) = setup_test_service().await;
        service
            .register(RegisterInput::new("first", "same@example.com", "password123"))
            .await
            .unwrap();

        let result = service
            .register(RegisterInput::new("second", "same@example.com", "password123"))
            .await;

        assert!(matches!(result, Err(UserServiceError::UserExists(_))));
    }

    // ========================================================================
    // Login tests
    // ========================================================================

    #[tokio::test]
    async fn test_login_with_username_issues_valid_token() {
        let (service, sessions) = setup_test_service().await;
        let user = service
            .register(RegisterInput::new("agent", "agent@example.com", "password123"))
            .await
            .unwrap();

        let issued = service
            .login(LoginInput::new("agent", "password123"))
            .await
            .expect("Login should succeed");

        assert_eq!(issued.session.user_id, user.id);
        assert_eq!(issued.session.id, hash_session_token(&issued.token));

        let validated = sessions
            .validate_session_token(&issued.token)
            .await
            .unwrap()
            .expect("Issued token should validate");
        assert_eq!(validated.user.id, user.id);
    }

    #[tokio::test]
    async fn test_login_with_email() {
        let (service, _) = setup_test_service().await;
        service
            .register(RegisterInput::new("agent", "agent@example.com", "password123"))
            .await
            .unwrap();

        let issued = service
            .login(LoginInput::new("agent@example.com", "password123"))
            .await;

        assert!(issued.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_fail_alike() {
        let (service, _) = setup_test_service().await;
        service
            .register(RegisterInput::new("agent", "agent@example.com", "password123"))
            .await
            .unwrap();

        let wrong_password = service
            .login(LoginInput::new("agent", "wrong"))
            .await
            .unwrap_err();
        let unknown_user = service
            .login(LoginInput::new("nobody", "password123"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, UserServiceError::AuthenticationError(_)));
        assert!(matches!(unknown_user, UserServiceError::AuthenticationError(_)));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_each_login_gets_its_own_session() {
        let (service, sessions) = setup_test_service().await;
        service
            .register(RegisterInput::new("agent", "agent@example.com", "password123"))
            .await
            .unwrap();

        let first = service.login(LoginInput::new("agent", "password123")).await.unwrap();
        let second = service.login(LoginInput::new("agent", "password123")).await.unwrap();

        assert_ne!(first.token, second.token);
        assert!(sessions.validate_session_token(&first.token).await.unwrap().is_some());
        assert!(sessions.validate_session_token(&second.token).await.unwrap().is_some());
    }

    // ========================================================================
    // Logout tests
    // ========================================================================

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let (service, sessions) = setup_test_service().await;
        service
            .register(RegisterInput::new("agent", "agent@example.com", "password123"))
            .await
            .unwrap();
        let issued = service.login(LoginInput::new("agent", "password123")).await.unwrap();

        service.logout(&issued.token).await.expect("Logout should succeed");

        assert!(sessions.validate_session_token(&issued.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_unknown_token_succeeds() {
        let (service, _) = setup_test_service().await;
        service.logout("never-issued").await.expect("Logout should succeed");
    }

    // ========================================================================
    // Property tests
    // ========================================================================

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        /// Any registered credentials log in to a token that validates back to
        /// the same user without exposing the password hash.
        #[test]
        fn login_round_trip(
            username in "[a-z]{3,10}",
            password in "[a-zA-Z0-9!@#$%^&*]{8,20}"
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result: Result<(), TestCaseError> = rt.block_on(async {
                let (service, sessions) = setup_test_service().await;
                let suffix = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
                let username = format!("{}_{}", username, suffix);
                let email = format!("{}@example.com", username);

                let registered = service
                    .register(RegisterInput::new(username.clone(), email, password.clone()))
                    .await
                    .expect("Registration should succeed");
                let issued = service
                    .login(LoginInput::new(username, password.clone()))
                    .await
                    .expect("Login should succeed");

                let validated = sessions
                    .validate_session_token(&issued.token)
                    .await
                    .expect("Validation should not error")
                    .expect("Session should be valid");

                prop_assert_eq!(validated.user.id, registered.id);
                let json = serde_json::to_string(&validated.user).unwrap();
                prop_assert!(!json.contains(&registered.password_hash));
                Ok(())
            });
            result?;
        }
    }
}
