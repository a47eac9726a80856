//! Services layer
//!
//! Token codec, session lifecycle and the login flow built on them.

pub mod password;
pub mod session;
pub mod token;
pub mod user;

pub use password::{hash_password, verify_password};
pub use session::{SessionManager, SessionPolicy, ValidatedSession};
pub use token::{generate_session_token, hash_session_token, TokenError};
pub use user::{IssuedSession, LoginInput, RegisterInput, UserService, UserServiceError};
