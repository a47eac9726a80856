//! API layer
//!
//! HTTP-facing pieces of session authentication: the session cookie binding
//! and the axum middleware/extractor built on it.

pub mod cookie;
pub mod middleware;

pub use cookie::{CookieBinder, CookieInstruction, SessionCookie};
pub use middleware::{session_auth, ApiError, AppState, AuthenticatedUser};
