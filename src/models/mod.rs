//! Data models
//!
//! Database entities (User, Session) and the public projection of a user that
//! is safe to return from session validation.

mod session;
mod user;

pub use session::Session;
pub use user::{PublicUser, User};
