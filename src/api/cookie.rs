//! Session cookie binding
//!
//! Maps a session token and its expiry onto `Set-Cookie` instructions and
//! reads the token back out of the `Cookie` request header.

use axum::http::{
    header::{self, InvalidHeaderValue},
    HeaderMap, HeaderValue,
};
use chrono::{DateTime, Utc};

use crate::config::SessionConfig;

const COOKIE_PATH: &str = "/";
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// A session cookie to be set on the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub path: String,
    pub secure: bool,
}

/// What the transport should do with the session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieInstruction {
    Set(SessionCookie),
    Delete {
        name: String,
        path: String,
        secure: bool,
    },
}

impl CookieInstruction {
    /// Name of the cookie this instruction targets
    pub fn name(&self) -> &str {
        match self {
            CookieInstruction::Set(cookie) => &cookie.name,
            CookieInstruction::Delete { name, .. } => name,
        }
    }

    /// Render as a `Set-Cookie` header value.
    ///
    /// Fails only if the cookie name or value contains characters a header
    /// cannot carry.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let (mut rendered, secure) = match self {
            CookieInstruction::Set(cookie) => (
                format!(
                    "{}={}; Path={}; Expires={}; HttpOnly; SameSite=Lax",
                    cookie.name,
                    cookie.value,
                    cookie.path,
                    cookie.expires_at.format(HTTP_DATE_FORMAT)
                ),
                cookie.secure,
            ),
            CookieInstruction::Delete { name, path, secure } => (
                format!(
                    "{}=; Path={}; Expires={}; Max-Age=0; HttpOnly; SameSite=Lax",
                    name, path, EPOCH_HTTP_DATE
                ),
                *secure,
            ),
        };

        if secure {
            rendered.push_str("; Secure");
        }

        HeaderValue::from_str(&rendered)
    }
}

/// Binds session tokens to a named cookie
#[derive(Debug, Clone)]
pub struct CookieBinder {
    name: String,
    secure: bool,
}

impl CookieBinder {
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.cookie_name.clone(), config.secure_cookie)
    }

    /// The configured cookie name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instruction to store `token` on the client until `expires_at`
    pub fn bind(&self, token: &str, expires_at: DateTime<Utc>) -> CookieInstruction {
        CookieInstruction::Set(SessionCookie {
            name: self.name.clone(),
            value: token.to_string(),
            expires_at,
            path: COOKIE_PATH.to_string(),
            secure: self.secure,
        })
    }

    /// Instruction to remove the session cookie from the client
    pub fn clear(&self) -> CookieInstruction {
        CookieInstruction::Delete {
            name: self.name.clone(),
            path: COOKIE_PATH.to_string(),
            secure: self.secure,
        }
    }

    /// Extract the session token from the request's `Cookie` headers.
    ///
    /// An empty value is treated as no cookie.
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn binder() -> CookieBinder {
        CookieBinder::new("auth-session", true)
    }

    fn headers_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_bind_sets_named_cookie() {
        let expires_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let instruction = binder().bind("tok123", expires_at);

        assert_eq!(
            instruction,
            CookieInstruction::Set(SessionCookie {
                name: "auth-session".to_string(),
                value: "tok123".to_string(),
                expires_at,
                path: "/".to_string(),
                secure: true,
            })
        );
    }

    #[test]
    fn test_set_header_value() {
        let expires_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let value = binder().bind("tok123", expires_at).to_header_value().unwrap();

        assert_eq!(
            value.to_str().unwrap(),
            "auth-session=tok123; Path=/; Expires=Sun, 01 Mar 2026 12:00:00 GMT; HttpOnly; SameSite=Lax; Secure"
        );
    }

    #[test]
    fn test_clear_header_value() {
        let value = CookieBinder::new("auth-session", false)
            .clear()
            .to_header_value()
            .unwrap();

        assert_eq!(
            value.to_str().unwrap(),
            "auth-session=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_invalid_cookie_value_is_rejected() {
        let instruction = binder().bind("bad\nvalue", Utc::now());
        assert!(instruction.to_header_value().is_err());
    }

    #[test]
    fn test_read_finds_named_cookie_among_others() {
        let headers = headers_with_cookie("theme=dark; auth-session=abc_-123; lang=en");
        assert_eq!(binder().read(&headers), Some("abc_-123".to_string()));
    }

    #[test]
    fn test_read_ignores_similar_names() {
        let headers = headers_with_cookie("old-auth-session=nope; auth-session-x=nope");
        assert_eq!(binder().read(&headers), None);
    }

    #[test]
    fn test_read_empty_value_is_none() {
        let headers = headers_with_cookie("auth-session=");
        assert_eq!(binder().read(&headers), None);
    }

    #[test]
    fn test_read_without_cookie_header() {
        assert_eq!(binder().read(&HeaderMap::new()), None);
    }

    #[test]
    fn test_read_across_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("auth-session=xyz"));

        assert_eq!(binder().read(&headers), Some("xyz".to_string()));
    }

    #[test]
    fn test_from_config_uses_cookie_settings() {
        let config = SessionConfig {
            cookie_name: "sid".to_string(),
            secure_cookie: false,
            ..SessionConfig::default()
        };

        let binder = CookieBinder::from_config(&config);

        assert_eq!(binder.name(), "sid");
        assert_eq!(binder.clear().name(), "sid");
    }
}
