//! API middleware
//!
//! Session authentication for axum routers:
//! - `session_auth` validates the session cookie and attaches the caller
//! - `AuthenticatedUser` extracts the caller, rejecting with 401 if absent

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, IntoResponseParts, Response, ResponseParts},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::api::cookie::{CookieBinder, CookieInstruction};
use crate::models::{PublicUser, Session};
use crate::services::SessionManager;

/// Application state shared by the session middleware
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub cookies: CookieBinder,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, cookies: CookieBinder) -> Self {
        Self { sessions, cookies }
    }
}

/// The caller behind a valid session
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: PublicUser,
    pub session: Session,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl IntoResponseParts for CookieInstruction {
    type Error = ApiError;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let value = self.to_header_value().map_err(|e| {
            tracing::error!(cookie = self.name(), error = %e, "Unrenderable session cookie");
            ApiError::internal_error("Internal server error")
        })?;
        res.headers_mut().append(header::SET_COOKIE, value);
        Ok(res)
    }
}

/// Session authentication middleware
///
/// Requests without a session cookie pass through untouched. Otherwise the
/// token is validated: a valid session is attached as [`AuthenticatedUser`] and
/// its cookie refreshed with the (possibly renewed) expiry; an unknown or
/// expired token has its cookie cleared. A handler that writes the session
/// cookie itself wins over both.
///
/// Store failures become a bare 500.
pub async fn session_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = state.cookies.read(request.headers()) else {
        return Ok(next.run(request).await);
    };

    let validated = state
        .sessions
        .validate_session_token(&token)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "Session validation failed");
            ApiError::internal_error("Internal server error")
        })?;

    let instruction = match validated {
        Some(validated) => {
            let instruction = state.cookies.bind(&token, validated.session.expires_at);
            request.extensions_mut().insert(AuthenticatedUser {
                user: validated.user,
                session: validated.session,
            });
            instruction
        }
        None => state.cookies.clear(),
    };

    let mut response = next.run(request).await;

    if !response_sets_cookie(&response, instruction.name()) {
        match instruction.to_header_value() {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => {
                tracing::warn!(cookie = instruction.name(), error = %e, "Skipping session cookie");
            }
        }
    }

    Ok(response)
}

fn response_sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| {
            value
                .split_once('=')
                .is_some_and(|(cookie_name, _)| cookie_name.trim() == name)
        })
}

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthenticatedUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthenticatedUser>().cloned())
    }
}
