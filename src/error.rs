//! Unified application error model and mapping helpers.
//! Narrow domain errors (credentials, registration, sessions) convert into `AppError`,
//! which knows its HTTP status and renders as the JSON error shape used by the API routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Submitted identifier/secret pair did not match a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid credentials")]
pub struct InvalidCredentials;

/// Insert into the credential store hit an existing identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("user already exists")]
pub struct AlreadyExists;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("user already exists")]
    AlreadyExists,
    #[error("password is too weak (minimum {min_len} characters)")]
    WeakSecret { min_len: usize },
}

impl From<AlreadyExists> for RegistrationError {
    fn from(_: AlreadyExists) -> Self { RegistrationError::AlreadyExists }
}

/// Reasons a presented session token does not resolve to an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no session token")]
    Missing,
    #[error("malformed session token")]
    Malformed,
    #[error("bad session signature")]
    BadSignature,
    #[error("session expired")]
    Expired,
    #[error("session revoked")]
    Revoked,
    #[error("session user no longer exists")]
    UnknownUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user already exists")]
    AlreadyExists,
    #[error("password is too weak")]
    WeakSecret,
    #[error("unauthorized")]
    Unauthenticated,
    #[error("invalid session: {0}")]
    InvalidSession(SessionError),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code_str(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::AlreadyExists => "already_exists",
            AppError::WeakSecret => "weak_secret",
            AppError::Unauthenticated => "unauthenticated",
            AppError::InvalidSession(_) => "invalid_session",
            AppError::MalformedRequest(_) => "malformed_request",
            AppError::Internal(_) => "internal",
        }
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::AlreadyExists | AppError::WeakSecret => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidSession(_) => StatusCode::FORBIDDEN,
            AppError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn malformed<S: Into<String>>(msg: S) -> Self { AppError::MalformedRequest(msg.into()) }
    pub fn internal<S: Into<String>>(msg: S) -> Self { AppError::Internal(msg.into()) }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<InvalidCredentials> for AppError {
    fn from(_: InvalidCredentials) -> Self { AppError::InvalidCredentials }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::AlreadyExists => AppError::AlreadyExists,
            RegistrationError::WeakSecret { .. } => AppError::WeakSecret,
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Missing => AppError::Unauthenticated,
            other => AppError::InvalidSession(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(code = self.code_str(), "request failed: {}", self);
        } else {
            tracing::debug!(code = self.code_str(), status = status.as_u16(), "request rejected: {}", self);
        }
        // Internal details stay in the log
        let msg = match &self {
            AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "err": true, "code": self.code_str(), "msg": msg }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::InvalidCredentials.http_status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::AlreadyExists.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::WeakSecret.http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Unauthenticated.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InvalidSession(SessionError::Expired).http_status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::malformed("bad json").http_status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::internal("boom").http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn registration_errors_keep_their_kind() {
        assert_eq!(AppError::from(RegistrationError::AlreadyExists), AppError::AlreadyExists);
        assert_eq!(AppError::from(RegistrationError::WeakSecret { min_len: 5 }), AppError::WeakSecret);
        assert_eq!(RegistrationError::from(AlreadyExists), RegistrationError::AlreadyExists);
    }

    #[test]
    fn missing_session_is_unauthenticated_not_invalid() {
        assert_eq!(AppError::from(SessionError::Missing), AppError::Unauthenticated);
        assert_eq!(AppError::from(SessionError::BadSignature).code_str(), "invalid_session");
    }
}
