// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::crypto::SignatureError;

/// Why a signed request was not authenticated.
#[derive(Debug)]
pub enum AuthError {
    /// A required header is absent
    MissingHeader(&'static str),
    /// A header is present but unusable
    InvalidHeader(&'static str),
    /// The request body is not valid JSON
    InvalidBody,
    /// No key with this hash exists
    UnknownKey,
    /// The key was revoked
    RevokedKey,
    /// Timestamp outside the validity window
    ExpiredSignature,
    /// Signature missing, malformed or wrong
    InvalidSignature,
    /// Storage or vault failure
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader(_) => "missing_auth_header",
            AuthError::InvalidHeader(_) => "invalid_auth_header",
            AuthError::InvalidBody => "invalid_body",
            AuthError::UnknownKey => "unknown_api_key",
            AuthError::RevokedKey => "revoked_api_key",
            AuthError::ExpiredSignature => "expired_signature",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidBody => StatusCode::BAD_REQUEST,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingHeader(name) => write!(f, "{name} header is required"),
            AuthError::InvalidHeader(name) => write!(f, "{name} header is invalid"),
            AuthError::InvalidBody => write!(f, "Request body is not valid JSON"),
            AuthError::UnknownKey => write!(f, "API key is not recognized"),
            AuthError::RevokedKey => write!(f, "API key has been revoked"),
            AuthError::ExpiredSignature => write!(f, "Request signature has expired"),
            AuthError::InvalidSignature => write!(f, "Request signature is invalid"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<SignatureError> for AuthError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Expired => AuthError::ExpiredSignature,
            SignatureError::Mismatch | SignatureError::Malformed => AuthError::InvalidSignature,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_header_returns_401() {
        let response = AuthError::MissingHeader("X-Quantish-Key").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_auth_header");
        assert_eq!(body["error"], "X-Quantish-Key header is required");
    }

    #[test]
    fn signature_errors_map_to_auth_errors() {
        assert!(matches!(
            AuthError::from(SignatureError::Expired),
            AuthError::ExpiredSignature
        ));
        assert!(matches!(
            AuthError::from(SignatureError::Malformed),
            AuthError::InvalidSignature
        ));
    }

    #[tokio::test]
    async fn internal_error_returns_500() {
        let response = AuthError::InternalError("disk".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
