// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for HMAC-signed requests.
//!
//! Use the `SignedRequest` extractor in handlers to require a valid
//! signature. It consumes the body, so it must be the last extractor:
//!
//! ```rust,ignore
//! async fn place_order(
//!     State(state): State<AppState>,
//!     request: SignedRequest,
//! ) -> impl IntoResponse {
//!     // request.key.user_id is the authenticated user
//!     // request.body is the parsed JSON body, if any
//! }
//! ```

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde_json::Value;

use super::{authenticate, AuthError, AuthenticatedKey};
use crate::state::AppState;

/// A request whose signature has been verified.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub key: AuthenticatedKey,
    pub body: Option<Value>,
}

impl FromRequest<AppState> for SignedRequest {
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let method = req.method().as_str().to_string();
        let path = req.uri().path().to_string();
        let headers = req.headers().clone();

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|_| AuthError::InvalidBody)?;
        let body = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice::<Value>(&bytes).map_err(|_| AuthError::InvalidBody)?)
        };

        let key = authenticate(
            state.store.as_ref(),
            &state.vault,
            &headers,
            &method,
            &path,
            body.as_ref(),
            state.signature_window,
        )?;

        Ok(SignedRequest { key, body })
    }
}
