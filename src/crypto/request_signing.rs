// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HMAC-SHA256 request signatures.
//!
//! ## Canonical Message
//!
//! ```text
//! {timestamp_ms}{METHOD}{path}{canonical_json(body)}
//! ```
//!
//! `canonical_json` is compact JSON with object keys sorted at every depth.
//! A missing or `null` body contributes nothing. The signature is the
//! standard-base64 HMAC-SHA256 of that message under the caller's secret.
//!
//! ## Replay
//!
//! A signature is accepted anywhere inside the validity window. There is no
//! nonce or used-signature cache, so a captured request can be replayed until
//! its timestamp leaves the window.

use std::time::Duration;

use base64ct::{Base64, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 output length in bytes.
pub const SIGNATURE_LEN: usize = 32;

/// Default validity window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

/// Why a signed request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The timestamp is outside the validity window.
    #[error("signature timestamp outside the validity window")]
    Expired,

    /// The signature does not match the request.
    #[error("signature does not match request")]
    Mismatch,

    /// The signature is not valid base64.
    #[error("signature is not valid base64")]
    Malformed,
}

/// A request as seen by the verifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequestEnvelope {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub timestamp_ms: i64,
    pub signature: String,
}

impl SignedRequestEnvelope {
    /// Build and sign an envelope in one step (client side).
    pub fn new_signed(
        method: &str,
        path: &str,
        body: Option<Value>,
        timestamp_ms: i64,
        secret: &[u8],
    ) -> Self {
        let signature = sign(method, path, body.as_ref(), timestamp_ms, secret);
        Self {
            method: method.to_string(),
            path: path.to_string(),
            body,
            timestamp_ms,
            signature,
        }
    }
}

/// Sign a request.
pub fn sign(
    method: &str,
    path: &str,
    body: Option<&Value>,
    timestamp_ms: i64,
    secret: &[u8],
) -> String {
    let mac = compute_mac(method, path, body, timestamp_ms, secret);
    Base64::encode_string(&mac.finalize().into_bytes())
}

/// Verify a signed request against the current clock.
pub fn verify(
    envelope: &SignedRequestEnvelope,
    secret: &[u8],
    window: Duration,
) -> Result<(), SignatureError> {
    verify_at(envelope, secret, window, Utc::now().timestamp_millis())
}

/// Verify a signed request against an explicit `now_ms`.
///
/// The window check runs first, so a stale request is reported as
/// [`SignatureError::Expired`] even when its signature is correct.
pub fn verify_at(
    envelope: &SignedRequestEnvelope,
    secret: &[u8],
    window: Duration,
    now_ms: i64,
) -> Result<(), SignatureError> {
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    if now_ms.abs_diff(envelope.timestamp_ms) > window_ms {
        return Err(SignatureError::Expired);
    }

    let provided =
        Base64::decode_vec(envelope.signature.trim()).map_err(|_| SignatureError::Malformed)?;
    if provided.len() != SIGNATURE_LEN {
        return Err(SignatureError::Mismatch);
    }

    // verify_slice compares in constant time
    compute_mac(
        &envelope.method,
        &envelope.path,
        envelope.body.as_ref(),
        envelope.timestamp_ms,
        secret,
    )
    .verify_slice(&provided)
    .map_err(|_| SignatureError::Mismatch)
}

/// Compact JSON with object keys sorted recursively. `None`/`null` map to "".
pub fn canonical_json(body: Option<&Value>) -> String {
    let mut out = String::new();
    match body {
        None | Some(Value::Null) => {}
        Some(value) => write_canonical(value, &mut out),
    }
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn compute_mac(
    method: &str,
    path: &str,
    body: Option<&Value>,
    timestamp_ms: i64,
    secret: &[u8],
) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(timestamp_ms.to_string().as_bytes());
    mac.update(method.to_ascii_uppercase().as_bytes());
    mac.update(path.as_bytes());
    mac.update(canonical_json(body).as_bytes());
    mac
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret";
    const TS: i64 = 1_700_000_000_000;

    fn order_body() -> Value {
        json!({"side": "buy", "amount": 10})
    }

    #[test]
    fn matches_reference_signatures() {
        // HMAC-SHA256("test-secret", "1700000000000POST/api/orders{\"amount\":10,\"side\":\"buy\"}")
        assert_eq!(
            sign("POST", "/api/orders", Some(&order_body()), TS, SECRET),
            "H85u1Gz2KMLQZ5Cga1keRTLCeIW+lgiqgAKlaXu+odU="
        );
        assert_eq!(
            sign("GET", "/api/orders", None, TS, SECRET),
            "XCS60KqlEDrvOQwb6FwAHNiCz1S/LQbfARmJuedqExM="
        );
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let body = json!({"b": {"z": 1, "a": [true, null]}, "a": "x\"y"});
        assert_eq!(
            canonical_json(Some(&body)),
            r#"{"a":"x\"y","b":{"a":[true,null],"z":1}}"#
        );
        assert_eq!(canonical_json(None), "");
        assert_eq!(canonical_json(Some(&Value::Null)), "");
    }

    #[test]
    fn null_body_signs_like_missing_body() {
        assert_eq!(
            sign("GET", "/p", None, TS, SECRET),
            sign("GET", "/p", Some(&Value::Null), TS, SECRET)
        );
    }

    #[test]
    fn signed_envelope_verifies_inside_window() {
        let env = SignedRequestEnvelope::new_signed("POST", "/api/orders", Some(order_body()), TS, SECRET);
        assert_eq!(verify_at(&env, SECRET, DEFAULT_WINDOW, TS), Ok(()));
        assert_eq!(verify_at(&env, SECRET, DEFAULT_WINDOW, TS + 30_000), Ok(()));
        assert_eq!(verify_at(&env, SECRET, DEFAULT_WINDOW, TS - 30_000), Ok(()));
    }

    #[test]
    fn fresh_envelope_verifies_against_wall_clock() {
        let now = Utc::now().timestamp_millis();
        let env = SignedRequestEnvelope::new_signed("get", "/health", None, now, SECRET);
        assert_eq!(verify(&env, SECRET, DEFAULT_WINDOW), Ok(()));
    }

    #[test]
    fn stale_envelope_is_expired_even_with_correct_signature() {
        let env = SignedRequestEnvelope::new_signed("GET", "/api/orders", None, TS, SECRET);
        assert_eq!(
            verify_at(&env, SECRET, DEFAULT_WINDOW, TS + 30_001),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_at(&env, SECRET, DEFAULT_WINDOW, TS - 30_001),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn any_flipped_bit_is_rejected() {
        let env = SignedRequestEnvelope::new_signed("POST", "/api/orders", Some(order_body()), TS, SECRET);
        let raw = Base64::decode_vec(&env.signature).unwrap();

        for byte in 0..raw.len() {
            for bit in 0..8 {
                let mut tampered = raw.clone();
                tampered[byte] ^= 1 << bit;
                let mut bad = env.clone();
                bad.signature = Base64::encode_string(&tampered);
                assert_eq!(
                    verify_at(&bad, SECRET, DEFAULT_WINDOW, TS),
                    Err(SignatureError::Mismatch)
                );
            }
        }
    }

    #[test]
    fn tampered_request_fields_are_rejected() {
        let env = SignedRequestEnvelope::new_signed("POST", "/api/orders", Some(order_body()), TS, SECRET);

        let mut other_path = env.clone();
        other_path.path = "/api/withdraw".into();
        assert_eq!(verify_at(&other_path, SECRET, DEFAULT_WINDOW, TS), Err(SignatureError::Mismatch));

        let mut other_body = env.clone();
        other_body.body = Some(json!({"side": "buy", "amount": 1000}));
        assert_eq!(verify_at(&other_body, SECRET, DEFAULT_WINDOW, TS), Err(SignatureError::Mismatch));

        assert_eq!(verify_at(&env, b"other-secret", DEFAULT_WINDOW, TS), Err(SignatureError::Mismatch));
    }

    #[test]
    fn wrong_length_and_garbage_signatures_are_rejected() {
        let mut env = SignedRequestEnvelope::new_signed("GET", "/p", None, TS, SECRET);
        env.signature = Base64::encode_string(&[0u8; 16]);
        assert_eq!(verify_at(&env, SECRET, DEFAULT_WINDOW, TS), Err(SignatureError::Mismatch));

        env.signature = "***".into();
        assert_eq!(verify_at(&env, SECRET, DEFAULT_WINDOW, TS), Err(SignatureError::Malformed));
    }
}
