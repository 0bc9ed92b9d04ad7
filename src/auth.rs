//! Slack request signature verification for the HTTP transport.
//!
//! Slack signs every request with `v0=hex(HMAC_SHA256(secret, "v0:{ts}:{body}"))`
//! and sends the result in `X-Slack-Signature` next to
//! `X-Slack-Request-Timestamp`. The middleware checks both before the body is
//! parsed by any handler.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

/// Requests older or newer than this are rejected.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60 * 5;

/// Slash command payloads are small; anything larger is not from Slack.
const MAX_BODY_BYTES: usize = 64 * 1024;

const VERSION: &str = "v0";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Missing X-Slack-Request-Timestamp header")]
    MissingTimestamp,
    #[error("X-Slack-Request-Timestamp is not a unix timestamp")]
    InvalidTimestamp,
    #[error("Request timestamp is outside the allowed window")]
    StaleTimestamp,
    #[error("Missing X-Slack-Signature header")]
    MissingSignature,
    #[error("Invalid request signature")]
    Mismatch,
}

/// Verifies Slack's request signatures with the app's signing secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"***")
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Compute the `v0=...` signature for a timestamp and raw body.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> String {
        let mut mac = match HmacSha256::new_from_slice(self.secret.as_bytes()) {
            Ok(mac) => mac,
            // HMAC takes keys of any length
            Err(_) => return String::new(),
        };
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        format!("{}={}", VERSION, hex::encode(mac.finalize().into_bytes()))
    }

    /// Verify against the current time.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        self.verify_at(timestamp, signature, body, chrono::Utc::now().timestamp())
    }

    /// Verify as if the current unix time were `now`.
    pub fn verify_at(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp)?;
        if (now - sent_at).abs() > MAX_CLOCK_SKEW_SECS {
            return Err(SignatureError::StaleTimestamp);
        }

        let provided = signature.ok_or(SignatureError::MissingSignature)?;
        let expected = self.sign(timestamp, body);
        if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// Signature middleware for the slash command route.
///
/// Buffers the body, verifies it, then hands an identical request on.
pub async fn slack_signature_middleware(
    State(verifier): State<Arc<SignatureVerifier>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes: Bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Authentication failed: unreadable body");
            return unauthorized_response(
                "Request body could not be read",
                "Slash command payloads must be under 64 KiB",
            );
        }
    };

    let header_str = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
    let result = verifier.verify(
        header_str(TIMESTAMP_HEADER),
        header_str(SIGNATURE_HEADER),
        &bytes,
    );

    match result {
        Ok(()) => {
            debug!("Slack signature verified");
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(e) => {
            warn!(reason = %e, "Authentication failed");
            unauthorized_response(
                e.to_string(),
                "Check SLACK_SIGNING_SECRET and the server clock",
            )
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn unauthorized_response(message: impl Into<String>, suggestion: impl Into<String>) -> Response {
    #[derive(Serialize)]
    struct ErrorResponse {
        error: ErrorDetail,
    }
    #[derive(Serialize)]
    struct ErrorDetail {
        code: &'static str,
        message: String,
        suggestion: String,
    }

    let body = ErrorResponse {
        error: ErrorDetail {
            code: "unauthorized",
            message: message.into(),
            suggestion: suggestion.into(),
        },
    };
    let json = serde_json::to_string(&body).unwrap_or_else(|_| {
        r#"{"error":{"code":"unauthorized","message":"Authentication failed"}}"#.to_string()
    });

    (
        StatusCode::UNAUTHORIZED,
        [(header::CONTENT_TYPE, "application/json")],
        json,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = b"text=show+revenue&response_url=https%3A%2F%2Fhooks.slack.com%2Fx";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new("8f742231b10e8888abcd99yyyzzz85a5")
    }

    #[test]
    fn test_sign_format() {
        let sig = verifier().sign("1531420618", b"token=abc");
        assert!(sig.starts_with("v0="));
        assert_eq!(sig.len(), 3 + 64);
    }

    #[test]
    fn test_valid_signature() {
        let v = verifier();
        let ts = NOW.to_string();
        let sig = v.sign(&ts, BODY);
        assert_eq!(v.verify_at(Some(&ts), Some(&sig), BODY, NOW), Ok(()));
    }

    #[test]
    fn test_tampered_body() {
        let v = verifier();
        let ts = NOW.to_string();
        let sig = v.sign(&ts, BODY);
        assert_eq!(
            v.verify_at(Some(&ts), Some(&sig), b"text=drop", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let ts = NOW.to_string();
        let sig = SignatureVerifier::new("other").sign(&ts, BODY);
        assert_eq!(
            verifier().verify_at(Some(&ts), Some(&sig), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_timestamp_window() {
        let v = verifier();
        let ts = (NOW - MAX_CLOCK_SKEW_SECS).to_string();
        let sig = v.sign(&ts, BODY);
        assert_eq!(v.verify_at(Some(&ts), Some(&sig), BODY, NOW), Ok(()));

        let ts = (NOW - MAX_CLOCK_SKEW_SECS - 1).to_string();
        let sig = v.sign(&ts, BODY);
        assert_eq!(
            v.verify_at(Some(&ts), Some(&sig), BODY, NOW),
            Err(SignatureError::StaleTimestamp)
        );

        let ts = (NOW + MAX_CLOCK_SKEW_SECS + 1).to_string();
        let sig = v.sign(&ts, BODY);
        assert_eq!(
            v.verify_at(Some(&ts), Some(&sig), BODY, NOW),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn test_missing_headers() {
        let v = verifier();
        assert_eq!(
            v.verify_at(None, Some("v0=abc"), BODY, NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            v.verify_at(Some("yesterday"), Some("v0=abc"), BODY, NOW),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            v.verify_at(Some(&NOW.to_string()), None, BODY, NOW),
            Err(SignatureError::MissingSignature)
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"v0=abc", b"v0=abc"));
        assert!(!constant_time_eq(b"v0=abc", b"v0=abd"));
        assert!(!constant_time_eq(b"v0=abc", b"v0=ab"));
    }

    #[test]
    fn test_debug_hides_secret() {
        assert!(!format!("{:?}", verifier()).contains("8f74"));
    }
}
