//! Webhook signature verification
//!
//! Two independent signing protocols guard the inbound routes:
//! - the stream-event source signs deliveries with
//!   `sha256=<hex(HMAC-SHA256(secret, message_id + timestamp + body))>`
//!   and a freshness window bounds replays;
//! - the interaction bot sends an Ed25519 detached signature over
//!   `timestamp + body`, verified against a known public key.
//!
//! Both verifiers take the exact raw body bytes from the transport layer.
//! Re-serializing the parsed body breaks verification when key order or
//! whitespace differs.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age (and future skew) of a stream-event timestamp.
pub const FRESHNESS_WINDOW_SECS: i64 = 600;

/// Verify a stream-event webhook signature.
///
/// Expects header value like `sha256=<hex>`. Fails closed on a missing
/// prefix, a signature mismatch, or a timestamp outside the freshness
/// window.
#[must_use]
pub fn verify_stream_event(
    secret: &str,
    message_id: &str,
    timestamp: &str,
    body: &[u8],
    signature_header: &str,
    now: DateTime<Utc>,
) -> bool {
    if !is_fresh(timestamp, now) {
        return false;
    }

    let Some(expected_hex) = signature_header.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message_id.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);
    let computed_hex = hex::encode(mac.finalize().into_bytes());

    computed_hex.as_bytes().ct_eq(expected_hex.as_bytes()).into()
}

fn is_fresh(timestamp: &str, now: DateTime<Utc>) -> bool {
    let Ok(sent_at) = DateTime::parse_from_rfc3339(timestamp) else {
        return false;
    };
    let age = now.signed_duration_since(sent_at.with_timezone(&Utc));
    age.num_seconds().abs() <= FRESHNESS_WINDOW_SECS
}

/// Parse the interaction sender's hex-encoded Ed25519 public key.
pub fn parse_verifying_key(hex_key: &str) -> Result<VerifyingKey, String> {
    let bytes = hex::decode(hex_key).map_err(|e| format!("invalid hex public key: {e}"))?;
    let key_bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| "public key must be 32 bytes".to_string())?;
    VerifyingKey::from_bytes(&key_bytes).map_err(|e| format!("invalid public key: {e}"))
}

/// Verify an interaction-bot request signature.
///
/// The detached signature covers `timestamp + body`. Fails closed on any
/// malformed input.
#[must_use]
pub fn verify_interaction(
    key: &VerifyingKey,
    timestamp: &str,
    body: &[u8],
    signature_hex: &str,
) -> bool {
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_array);

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    key.verify(&message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ed25519_dalek::{Signer, SigningKey};

    fn sign_stream_event(secret: &str, message_id: &str, timestamp: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(message_id.as_bytes());
        mac.update(timestamp.as_bytes());
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid instant")
    }

    #[test]
    fn test_valid_stream_event_signature() {
        let ts = "2026-03-01T11:59:00Z";
        let body = br#"{"subscription":{"type":"stream.online"}}"#;
        let sig = sign_stream_event("s3cret", "m1", ts, body);
        assert!(verify_stream_event("s3cret", "m1", ts, body, &sig, now()));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let ts = "2026-03-01T11:59:00Z";
        let sig = sign_stream_event("s3cret", "m1", ts, b"original");
        assert!(!verify_stream_event("s3cret", "m1", ts, b"tampered", &sig, now()));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        // 11 minutes old: outside the 600 second window even with a valid signature
        let ts = "2026-03-01T11:49:00Z";
        let body = b"body";
        let sig = sign_stream_event("s3cret", "m1", ts, body);
        assert!(!verify_stream_event("s3cret", "m1", ts, body, &sig, now()));
    }

    #[test]
    fn test_boundary_timestamp_accepted() {
        // exactly 600 seconds old
        let ts = "2026-03-01T11:50:00Z";
        let body = b"body";
        let sig = sign_stream_event("s3cret", "m1", ts, body);
        assert!(verify_stream_event("s3cret", "m1", ts, body, &sig, now()));
    }

    #[test]
    fn test_missing_prefix_rejected() {
        let ts = "2026-03-01T11:59:00Z";
        let sig = sign_stream_event("s3cret", "m1", ts, b"body");
        let bare = sig.strip_prefix("sha256=").expect("prefix").to_string();
        assert!(!verify_stream_event("s3cret", "m1", ts, b"body", &bare, now()));
    }

    #[test]
    fn test_garbage_timestamp_rejected() {
        assert!(!verify_stream_event("s3cret", "m1", "yesterday", b"body", "sha256=00", now()));
    }

    #[test]
    fn test_interaction_roundtrip() {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let key = signing.verifying_key();
        let ts = "1700000000";
        let body = br#"{"type":1}"#;

        let mut message = ts.as_bytes().to_vec();
        message.extend_from_slice(body);
        let sig = hex::encode(signing.sign(&message).to_bytes());

        assert!(verify_interaction(&key, ts, body, &sig));
        assert!(!verify_interaction(&key, ts, b"{}", &sig));
        assert!(!verify_interaction(&key, "1700000001", body, &sig));
    }

    #[test]
    fn test_interaction_malformed_signature() {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let key = signing.verifying_key();
        assert!(!verify_interaction(&key, "ts", b"body", "not-hex"));
        assert!(!verify_interaction(&key, "ts", b"body", "abcd"));
    }

    #[test]
    fn test_parse_verifying_key() {
        let signing = SigningKey::from_bytes(&[9u8; 32]);
        let hex_key = hex::encode(signing.verifying_key().to_bytes());
        assert!(parse_verifying_key(&hex_key).is_ok());
        assert!(parse_verifying_key("too-short").is_err());
        assert!(parse_verifying_key(&"00".repeat(16)).is_err());
    }
}
