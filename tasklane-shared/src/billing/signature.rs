/// Webhook signature verification
///
/// The gateway signs each delivery with a `Stripe-Signature` header of the form
/// `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. Each `v1` value is
/// HMAC-SHA256(webhook secret, `"{t}.{raw body}"`). The MAC is computed over the
/// exact bytes received; the body must not be re-serialized before this check.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::error::BillingError;
use super::events::{parse_event, GatewayEvent};

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a signature timestamp, in seconds
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, BillingError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| BillingError::InvalidSignature("missing timestamp".into()))?
        .parse::<i64>()
        .map_err(|_| BillingError::InvalidSignature("invalid timestamp".into()))?;

    if signatures.is_empty() {
        return Err(BillingError::InvalidSignature("missing v1 signature".into()));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

fn mac_for(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256, BillingError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BillingError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a signature header against the raw body
///
/// `now` is the current unix time; a timestamp more than `tolerance` seconds
/// away from it is rejected even if the MAC matches.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance: i64,
) -> Result<(), BillingError> {
    let parsed = parse_header(header)?;

    if now.abs_diff(parsed.timestamp) > tolerance.unsigned_abs() {
        return Err(BillingError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }

    let mac = mac_for(payload, secret, parsed.timestamp)?;

    let matched = parsed.signatures.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });

    if !matched {
        return Err(BillingError::InvalidSignature("signature mismatch".into()));
    }

    Ok(())
}

/// Builds a signature header for `payload`, as the gateway would
///
/// Used by tests and by local tooling that replays deliveries.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = match mac_for(payload, secret, timestamp) {
        Ok(mac) => hex::encode(mac.finalize().into_bytes()),
        // HMAC accepts keys of any length.
        Err(_) => String::new(),
    };

    format!("t={},v1={}", timestamp, signature)
}

/// Verifies the signature and parses the body into a [`GatewayEvent`]
///
/// Nothing is parsed until the signature has been accepted.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<GatewayEvent, BillingError> {
    verify_signature(payload, header, secret, now, DEFAULT_TOLERANCE_SECONDS)?;
    parse_event(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"customer.subscription.created","data":{"object":{"id":"sub_1","customer":"cus_1","status":"active"}}}"#;

    #[test]
    fn test_valid_signature() {
        let header = sign_payload(BODY, SECRET, NOW);
        assert!(verify_signature(BODY, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECONDS).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let valid = sign_payload(BODY, SECRET, NOW);
        let sig = valid.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), sig);

        assert!(verify_signature(BODY, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECONDS).is_ok());
    }

    #[test]
    fn test_every_tampered_byte_is_rejected() {
        let header = sign_payload(BODY, SECRET, NOW);

        for i in 0..BODY.len() {
            let mut tampered = BODY.to_vec();
            tampered[i] ^= 0x01;
            assert!(
                construct_event(&tampered, &header, SECRET, NOW).is_err(),
                "byte {} flipped but accepted",
                i
            );
        }
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign_payload(BODY, "whsec_other", NOW);
        assert!(matches!(
            verify_signature(BODY, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECONDS),
            Err(BillingError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_stale_and_future_timestamps() {
        let old = sign_payload(BODY, SECRET, NOW - 301);
        assert!(verify_signature(BODY, &old, SECRET, NOW, DEFAULT_TOLERANCE_SECONDS).is_err());

        let future = sign_payload(BODY, SECRET, NOW + 301);
        assert!(verify_signature(BODY, &future, SECRET, NOW, DEFAULT_TOLERANCE_SECONDS).is_err());

        let edge = sign_payload(BODY, SECRET, NOW - 300);
        assert!(verify_signature(BODY, &edge, SECRET, NOW, DEFAULT_TOLERANCE_SECONDS).is_ok());
    }

    #[test]
    fn test_extreme_timestamps_are_rejected() {
        for timestamp in [i64::MIN, i64::MAX, 0] {
            let header = sign_payload(BODY, SECRET, timestamp);
            assert!(matches!(
                verify_signature(BODY, &header, SECRET, NOW, DEFAULT_TOLERANCE_SECONDS),
                Err(BillingError::InvalidSignature(_))
            ));
        }
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "garbage", "t=abc,v1=00", "t=1700000000", "v1=deadbeef", "t=1700000000,v1=zz"] {
            assert!(
                matches!(
                    verify_signature(BODY, header, SECRET, NOW, DEFAULT_TOLERANCE_SECONDS),
                    Err(BillingError::InvalidSignature(_))
                ),
                "header {:?} accepted",
                header
            );
        }
    }

    #[test]
    fn test_construct_event_parses_after_verification() {
        let header = sign_payload(BODY, SECRET, NOW);
        let event = construct_event(BODY, &header, SECRET, NOW).unwrap();
        assert_eq!(event.id(), "evt_1");
        assert_eq!(event.event_type(), "customer.subscription.created");
    }
}
