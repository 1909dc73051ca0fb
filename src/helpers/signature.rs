//! Billing webhook signatures.
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac-sha256>` where the MAC is
//! computed over `"<t>.<raw body>"`. Several `v1` entries may be present
//! while the provider rotates secrets; any one of them matching is enough.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const SIGNATURE_HEADER: &str = "billing-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature timestamp is outside the tolerance window")]
    Expired,
    #[error("signature does not match")]
    Mismatch,
}

fn digest(secret: &[u8], timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|err| {
        tracing::error!("error generating hmac {err:?}");
        SignatureError::Malformed
    })?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(format!("{:x}", mac.finalize().into_bytes()))
}

/// Header value for `body` signed at `timestamp`.
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    Ok(format!("t={},v1={}", timestamp, digest(secret, timestamp, body)?))
}

pub fn verify(
    header: Option<&str>,
    body: &[u8],
    secret: &[u8],
    tolerance_secs: u64,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => candidates.push(value),
            Some(_) => {}
            None => return Err(SignatureError::Malformed),
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    let age = now.timestamp().saturating_sub(timestamp).unsigned_abs();
    if age > tolerance_secs {
        return Err(SignatureError::Expired);
    }

    let expected = digest(secret, timestamp, body)?;
    let matched = candidates
        .iter()
        .any(|candidate| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &[u8] = b"whsec_test";
    const BODY: &[u8] = br#"{"id":"evt_1"}"#;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn signed_body_verifies() {
        let header = sign(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(verify(Some(&header), BODY, SECRET, 300, now()), Ok(()));
    }

    #[test]
    fn tampered_body_fails() {
        let header = sign(SECRET, 1_700_000_000, BODY).unwrap();
        assert_eq!(
            verify(Some(&header), br#"{"id":"evt_2"}"#, SECRET, 300, now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_fails() {
        let header = sign(b"other", 1_700_000_000, BODY).unwrap();
        assert_eq!(
            verify(Some(&header), BODY, SECRET, 300, now()),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn old_signature_is_rejected() {
        let header = sign(SECRET, 1_700_000_000 - 301, BODY).unwrap();
        assert_eq!(
            verify(Some(&header), BODY, SECRET, 300, now()),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn any_rotated_signature_may_match() {
        let good = sign(SECRET, 1_700_000_000, BODY).unwrap();
        let v1 = good.split_once("v1=").unwrap().1;
        let header = format!("t=1700000000,v1=deadbeef,v1={}", v1);
        assert_eq!(verify(Some(&header), BODY, SECRET, 300, now()), Ok(()));
    }

    #[test]
    fn malformed_headers() {
        assert_eq!(verify(None, BODY, SECRET, 300, now()), Err(SignatureError::Missing));
        for header in ["", "v1=abc", "t=abc,v1=abc", "t=1700000000"] {
            assert_eq!(
                verify(Some(header), BODY, SECRET, 300, now()),
                Err(SignatureError::Malformed),
                "{}",
                header
            );
        }
    }
}
