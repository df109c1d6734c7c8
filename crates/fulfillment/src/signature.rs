//! Webhook signature verification.
//!
//! The provider signs each delivery with HMAC-SHA256 over `"{t}.{raw body}"`
//! using the endpoint's signing secret, and sends
//! `t=<unix seconds>,v1=<hex digest>[,v1=<hex digest>...]` in the
//! signature header. Several `v1` entries appear while a secret is rotated.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum accepted age of a signed timestamp.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Verifies webhook payloads against the shared signing secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    /// Creates a verifier with the default timestamp tolerance.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Sets the accepted timestamp skew.
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Checks `header` against the exact bytes of `payload`.
    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(SignatureError::MissingHeader)?;

        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(SignatureError::Malformed(format!("unexpected segment {part:?}")));
            };
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::Malformed("timestamp is not an integer".into()))?;
                    timestamp = Some(t);
                }
                "v1" => candidates.push(value),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| SignatureError::Malformed("missing timestamp".into()))?;
        if candidates.is_empty() {
            return Err(SignatureError::Malformed("missing v1 signature".into()));
        }

        let mac = self.mac_for(payload, timestamp);
        let matched = candidates.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|expected| mac.clone().verify_slice(&expected).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(SignatureError::Mismatch);
        }

        let age_secs = now.timestamp() - timestamp;
        if age_secs.unsigned_abs() > self.tolerance.as_secs() {
            return Err(SignatureError::StaleTimestamp { age_secs });
        }

        Ok(())
    }

    /// Produces the header value the provider would send for `payload` at `timestamp`.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let digest = self.mac_for(payload, timestamp).finalize().into_bytes();
        format!("t={timestamp},v1={}", hex::encode(digest))
    }

    fn mac_for(&self, payload: &[u8], timestamp: i64) -> HmacSha256 {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac
    }
}
