//! Webhook signature verification. HMAC-SHA256 over `<timestamp>.<raw_body>`, a TTL
//! window, and replay detection backed by `wireline_cache`'s `set_nx`
//! (the same first-seen primitive used for inbound `external_id` dedup).

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use wireline_core::config::WebhookConfig;
use wireline_core::error::{WireError, WireResult};
use wireline_cache::RedisCache;

type HmacSha256 = Hmac<Sha256>;

pub struct WebhookVerifier {
    config: WebhookConfig,
    cache: Arc<RedisCache>,
}

impl WebhookVerifier {
    pub fn new(config: WebhookConfig, cache: Arc<RedisCache>) -> Self {
        Self { config, cache }
    }

    /// Verifies `signature_hex` over `timestamp_header`/`raw_body`.
    /// No-ops (returns `Ok`) when verification is not configured. Fails
    /// with `WireError::Unauthorized` on missing/invalid signature,
    /// expired timestamp, or replay — signature failures are recorded but
    /// never retried, so callers must not requeue this error.
    pub async fn verify(
        &self,
        timestamp_header: Option<&str>,
        signature_header: Option<&str>,
        raw_body: &[u8],
    ) -> WireResult<()> {
        if !self.config.verification_enabled() {
            return Ok(());
        }

        let secret = self
        .config
        .signing_secret
        .as_ref()
        .ok_or_else(|| WireError::Unauthorized)?;

        let timestamp_header = timestamp_header.ok_or(WireError::Unauthorized)?;
        let signature_header = signature_header.ok_or(WireError::Unauthorized)?;

        let timestamp_ms = parse_timestamp_ms(timestamp_header).ok_or(WireError::Unauthorized)?;
        let now_ms = Utc::now().timestamp_millis();
        if (now_ms - timestamp_ms).unsigned_abs() > self.config.signature_ttl_ms {
            return Err(WireError::Unauthorized);
        }

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WireError::Unauthorized)?;
        mac.update(timestamp_header.as_bytes());
        mac.update(b".");
        mac.update(raw_body);
        let expected = hex::encode(mac.finalize().into_bytes());

        if !constant_time_eq(expected.as_bytes(), signature_header.as_bytes()) {
            return Err(WireError::Unauthorized);
        }

        let replay_key = format!("webhook:sig:{signature_header}");
        let first_seen = self
        .cache
        .set_nx(&replay_key, "1", self.config.signature_ttl_ms)
        .await
        .map_err(|e| WireError::TransientDependency(e.to_string()))?;
        if !first_seen {
            return Err(WireError::Unauthorized);
        }

        Ok(())
    }
}

fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    if let Ok(unix) = raw.parse::<i64>() {
        // Heuristic: values under 10^12 are seconds, not milliseconds.
        return Some(if unix < 1_000_000_000_000 { unix * 1000 } else { unix });
    }
    chrono::DateTime::parse_from_rfc3339(raw)
    .ok()
    .map(|dt| dt.timestamp_millis())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_seconds_and_millis() {
        assert_eq!(parse_timestamp_ms("1700000000"), Some(1_700_000_000_000));
        assert_eq!(parse_timestamp_ms("1700000000000"), Some(1_700_000_000_000));
    }

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
