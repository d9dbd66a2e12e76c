use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of an issued token.
pub const TOKEN_TTL_SECS: i64 = 60 * 60;

/// Tolerated clock drift for tokens issued by another process.
const CLOCK_SKEW_SECS: i64 = 60;

/// Issues and checks bearer tokens of the form
/// `<identity>.<issued-at unix secs>.<hex hmac-sha256(secret, identity.issued-at)>`.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Arc<[u8]>,
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

impl TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
        }
    }

    fn mac(&self, payload: &str) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(payload.as_bytes());
        Some(mac)
    }

    pub fn issue(&self, identity: &str) -> Option<String> {
        self.issue_at(identity, unix_now())
    }

    pub fn issue_at(&self, identity: &str, issued_at: i64) -> Option<String> {
        let payload = format!("{identity}.{issued_at}");
        let mac = self.mac(&payload)?;
        Some(format!("{payload}.{}", hex::encode(mac.finalize().into_bytes())))
    }

    /// Returns the identity a valid, unexpired token was issued for.
    pub fn verify(&self, token: &str) -> Option<String> {
        self.verify_at(token, unix_now())
    }

    pub fn verify_at(&self, token: &str, now: i64) -> Option<String> {
        // Identities may contain dots (emails); the timestamp and signature never do.
        let (payload, signature) = token.rsplit_once('.')?;
        let (identity, issued_at) = payload.rsplit_once('.')?;
        if identity.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;
        self.mac(payload)?.verify_slice(&signature).ok()?;

        let issued_at: i64 = issued_at.parse().ok()?;
        let age = now - issued_at;
        if age < -CLOCK_SKEW_SECS || age > TOKEN_TTL_SECS {
            return None;
        }
        Some(identity.to_string())
    }
}

/// `Authorization: Bearer <token>`, falling back to `x-auth-token`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let non_empty = |value: &str| !value.is_empty();
    if let Some(value) = headers.get(AUTHORIZATION) {
        return value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| non_empty(v));
    }
    headers
        .get("x-auth-token")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| non_empty(v))
}
