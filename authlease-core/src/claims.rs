//! Unverified JWT claim decoding and refresh-deadline math.
//!
//! Access tokens returned by the providers are JWTs. The lifecycle only
//! needs the `iat` and `exp` claims to schedule the next fetch; signature
//! verification stays with the transport layer, so the payload segment is
//! decoded without validating the signature.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use serde::Deserialize;
use thiserror::Error;

/// Fraction of a token's lifetime after which a refresh is scheduled.
///
/// Refreshing at 80% of the TTL leaves a margin so a caller is never handed
/// a token that expires mid-flight.
pub const FRACTION_OF_TTL: f64 = 0.8;

/// Error type for claim decoding.
///
/// These never cross the lifecycle boundary: a token whose claims cannot be
/// decoded is treated as already due for refresh.
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// The token does not look like a JWT at all.
    #[error("token is not a JWT: expected dot-separated segments")]
    Malformed,

    /// The payload segment is not valid base64.
    #[error("claims segment is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload segment is not valid JSON.
    #[error("claims segment is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required numeric claim is absent.
    #[error("claims are missing the `{0}` field")]
    MissingClaim(&'static str),
}

/// Claims extracted from a provider-issued JWT.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    /// Expiry instant, epoch seconds.
    pub exp: i64,

    /// Issued-at instant, epoch seconds.
    pub iat: i64,

    /// Subject, when the provider embeds one.
    pub sub: Option<String>,

    /// Issuer.
    pub iss: Option<String>,

    /// Audience.
    pub aud: Option<String>,

    /// Provider-side username.
    pub username: Option<String>,

    /// Provider-side role.
    pub role: Option<String>,

    /// Provider-side user id.
    pub uid: Option<String>,
}

#[derive(Deserialize)]
struct RawClaims {
    exp: Option<i64>,
    iat: Option<i64>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    uid: Option<String>,
}

/// Decode the payload segment of a JWT without verifying its signature.
pub fn decode_unverified(token: &str) -> Result<TokenClaims, ClaimsError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload)) = (segments.next(), segments.next()) else {
        return Err(ClaimsError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload).or_else(|_| {
        // Some issuers pad their segments.
        let padded = match payload.len() % 4 {
            2 => format!("{payload}=="),
            3 => format!("{payload}="),
            _ => payload.to_string(),
        };
        STANDARD.decode(padded)
    })?;

    let raw: RawClaims = serde_json::from_slice(&bytes)?;
    Ok(TokenClaims {
        exp: raw.exp.ok_or(ClaimsError::MissingClaim("exp"))?,
        iat: raw.iat.ok_or(ClaimsError::MissingClaim("iat"))?,
        sub: raw.sub,
        iss: raw.iss,
        aud: raw.aud,
        username: raw.username,
        role: raw.role,
        uid: raw.uid,
    })
}

/// Compute the instant, epoch seconds, at which a fresh token should be
/// requested: `exp - 0.2 * (exp - iat)`, i.e. once 80% of the token's
/// lifetime has elapsed.
pub fn refresh_deadline(claims: &TokenClaims) -> i64 {
    let time_to_live = claims.exp - claims.iat;
    (claims.exp as f64 - time_to_live as f64 * (1.0 - FRACTION_OF_TTL)).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_jwt(payload: serde_json::Value) -> String {
        let header =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&serde_json::json!({"alg": "RS256", "typ": "JWT"})).unwrap());
        let body = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn test_decode_unverified_reads_iat_and_exp() {
        let token = encode_jwt(serde_json::json!({
            "iat": 1_000_000,
            "exp": 1_000_100,
            "sub": "user-1",
            "username": "admin",
        }));

        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.iat, 1_000_000);
        assert_eq!(claims.exp, 1_000_100);
        assert_eq!(claims.sub.as_deref(), Some("user-1"));
        assert_eq!(claims.username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_refresh_deadline_is_eighty_percent_of_ttl() {
        let token = encode_jwt(serde_json::json!({"iat": 1_000_000, "exp": 1_000_100}));
        let claims = decode_unverified(&token).unwrap();
        assert_eq!(refresh_deadline(&claims), 1_000_080);
    }

    #[test]
    fn test_decode_unverified_rejects_opaque_token() {
        assert!(matches!(
            decode_unverified("not-a-jwt"),
            Err(ClaimsError::Malformed)
        ));
    }

    #[test]
    fn test_decode_unverified_rejects_garbage_payload() {
        let result = decode_unverified("aGVhZGVy.!!!.signature");
        assert!(matches!(result, Err(ClaimsError::Base64(_))));
    }

    #[test]
    fn test_decode_unverified_requires_exp() {
        let token = encode_jwt(serde_json::json!({"iat": 1_000_000}));
        assert!(matches!(
            decode_unverified(&token),
            Err(ClaimsError::MissingClaim("exp"))
        ));
    }

    #[test]
    fn test_decode_unverified_accepts_padded_segments() {
        let header = STANDARD.encode(b"{\"alg\":\"RS256\"}");
        let body = STANDARD.encode(b"{\"iat\":10,\"exp\":110}");
        let token = format!("{header}.{body}.sig");

        let claims = decode_unverified(&token).unwrap();
        assert_eq!(refresh_deadline(&claims), 90);
    }
}
