//! Signed access tokens
//!
//! Token layout: `base64url(claims_json) "." hex(sha256(canonical(claims) || secret))`
//!
//! The signature is computed over the canonical form of the claims (sorted
//! keys, no whitespace) so that re-serialization on the verifying side
//! cannot change the digest.

use super::password::constant_time_eq;
use super::roles::Role;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub company_id: Uuid,
    pub role: Role,
    /// Issued-at, Unix seconds
    pub iat: i64,
    /// Expiry, Unix seconds
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, company_id: Uuid, role: Role, issued_at: i64, ttl_secs: i64) -> Self {
        Self {
            sub: user_id,
            company_id,
            role,
            iat: issued_at,
            exp: issued_at + ttl_secs,
        }
    }
}

/// Token verification failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not two dot-separated parts, bad base64 or bad JSON
    Malformed(String),
    /// Signature does not match the claims
    InvalidSignature,
    /// Token past its expiry
    Expired { exp: i64, now: i64 },
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed(reason) => write!(f, "Malformed token: {}", reason),
            TokenError::InvalidSignature => write!(f, "Invalid token signature"),
            TokenError::Expired { exp, now } => {
                write!(f, "Token expired {}s ago", now - exp)
            }
        }
    }
}

impl std::error::Error for TokenError {}

impl From<TokenError> for crate::Error {
    fn from(err: TokenError) -> Self {
        crate::Error::Unauthorized(err.to_string())
    }
}

/// Issue a token for the given claims
pub fn issue_token(claims: &Claims, secret: &str) -> String {
    let value = serde_json::to_value(claims).unwrap_or(Value::Null);
    let canonical = to_canonical_json(&value);
    let payload = URL_SAFE_NO_PAD.encode(canonical.as_bytes());
    format!("{}.{}", payload, sign(&canonical, secret))
}

/// Verify signature and expiry, returning the claims
pub fn verify_token(token: &str, secret: &str, now: i64) -> Result<Claims, TokenError> {
    let (payload, signature) = token
        .split_once('.')
        .ok_or_else(|| TokenError::Malformed("missing signature".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Malformed(format!("payload is not base64url: {}", e)))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("payload is not JSON: {}", e)))?;

    let calculated = sign(&to_canonical_json(&value), secret);
    if !constant_time_eq(calculated.as_bytes(), signature.as_bytes()) {
        return Err(TokenError::InvalidSignature);
    }

    let claims: Claims = serde_json::from_value(value)
        .map_err(|e| TokenError::Malformed(format!("unexpected claims: {}", e)))?;

    if now >= claims.exp {
        return Err(TokenError::Expired { exp: claims.exp, now });
    }

    Ok(claims)
}

/// SHA-256 over the canonical claims followed by the secret, as hex
fn sign(canonical: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Convert JSON to canonical form (sorted keys, no whitespace)
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-0123456789";

    fn claims() -> Claims {
        Claims::new(Uuid::new_v4(), Uuid::new_v4(), Role::Recruiter, 1_700_000_000, 3600)
    }

    #[test]
    fn test_issue_then_verify() {
        let claims = claims();
        let token = issue_token(&claims, SECRET);
        let verified = verify_token(&token, SECRET, claims.iat + 10).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = claims();
        let token = issue_token(&claims, SECRET);
        let err = verify_token(&token, "another-secret-987654", claims.iat).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn test_tampered_role_rejected() {
        let claims = claims();
        let token = issue_token(&claims, SECRET);
        let (_, signature) = token.split_once('.').unwrap();

        let mut forged = claims.clone();
        forged.role = Role::Admin;
        let forged_json = to_canonical_json(&serde_json::to_value(&forged).unwrap());
        let forged_token = format!("{}.{}", URL_SAFE_NO_PAD.encode(forged_json), signature);

        assert_eq!(
            verify_token(&forged_token, SECRET, claims.iat).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = claims();
        let token = issue_token(&claims, SECRET);
        let err = verify_token(&token, SECRET, claims.exp).unwrap_err();
        assert!(matches!(err, TokenError::Expired { .. }));
    }

    #[test]
    fn test_malformed_tokens() {
        assert!(matches!(
            verify_token("no-dot-here", SECRET, 0),
            Err(TokenError::Malformed(_))
        ));
        assert!(matches!(
            verify_token("!!!.abc", SECRET, 0),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_canonical_json_sorting() {
        let json = serde_json::json!({"z": 3, "a": {"y": [1, 2], "b": "x\"y"}, "m": null});
        assert_eq!(
            to_canonical_json(&json),
            r#"{"a":{"b":"x\"y","y":[1,2]},"m":null,"z":3}"#
        );
    }
}
