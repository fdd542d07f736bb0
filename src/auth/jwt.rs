use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::{config::JwtConfig, state::AppState};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("token expiry is out of range")]
    ExpiryOutOfRange,
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// Signing and verification keys for one HMAC algorithm.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm: cfg.algorithm,
            ttl: Duration::seconds(cfg.ttl_hours.saturating_mul(3600)),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn issue(&self, user_id: i64, display_name: &str) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let exp = now
            .checked_add(self.ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let claims = Claims {
            sub: user_id.to_string(),
            name: display_name.to_string(),
            admin: false,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        let token = self.sign(&claims)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding).map_err(TokenError::Sign)
    }

    /// Checks signature, algorithm and expiry, then decodes the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            if matches!(e.kind(), ErrorKind::ExpiredSignature) {
                TokenError::Expired
            } else {
                TokenError::Invalid(e)
            }
        })?;
        debug!(sub = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

#[cfg(test)]
pub(crate) fn test_keys(secret: &str, algorithm: Algorithm) -> JwtKeys {
    test_keys_with_ttl(secret, algorithm, 72)
}

#[cfg(test)]
pub(crate) fn test_keys_with_ttl(secret: &str, algorithm: Algorithm, ttl_hours: i64) -> JwtKeys {
    JwtKeys::new(&JwtConfig {
        secret: secret.into(),
        algorithm,
        ttl_hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify_token() {
        let keys = test_keys("dev-secret", Algorithm::HS256);
        let token = keys.issue(7, "alice").expect("issue");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.user_id(), Some(7));
        assert_eq!(claims.name, "alice");
        assert!(!claims.admin);
    }

    #[test]
    fn token_expires_after_configured_ttl() {
        let keys = test_keys("dev-secret", Algorithm::HS256);
        let claims = keys.verify(&keys.issue(1, "bob").unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, 72 * 3600);
    }

    #[test]
    fn issue_reports_unrepresentable_expiry_instead_of_panicking() {
        for ttl_hours in [100_000_000, i64::MAX] {
            let keys = test_keys_with_ttl("dev-secret", Algorithm::HS256, ttl_hours);
            assert!(
                matches!(keys.issue(1, "a"), Err(TokenError::ExpiryOutOfRange)),
                "{ttl_hours}"
            );
        }
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = test_keys("dev-secret", Algorithm::HS256);
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let token = keys
            .sign(&Claims {
                sub: "1".into(),
                name: "old".into(),
                admin: false,
                iat: now - 7200,
                exp: now - 10,
            })
            .unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn verify_rejects_other_secret() {
        let good = test_keys("secret-a", Algorithm::HS256);
        let bad = test_keys("secret-b", Algorithm::HS256);
        let token = bad.issue(1, "mallory").unwrap();
        assert!(matches!(good.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn verify_rejects_other_algorithm_with_same_secret() {
        let hs256 = test_keys("shared", Algorithm::HS256);
        let hs512 = test_keys("shared", Algorithm::HS512);
        let token = hs512.issue(1, "alice").unwrap();
        assert!(matches!(hs256.verify(&token), Err(TokenError::Invalid(_))));
        let token = hs256.issue(1, "alice").unwrap();
        assert!(matches!(hs512.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn verify_rejects_garbage_and_tampered_tokens() {
        let keys = test_keys("dev-secret", Algorithm::HS256);
        assert!(keys.verify("not.a.jwt").is_err());
        assert!(keys.verify("").is_err());

        // payload of one token spliced onto another token's signature
        let forged = keys.issue(2, "alice").unwrap();
        let token = keys.issue(1, "alice").unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged.split('.').nth(1).unwrap();
        assert!(keys.verify(&parts.join(".")).is_err());
    }

    #[test]
    fn verify_rejects_claims_with_wrong_schema() {
        #[derive(serde::Serialize)]
        struct Other {
            sub: u64,
            exp: i64,
        }
        let keys = test_keys("dev-secret", Algorithm::HS256);
        let exp = OffsetDateTime::now_utc().unix_timestamp() + 600;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Other { sub: 1, exp },
            &EncodingKey::from_secret(b"dev-secret"),
        )
        .unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Invalid(_))));
    }
}
