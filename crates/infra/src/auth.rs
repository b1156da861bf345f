use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credential: {0}")]
    InvalidCredential(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// The identity gate: verifies a bearer credential and yields a stable
/// user id. Credential issuance lives outside this core; this side
/// only checks HS256 signatures and expiry.
#[derive(Clone)]
pub struct IdentityGate {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl IdentityGate {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    fn token(secret: &str, sub: &str, exp_offset_secs: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_secs() as i64;
        let claims = TestClaims {
            sub: sub.to_string(),
            exp: (now + exp_offset_secs).max(0) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("token")
    }

    #[test]
    fn verify_accepts_valid_token_and_yields_subject() {
        let gate = IdentityGate::new("test-secret");
        let user_id = gate
            .verify(&token("test-secret", "user-123", 3600))
            .expect("verify");
        assert_eq!(user_id, "user-123");
    }

    #[test]
    fn verify_rejects_bad_signature_and_expired_tokens() {
        let gate = IdentityGate::new("test-secret");
        assert!(gate.verify(&token("wrong-secret", "user-123", 3600)).is_err());
        assert!(gate.verify(&token("test-secret", "user-123", -3600)).is_err());
        assert!(gate.verify("not-a-token").is_err());
    }
}
