//! Cheap stand-ins for the crypto services in tests.

use time::{Duration, OffsetDateTime};

use crate::auth::jwt::{CredentialIssuer, TokenError, VerifiedToken};
use crate::auth::password::{PasswordError, PasswordHasher};

/// Tokens are just `fake:<subject>`.
pub struct FakeIssuer;

impl CredentialIssuer for FakeIssuer {
    fn issue(&self, subject: &str) -> Result<String, TokenError> {
        Ok(format!("fake:{subject}"))
    }

    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let subject = token.strip_prefix("fake:").ok_or(TokenError::Invalid)?;
        let now = OffsetDateTime::now_utc();
        Ok(VerifiedToken {
            subject: subject.to_string(),
            issued_at: now,
            expires_at: now + Duration::minutes(5),
        })
    }
}

/// Stores passwords reversibly so tests avoid the 64 MiB argon2 cost.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn generate(&self) -> Result<String, PasswordError> {
        Ok("generated-password".into())
    }

    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(format!("plain${password}"))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let stored = hash.strip_prefix("plain$").ok_or(PasswordError::Decoding)?;
        Ok(stored == password)
    }
}
