use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Lifetime of every issued token.
pub const TOKEN_TTL: Duration = Duration::days(20);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token service is not configured: {0}")]
    Configuration(String),
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// JWT payload. The subject is also written to `iss`, which is where older
/// tokens carried the user's email.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    iss: String,
    #[serde(default)]
    iat: i64,
    exp: i64,
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Issues and verifies bearer tokens.
pub trait CredentialIssuer: Send + Sync {
    fn issue(&self, subject: &str) -> Result<String, TokenError>;
    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError>;
}

/// HS256 token service keyed by `JWT_SECRET`.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Configuration("JWT_SECRET is not set".into()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: TOKEN_TTL,
        })
    }

    #[cfg(test)]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // clock skew is not compensated
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        validation
    }
}

impl CredentialIssuer for JwtService {
    fn issue(&self, subject: &str) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let exp = now + self.ttl;
        let claims = Claims {
            sub: subject.to_string(),
            iss: subject.to_string(),
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &Self::validation()).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        let Claims { sub, iss, iat, exp } = data.claims;

        // jsonwebtoken still accepts exp == now; a token is only valid before it
        if exp <= OffsetDateTime::now_utc().unix_timestamp() {
            return Err(TokenError::Expired);
        }

        let subject = if sub.is_empty() { iss } else { sub };
        if subject.is_empty() {
            return Err(TokenError::Invalid);
        }
        let issued_at = OffsetDateTime::from_unix_timestamp(iat).map_err(|_| TokenError::Invalid)?;
        let expires_at = OffsetDateTime::from_unix_timestamp(exp).map_err(|_| TokenError::Invalid)?;

        Ok(VerifiedToken {
            subject,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("dev-secret").expect("secret set")
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let svc = service();
        let token = svc.issue("user@example.com").expect("sign");
        let verified = svc.verify(&token).expect("verify");
        assert_eq!(verified.subject, "user@example.com");
        assert_eq!(verified.expires_at - verified.issued_at, TOKEN_TTL);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let svc = service().with_ttl(Duration::minutes(-5));
        let token = svc.issue("user@example.com").unwrap();
        let err = svc.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Expired), "got {err:?}");
    }

    #[test]
    fn token_is_expired_at_its_expiry_second() {
        let svc = service().with_ttl(Duration::ZERO);
        let token = svc.issue("a@b.com").unwrap();
        let err = svc.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Expired), "got {err:?}");
    }

    #[test]
    fn flipped_signature_is_invalid() {
        let svc = service();
        let token = svc.issue("user@example.com").unwrap();
        let (head, sig) = token.rsplit_once('.').unwrap();

        // the first signature char maps to six full bits, so this always
        // changes the decoded bytes
        let mut sig: Vec<char> = sig.chars().collect();
        sig[0] = if sig[0] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{head}.{}", sig.into_iter().collect::<String>());

        let err = svc.verify(&tampered).unwrap_err();
        assert!(matches!(err, TokenError::Invalid), "got {err:?}");
    }

    #[test]
    fn token_from_other_secret_is_invalid() {
        let token = JwtService::new("other-secret").unwrap().issue("a@b.com").unwrap();
        let err = service().verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[test]
    fn garbage_is_invalid() {
        let err = service().verify("invalid.token.string").unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[test]
    fn legacy_issuer_only_token_is_accepted() {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let legacy = serde_json::json!({ "iss": "old@example.com", "iat": now, "exp": now + 60 });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &legacy,
            &EncodingKey::from_secret(b"dev-secret"),
        )
        .unwrap();
        assert_eq!(service().verify(&token).unwrap().subject, "old@example.com");
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let err = JwtService::new("").err().expect("empty secret must fail");
        assert!(matches!(err, TokenError::Configuration(_)));
    }
}
