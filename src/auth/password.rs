use argon2::{password_hash::Output, Algorithm, Argon2, Params, Version};
use base64ct::{Base64Unpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

// generated passwords are not handed out by any RPC yet
#[allow(dead_code)]
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%&*=+?/";
#[allow(dead_code)]
const GENERATED_LEN: usize = 16;

// Argon2id parameters. Changing any of them invalidates every stored hash.
const TIME_COST: u32 = 1;
const MEMORY_COST_KIB: u32 = 64 * 1024;
const PARALLELISM: u32 = 4;
const OUTPUT_LEN: usize = 32;

/// Minimum salt length accepted by Argon2.
pub const MIN_SALT_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing is not configured: {0}")]
    Configuration(String),
    #[allow(dead_code)]
    #[error("random source unavailable: {0}")]
    RandomSource(String),
    #[error("stored password hash is not valid base64")]
    Decoding,
    #[error("argon2 failure: {0}")]
    Hashing(String),
}

/// Password operations used by the RPC handlers.
pub trait PasswordHasher: Send + Sync {
    /// Random password of 16 characters from a fixed 73-symbol alphabet.
    #[allow(dead_code)]
    fn generate(&self) -> Result<String, PasswordError>;
    /// Unpadded base64 of the Argon2id digest of `password`.
    fn hash(&self, password: &str) -> Result<String, PasswordError>;
    /// Recomputes the digest and compares it with `hash` in constant time.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}

/// Argon2id hasher keyed by one application-wide salt.
///
/// The salt is shared by every user. A per-user salt would be stronger but
/// would break compatibility with hashes already stored.
#[derive(Clone)]
pub struct PasswordService {
    salt: Vec<u8>,
    params: Params,
}

impl PasswordService {
    pub fn new(salt: impl Into<Vec<u8>>) -> Result<Self, PasswordError> {
        let salt = salt.into();
        if salt.is_empty() {
            return Err(PasswordError::Configuration("ENCRYPT_SALT is not set".into()));
        }
        if salt.len() < MIN_SALT_LEN {
            return Err(PasswordError::Configuration(format!(
                "ENCRYPT_SALT must be at least {MIN_SALT_LEN} bytes"
            )));
        }
        let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(OUTPUT_LEN))
            .map_err(|e| PasswordError::Configuration(e.to_string()))?;
        Ok(Self { salt, params })
    }

    fn digest(&self, password: &str) -> Result<[u8; OUTPUT_LEN], PasswordError> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut out = [0u8; OUTPUT_LEN];
        argon2
            .hash_password_into(password.as_bytes(), &self.salt, &mut out)
            .map_err(|e| PasswordError::Hashing(e.to_string()))?;
        Ok(out)
    }
}

impl PasswordHasher for PasswordService {
    fn generate(&self) -> Result<String, PasswordError> {
        // Rejection sampling keeps the distribution uniform: 219 is the
        // largest multiple of 73 that fits in a byte.
        let limit = (u8::MAX as usize + 1) / CHARSET.len() * CHARSET.len();
        let mut password = String::with_capacity(GENERATED_LEN);
        let mut buf = [0u8; 32];

        while password.len() < GENERATED_LEN {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| PasswordError::RandomSource(e.to_string()))?;
            for &b in buf.iter().filter(|&&b| (b as usize) < limit) {
                if password.len() == GENERATED_LEN {
                    break;
                }
                password.push(CHARSET[b as usize % CHARSET.len()] as char);
            }
        }
        Ok(password)
    }

    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let digest = self.digest(password)?;
        Ok(Base64Unpadded::encode_string(&digest))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let stored = Base64Unpadded::decode_vec(hash).map_err(|_| PasswordError::Decoding)?;
        let computed = self.digest(password)?;

        // Output's PartialEq is constant-time. A stored value of the wrong
        // length cannot match anyway.
        let (Ok(stored), Ok(computed)) = (Output::new(&stored), Output::new(&computed)) else {
            return Ok(false);
        };
        Ok(stored == computed)
    }
}
