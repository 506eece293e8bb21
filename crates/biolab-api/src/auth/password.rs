/// Password hashing and verification using scrypt
///
/// Stored values have the form `hex(key) + "." + hex(salt)`:
/// - Algorithm: scrypt (N = 2^14, r = 8, p = 1 by default)
/// - Salt: 16 random bytes, fresh for every hash; its lowercase hex text is
///   what the KDF consumes, so values written by earlier deployments verify
///   unchanged
/// - Output: 64-byte derived key
///
/// Derivation is CPU-bound and runs on the blocking pool.
use biolab_core::PasswordConfig;
use rand::RngCore;
use scrypt::Params;
use thiserror::Error;

/// Derived key length in bytes
pub const KEY_LEN: usize = 64;

/// Random salt length in bytes
pub const SALT_LEN: usize = 16;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid scrypt parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

/// Hashes and verifies passwords with a fixed scrypt cost
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Well-formed value that never matches; verified against when the user
    /// is unknown so both failure paths pay for one derivation
    dummy: String,
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(config.log_n, config.r, config.p, KEY_LEN)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            params,
            dummy: format!("{}.{}", "0".repeat(KEY_LEN * 2), "0".repeat(SALT_LEN * 2)),
        })
    }

    /// Hash a password with a fresh random salt
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let params = self.params;
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hash_with_params(&password, &params))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?
    }

    /// Check a supplied password against a stored `hash.salt` value
    pub async fn verify(&self, password: &str, stored: &str) -> Result<bool, PasswordError> {
        let params = self.params;
        let password = password.to_owned();
        let stored = stored.to_owned();
        tokio::task::spawn_blocking(move || verify_with_params(&password, &stored, &params))
            .await
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Spend one derivation without a stored value to compare against
    pub async fn burn(&self, password: &str) -> Result<(), PasswordError> {
        let dummy = self.dummy.clone();
        self.verify(password, &dummy).await.map(|_| ())
    }
}

/// Hash a password synchronously with the given parameters
pub fn hash_with_params(password: &str, params: &Params) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);

    let key = derive_key(password, &salt_hex, params)?;
    Ok(format!("{}.{}", hex::encode(key), salt_hex))
}

/// Verify synchronously; malformed stored values never match
pub fn verify_with_params(password: &str, stored: &str, params: &Params) -> bool {
    let Some((key_hex, salt)) = stored.split_once('.') else {
        return false;
    };
    if salt.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(key_hex) else {
        return false;
    };

    match derive_key(password, salt, params) {
        Ok(derived) => expected.len() == derived.len() && constant_time_eq(&expected, &derived),
        Err(_) => false,
    }
}

fn derive_key(password: &str, salt: &str, params: &Params) -> Result<[u8; KEY_LEN], PasswordError> {
    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(password.as_bytes(), salt.as_bytes(), params, &mut key)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
    Ok(key)
}

/// Compare two byte slices without short-circuiting on the first difference
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cheap_params() -> Params {
        Params::new(4, 8, 1, KEY_LEN).unwrap()
    }

    fn is_lower_hex(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
    }

    #[test]
    fn test_hash_format() {
        let stored = hash_with_params("Secr3t!", &cheap_params()).unwrap();
        let (key, salt) = stored.split_once('.').unwrap();

        assert_eq!(key.len(), KEY_LEN * 2);
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert!(is_lower_hex(key));
        assert!(is_lower_hex(salt));
    }

    #[test]
    fn test_hash_and_verify_password() {
        let params = cheap_params();
        let stored = hash_with_params("Secr3t!", &params).unwrap();

        assert!(verify_with_params("Secr3t!", &stored, &params));
        assert!(!verify_with_params("wrong", &stored, &params));
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        let params = cheap_params();
        let hash1 = hash_with_params("SamePassword", &params).unwrap();
        let hash2 = hash_with_params("SamePassword", &params).unwrap();

        assert_ne!(hash1, hash2);
        assert!(verify_with_params("SamePassword", &hash1, &params));
        assert!(verify_with_params("SamePassword", &hash2, &params));
    }

    #[test]
    fn test_malformed_stored_values() {
        let params = cheap_params();
        assert!(!verify_with_params("x", "no-separator", &params));
        assert!(!verify_with_params("x", "zzzz.abcd", &params));
        assert!(!verify_with_params("x", "abcd.", &params));
        // Well-formed but truncated key
        assert!(!verify_with_params("x", "abcd.0011", &params));
    }

    #[test]
    fn test_known_vector_from_default_cost() {
        // Salt text is fed to the KDF as-is, not hex-decoded
        let params = Params::new(14, 8, 1, KEY_LEN).unwrap();
        let salt = "00112233445566778899aabbccddeeff";
        let key = derive_key("pw", salt, &params).unwrap();
        let stored = format!("{}.{}", hex::encode(key), salt);
        assert!(verify_with_params("pw", &stored, &params));
        assert!(!verify_with_params("pw ", &stored, &params));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let config = PasswordConfig {
            log_n: 14,
            r: 0,
            p: 1,
        };
        assert!(matches!(
            PasswordHasher::new(&config),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_hasher_async_round_trip() {
        let hasher = PasswordHasher::new(&PasswordConfig {
            log_n: 4,
            r: 8,
            p: 1,
        })
        .unwrap();

        let stored = hasher.hash("Secr3t!").await.unwrap();
        assert!(hasher.verify("Secr3t!", &stored).await.unwrap());
        assert!(!hasher.verify("Secr3t", &stored).await.unwrap());
        hasher.burn("anything").await.unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_verify_accepts_own_hash(password in ".{0,32}") {
            let params = cheap_params();
            let stored = hash_with_params(&password, &params).unwrap();
            prop_assert!(verify_with_params(&password, &stored, &params));
        }

        #[test]
        fn prop_verify_rejects_other_password(a in "[a-zA-Z0-9!]{1,16}", b in "[a-zA-Z0-9!]{1,16}") {
            prop_assume!(a != b);
            let params = cheap_params();
            let stored = hash_with_params(&b, &params).unwrap();
            prop_assert!(!verify_with_params(&a, &stored, &params));
        }
    }
}
