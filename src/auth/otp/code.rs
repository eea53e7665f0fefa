//! Code generation and at-rest hashing for OTP challenges.
//!
//! The plaintext code is the only secret guarding the channel, so it is
//! drawn from the OS CSPRNG, and only a salted hash ever reaches the
//! store.

use anyhow::{Context, Result};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::{Digest, Sha256};

pub(crate) const SALT_LEN: usize = 16;

/// Generate a fixed-length numeric code. Each digit is sampled
/// independently so the distribution is uniform for any length.
pub(crate) fn generate_code(length: usize) -> String {
    let mut code = String::with_capacity(length);
    for _ in 0..length {
        let digit: u8 = OsRng.gen_range(0..10);
        code.push(char::from(b'0' + digit));
    }
    code
}

/// Fresh random salt for a single challenge record.
pub(crate) fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate challenge salt")?;
    Ok(salt)
}

/// Salted one-way hash of a code. Verification recomputes the digest and
/// compares digests, never the code characters, so a mismatch leaks no
/// positional information.
pub(crate) fn hash_code(salt: &[u8], code: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(code.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_code_is_numeric_and_sized() {
        for length in [4, 6, 8] {
            let code = generate_code(length);
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_depends_on_salt_and_code() {
        let salt_a = [1u8; SALT_LEN];
        let salt_b = [2u8; SALT_LEN];
        assert_eq!(hash_code(&salt_a, "123456"), hash_code(&salt_a, "123456"));
        assert_ne!(hash_code(&salt_a, "123456"), hash_code(&salt_b, "123456"));
        assert_ne!(hash_code(&salt_a, "123456"), hash_code(&salt_a, "654321"));
    }

    #[test]
    fn salt_is_random() -> Result<()> {
        let first = generate_salt()?;
        let second = generate_salt()?;
        assert_ne!(first, second);
        Ok(())
    }
}
