use argon2::password_hash::{PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, Version};
use rand_core::OsRng;
use tracing::instrument;

use crate::error::OtpError;

/// Argon2id hashing shared by account passwords and OTP codes.
#[derive(Debug, Clone)]
pub struct CryptoService {
    params: Params,
}

impl CryptoService {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, OtpError> {
        let params = Params::new(memory_kib, iterations, parallelism, None).map_err(|e| {
            OtpError::Configuration(format!("Failed to create Argon2 params: {e}"))
        })?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    #[instrument(skip(self, secret))]
    pub fn hash_secret(&self, secret: &str) -> Result<String, OtpError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon2()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| OtpError::Hashing(format!("Failed to hash secret: {e}")))?
            .to_string();

        Ok(hash)
    }

    #[instrument(skip(self, secret, hash))]
    pub fn verify_secret(&self, secret: &str, hash: &str) -> Result<bool, OtpError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| OtpError::Hashing(format!("Invalid hash format: {e}")))?;

        // Cost parameters come from the PHC string, so hashes made with older params still verify.
        match self.argon2().verify_password(secret.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(OtpError::Hashing(format!("Verification failed: {e}"))),
        }
    }

    /// [`hash_secret`](Self::hash_secret) on the blocking pool, keeping the request worker free.
    pub async fn spawn_hash(&self, secret: String) -> Result<String, OtpError> {
        let crypto = self.clone();
        tokio::task::spawn_blocking(move || crypto.hash_secret(&secret))
            .await
            .map_err(|e| OtpError::Hashing(format!("Hashing task failed: {e}")))?
    }

    /// [`verify_secret`](Self::verify_secret) on the blocking pool.
    pub async fn spawn_verify(&self, secret: String, hash: String) -> Result<bool, OtpError> {
        let crypto = self.clone();
        tokio::task::spawn_blocking(move || crypto.verify_secret(&secret, &hash))
            .await
            .map_err(|e| OtpError::Hashing(format!("Verification task failed: {e}")))?
    }
}

#[cfg(test)]
pub(crate) fn test_crypto() -> CryptoService {
    CryptoService::new(64, 1, 1).expect("valid test params")
}
