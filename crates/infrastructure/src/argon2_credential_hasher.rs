//! Argon2id credential hashing with login timing equalization.

use std::sync::{Arc, OnceLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{Error as HashError, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use tracing::warn;

use gatehouse_application::PasswordHasher as PasswordHasherPort;
use gatehouse_core::{AppError, AppResult};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory per hash in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl HashCost {
    /// OWASP password storage baseline: 19 MiB, two passes, one lane.
    pub const OWASP: Self = Self {
        memory_kib: 19_456,
        iterations: 2,
        parallelism: 1,
    };

    fn params(self) -> AppResult<Params> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|error| AppError::Validation(format!("invalid argon2 cost: {error}")))
    }
}

/// Argon2id hasher for subject credentials.
///
/// Holds a lazily built decoy hash with the same cost, verified against
/// when a login has no stored credential.
#[derive(Clone)]
pub struct Argon2CredentialHasher {
    argon2: Argon2<'static>,
    decoy: Arc<OnceLock<Option<String>>>,
}

impl Argon2CredentialHasher {
    /// Creates a hasher with [`HashCost::OWASP`].
    #[must_use]
    pub fn new() -> Self {
        let params = HashCost::OWASP.params().unwrap_or_else(|_| Params::default());
        Self::from_params(params)
    }

    /// Creates a hasher with explicit cost parameters.
    pub fn with_cost(cost: HashCost) -> AppResult<Self> {
        Ok(Self::from_params(cost.params()?))
    }

    fn from_params(params: Params) -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy: Arc::new(OnceLock::new()),
        }
    }

    fn decoy_hash(&self) -> Option<&str> {
        self.decoy
            .get_or_init(|| match self.hash_password("gatehouse decoy credential") {
                Ok(hash) => Some(hash),
                Err(error) => {
                    warn!(error = %error, "failed to build decoy credential hash");
                    None
                }
            })
            .as_deref()
    }
}

impl Default for Argon2CredentialHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasherPort for Argon2CredentialHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let stored = PasswordHash::new(hash).map_err(|error| {
            AppError::Internal(format!("stored credential is not a PHC string: {error}"))
        })?;

        // The stored hash carries its own cost, so older credentials verify
        // after a cost change.
        match self.argon2.verify_password(password.as_bytes(), &stored) {
            Ok(()) => Ok(true),
            Err(HashError::Password) => Ok(false),
            Err(error) => Err(AppError::Internal(format!(
                "credential verification failed: {error}"
            ))),
        }
    }

    fn equalize_timing(&self, password: &str) {
        if let Some(decoy) = self.decoy_hash() {
            let _ = self.verify_password(password, decoy);
        }
    }
}
