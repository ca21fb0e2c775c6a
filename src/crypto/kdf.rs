use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use super::KEY_LEN;
use crate::error::{Result, VaultError};

/// Argon2id work parameters.
///
/// Envelopes do not record the parameters they were sealed with, so every
/// envelope in a store must be opened with [`KdfParams::STANDARD`]. Other
/// values only make sense for throwaway stores (tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    mem_cost_kib: u32,
    time_cost: u32,
    parallelism: u32,
}

impl KdfParams {
    pub const STANDARD: Self = Self {
        mem_cost_kib: 256 * 1024, // 256 MiB
        time_cost: 16,
        parallelism: 4,
    };

    pub fn new(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = Self {
            mem_cost_kib,
            time_cost,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn mem_cost_kib(&self) -> u32 {
        self.mem_cost_kib
    }

    pub fn time_cost(&self) -> u32 {
        self.time_cost
    }

    pub fn parallelism(&self) -> u32 {
        self.parallelism
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_cost < 1 {
            return Err(VaultError::KeyDerivation(
                "argon2 time cost must be >= 1".into(),
            ));
        }
        if self.parallelism < 1 {
            return Err(VaultError::KeyDerivation(
                "argon2 parallelism must be >= 1".into(),
            ));
        }
        if self
            .parallelism
            .checked_mul(8)
            .is_none_or(|min| self.mem_cost_kib < min)
        {
            return Err(VaultError::KeyDerivation(
                "argon2 memory cost must be at least 8 * parallelism".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn argon2(&self, output_len: usize) -> Result<Argon2<'static>> {
        self.validate()?;
        let params = Params::new(
            self.mem_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(output_len),
        )
        .map_err(|e| VaultError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Derive the 32-byte field key from a password and salt.
pub fn derive_key(password: &str, salt: &[u8], kdf: KdfParams) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    tracing::debug!(
        mem_cost_kib = kdf.mem_cost_kib,
        time_cost = kdf.time_cost,
        parallelism = kdf.parallelism,
        "deriving field key"
    );

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    kdf.argon2(KEY_LEN)?
        .hash_password_into(password.as_bytes(), salt, key.as_mut())
        .map_err(|e| VaultError::KeyDerivation(format!("argon2 key derivation failed: {e}")))?;

    Ok(key)
}
