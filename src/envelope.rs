//! Text envelope for a single encrypted field.
//!
//! ```text
//! base64(SALT 64) * base64(NONCE 12) * base64(CIPHERTEXT + TAG)
//! ```
//!
//! Standard padded base64 never produces `*`, so the separator is
//! unambiguous. An envelope carries everything needed to open it except the
//! master password; the Argon2 parameters are the global
//! [`KdfParams::STANDARD`](crate::KdfParams::STANDARD).

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};
use zeroize::Zeroizing;

use crate::crypto::{self, KdfParams, NONCE_LEN, SALT_LEN};
use crate::error::{Result, VaultError};

pub const SEPARATOR: char = '*';

/// Parsed form of an envelope string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Ciphertext with the authentication tag appended.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            STANDARD.encode(self.salt),
            STANDARD.encode(self.nonce),
            STANDARD.encode(&self.ciphertext)
        )
    }
}

impl FromStr for Envelope {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let segments: Vec<&str> = s.split(SEPARATOR).collect();
        let [salt, nonce, ciphertext] = segments[..] else {
            return Err(VaultError::InvalidEnvelopeFormat);
        };

        let decode = |segment: &str| {
            STANDARD
                .decode(segment)
                .map_err(|_| VaultError::InvalidEnvelopeFormat)
        };

        let salt: [u8; SALT_LEN] = decode(salt)?
            .try_into()
            .map_err(|_| VaultError::InvalidEnvelopeFormat)?;
        let nonce: [u8; NONCE_LEN] = decode(nonce)?
            .try_into()
            .map_err(|_| VaultError::InvalidEnvelopeFormat)?;
        let ciphertext = decode(ciphertext)?;

        Ok(Self {
            salt,
            nonce,
            ciphertext,
        })
    }
}

/// Seals and opens individual fields under a master password.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec {
    kdf: KdfParams,
}

impl EnvelopeCodec {
    pub fn new(kdf: KdfParams) -> Self {
        Self { kdf }
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    /// Encrypt `plaintext` into a fresh envelope string.
    ///
    /// Salt and nonce are drawn anew on every call, so encrypting the same
    /// value twice never yields the same envelope.
    pub fn encrypt(&self, master_password: &str, plaintext: &str) -> Result<String> {
        if master_password.is_empty() {
            return Err(VaultError::EmptyMasterPassword);
        }

        let salt = crypto::generate_salt()?;
        let key = crypto::derive_key(master_password, &salt, self.kdf)?;

        let padded = crypto::pad(plaintext.as_bytes())?;
        let (ciphertext, nonce) = crypto::seal(&key, &padded)?;

        Ok(Envelope {
            salt,
            nonce,
            ciphertext,
        }
        .to_string())
    }

    /// Open an envelope string and strip its padding.
    pub fn decrypt(&self, master_password: &str, envelope: &str) -> Result<Zeroizing<String>> {
        let envelope: Envelope = envelope.parse()?;

        let key = crypto::derive_key(master_password, envelope.salt(), self.kdf)?;
        let padded = crypto::open(&key, envelope.nonce(), envelope.ciphertext())?;

        // authenticated bytes came from a &str; bad UTF-8 can only mean a
        // different writer, which is treated like any other failed open
        let plaintext = std::str::from_utf8(crypto::unpad(&padded))
            .map_err(|_| VaultError::DecryptionFailed)?;

        Ok(Zeroizing::new(plaintext.to_owned()))
    }
}
