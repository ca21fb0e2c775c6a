//! Master password verification and rotation.
//!
//! The store keeps an Argon2id digest of the master password as a PHC
//! string:
//!
//! ```text
//! $argon2id$v=19$m=262144,t=16,p=4$<salt>$<hash>
//! ```
//!
//! with unpadded standard base64 for salt and hash. The salt is 64 bytes,
//! longer than the `password-hash` crate's `SaltString` accepts, so the
//! string is parsed here and verified with a raw Argon2 derivation.

use std::fmt;
use std::str::FromStr;

use argon2::password_hash::Output;
use base64::{Engine, engine::general_purpose::STANDARD_NO_PAD};
use zeroize::Zeroizing;

use crate::crypto::{self, KEY_LEN, KdfParams, SALT_LEN};
use crate::envelope::EnvelopeCodec;
use crate::error::{Result, VaultError};
use crate::storage::Storage;
use crate::store::Entry;

const ALGORITHM: &str = "argon2id";
const VERSION: u32 = 0x13;

/// Parsed master password digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordDigest {
    kdf: KdfParams,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl PasswordDigest {
    /// Hashes `password` under a fresh random salt.
    pub fn create(password: &str, kdf: KdfParams) -> Result<Self> {
        let salt = crypto::generate_salt()?;
        let hash = derive(password, &salt, kdf, KEY_LEN)?;
        Ok(Self {
            kdf,
            salt: salt.to_vec(),
            hash: hash.to_vec(),
        })
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    /// Constant-time check of `candidate` against this digest, using the
    /// parameters and salt embedded in it.
    pub fn verify(&self, candidate: &str) -> Result<bool> {
        let computed = derive(candidate, &self.salt, self.kdf, self.hash.len())?;

        let to_output =
            |bytes: &[u8]| Output::new(bytes).map_err(|e| VaultError::MalformedHash(e.to_string()));
        let expected = to_output(&self.hash)?;
        let computed = to_output(&computed)?;

        // Output's PartialEq is constant-time
        Ok(expected == computed)
    }
}

fn derive(password: &str, salt: &[u8], kdf: KdfParams, len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let mut out = Zeroizing::new(vec![0u8; len]);
    kdf.argon2(len)?
        .hash_password_into(password.as_bytes(), salt, &mut out)
        .map_err(|e| VaultError::KeyDerivation(format!("argon2 hashing failed: {e}")))?;
    Ok(out)
}

impl fmt::Display for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${ALGORITHM}$v={VERSION}$m={},t={},p={}${}${}",
            self.kdf.mem_cost_kib(),
            self.kdf.time_cost(),
            self.kdf.parallelism(),
            STANDARD_NO_PAD.encode(&self.salt),
            STANDARD_NO_PAD.encode(&self.hash)
        )
    }
}

impl FromStr for PasswordDigest {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = |what: &str| VaultError::MalformedHash(what.to_string());

        let parts: Vec<&str> = s.split('$').collect();
        let ["", algorithm, version, params, salt, hash] = parts[..] else {
            return Err(malformed("expected 5 '$'-separated fields"));
        };

        if algorithm != ALGORITHM {
            return Err(malformed("unsupported algorithm"));
        }
        if version != format!("v={VERSION}") {
            return Err(malformed("unsupported argon2 version"));
        }

        let (mut m, mut t, mut p) = (None, None, None);
        for pair in params.split(',') {
            let (key, value) = pair.split_once('=').ok_or_else(|| malformed("bad parameter"))?;
            let value: u32 = value.parse().map_err(|_| malformed("bad parameter value"))?;
            match key {
                "m" => m = Some(value),
                "t" => t = Some(value),
                "p" => p = Some(value),
                _ => return Err(malformed("unknown parameter")),
            }
        }
        let (Some(m), Some(t), Some(p)) = (m, t, p) else {
            return Err(malformed("missing parameter"));
        };
        let kdf = KdfParams::new(m, t, p).map_err(|_| malformed("invalid parameters"))?;

        let salt = STANDARD_NO_PAD
            .decode(salt)
            .map_err(|_| malformed("salt is not base64"))?;
        let hash = STANDARD_NO_PAD
            .decode(hash)
            .map_err(|_| malformed("hash is not base64"))?;
        if salt.len() < 8 || hash.len() < 10 {
            return Err(malformed("salt or hash too short"));
        }

        Ok(Self { kdf, salt, hash })
    }
}

/// Master password lifecycle for one store.
///
/// ```text
/// Unset --set("", new)--> Set --set(old, new)--> Set (entries re-encrypted)
/// ```
pub struct MasterPasswordManager<'a> {
    storage: &'a Storage,
    codec: EnvelopeCodec,
}

impl<'a> MasterPasswordManager<'a> {
    pub fn new(storage: &'a Storage, codec: EnvelopeCodec) -> Self {
        Self { storage, codec }
    }

    pub fn is_set(&self) -> Result<bool> {
        Ok(!self.storage.load()?.master_password_hash().is_empty())
    }

    /// `Ok(false)` for a wrong password; errors only for an unreadable store,
    /// a malformed digest or a store without a master password.
    pub fn is_correct(&self, candidate: &str) -> Result<bool> {
        let store = self.storage.load()?;
        verify_stored(store.master_password_hash(), candidate)
    }

    /// Sets the first master password (`old` empty) or rotates it.
    ///
    /// A rotation re-encrypts every entry's id and password. If any of them
    /// cannot be opened with `old`, nothing is written.
    pub fn set_master_password(&self, old: &str, new: &str) -> Result<()> {
        if new.is_empty() {
            return Err(VaultError::EmptyMasterPassword);
        }

        let mut store = self.storage.load()?;
        let current = store.master_password_hash();

        if old.is_empty() {
            // the initial transition happens once; afterwards the old
            // password is required
            if !current.is_empty() {
                return Err(VaultError::IncorrectMasterPassword);
            }
        } else if !verify_stored(current, old)? {
            return Err(VaultError::IncorrectMasterPassword);
        }

        let digest = PasswordDigest::create(new, self.codec.kdf())?;

        if !old.is_empty() {
            tracing::info!(entries = store.len(), "re-encrypting entries with new master password");
            let rotated = rotate_entries(&self.codec, store.entries(), old, new)?;
            store.replace_entries(rotated);
            tracing::info!("re-encryption done");
        }

        store.set_master_password_hash(digest.to_string());
        self.storage.save(&store)
    }
}

fn verify_stored(stored: &str, candidate: &str) -> Result<bool> {
    if stored.is_empty() {
        return Err(VaultError::MasterPasswordNotSet);
    }
    stored.parse::<PasswordDigest>()?.verify(candidate)
}

/// Re-encrypts the sensitive fields of `entries` from `old` to `new`.
///
/// Works on copies: the caller only sees the result if every entry
/// succeeded.
pub fn rotate_entries(
    codec: &EnvelopeCodec,
    entries: &[Entry],
    old: &str,
    new: &str,
) -> Result<Vec<Entry>> {
    entries
        .iter()
        .map(|entry| {
            let id = codec.decrypt(old, &entry.id)?;
            let password = codec.decrypt(old, &entry.password)?;
            Ok(Entry {
                id: codec.encrypt(new, &id)?,
                password: codec.encrypt(new, &password)?,
                ..entry.clone()
            })
        })
        .collect()
}
