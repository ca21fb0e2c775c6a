use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the vault core.
///
/// A wrong master password and a tampered envelope both surface as
/// [`VaultError::DecryptionFailed`].
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("master password must not be empty")]
    EmptyMasterPassword,

    #[error("master password is incorrect")]
    IncorrectMasterPassword,

    #[error("no master password set, run `vaultkeep master-password` first")]
    MasterPasswordNotSet,

    #[error("stored master password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("encrypted value is not a valid envelope")]
    InvalidEnvelopeFormat,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("invalid password or corrupted data")]
    DecryptionFailed,

    #[error(
        "no store at {}: run `vaultkeep master-password` to create one",
        .0.display()
    )]
    StoreNotFound(PathBuf),

    #[error("entry '{0}' not found")]
    NotFound(String),

    #[error("entry '{0}' already exists")]
    AlreadyExists(String),

    #[error(
        "store is locked ({}): run `vaultkeep remove-lock` only if no other vaultkeep process is running",
        .0.display()
    )]
    Locked(PathBuf),

    #[error("no lock file at {}", .0.display())]
    NoLock(PathBuf),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("OS random generator unavailable")]
    Random,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("store file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VaultError>;
