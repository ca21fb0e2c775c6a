//! Cryptographic primitives for the vault.
//!
//! Provides key derivation, authenticated encryption and the length-hiding
//! padding applied to every sensitive field before it is sealed.

pub mod aead;
pub mod kdf;
pub mod padding;

pub use aead::{generate_salt, open, seal, secure_random};
pub use kdf::{KdfParams, derive_key};
pub use padding::{PADDED_LEN, pad, random_printable, unpad};

/// Length of the per-envelope salt (64 bytes).
pub const SALT_LEN: usize = 64;
/// Length of the nonce (12 bytes for AES-256-GCM).
pub const NONCE_LEN: usize = 12;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the GCM authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;
