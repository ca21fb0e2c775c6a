//! Length-hiding padding for sealed fields.
//!
//! Plaintexts shorter than [`PADDED_LEN`] bytes are extended to exactly
//! `PADDED_LEN` bytes: one NUL separator, then random printable filler. Every
//! short secret therefore produces a ciphertext of the same size. Longer
//! plaintexts are sealed as-is. This only hides lengths; it adds nothing to
//! confidentiality or integrity.
//!
//! Unpadding cuts at the first NUL, so a plaintext that itself contains a NUL
//! byte does not survive a round-trip. The store format has always assumed
//! secrets never contain NUL.

use zeroize::Zeroizing;

use super::secure_random;
use crate::error::Result;

/// Size, in bytes, every short plaintext is padded to.
pub const PADDED_LEN: usize = 512;

const SEPARATOR: u8 = 0x00;

/// Characters used for padding filler and generated passwords.
pub const ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!#$%&()*+,-./:;<=>?@[]^_{|}~";

/// Pad `plaintext` up to [`PADDED_LEN`] bytes.
pub fn pad(plaintext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut padded = Zeroizing::new(Vec::with_capacity(plaintext.len().max(PADDED_LEN)));
    padded.extend_from_slice(plaintext);

    if plaintext.len() < PADDED_LEN {
        padded.push(SEPARATOR);
        let filler = random_alphabet_bytes(PADDED_LEN - padded.len())?;
        padded.extend_from_slice(&filler);
    }

    Ok(padded)
}

/// Strip padding: everything from the first NUL onwards.
pub fn unpad(padded: &[u8]) -> &[u8] {
    match padded.iter().position(|&b| b == SEPARATOR) {
        Some(idx) => &padded[..idx],
        None => padded,
    }
}

/// Random string of `len` characters drawn uniformly from [`ALPHABET`].
pub fn random_printable(len: usize) -> Result<String> {
    let bytes = random_alphabet_bytes(len)?;
    // ALPHABET is ASCII
    Ok(bytes.iter().map(|&b| b as char).collect())
}

fn random_alphabet_bytes(len: usize) -> Result<Vec<u8>> {
    // largest multiple of the alphabet size that fits in a byte; anything
    // above it is rejected to keep the draw uniform
    let limit = 256 - (256 % ALPHABET.len());

    let mut out = Vec::with_capacity(len);
    let mut buf = [0u8; 64];
    while out.len() < len {
        secure_random(&mut buf)?;
        for &b in &buf {
            if (b as usize) < limit {
                out.push(ALPHABET[b as usize % ALPHABET.len()]);
                if out.len() == len {
                    break;
                }
            }
        }
    }

    Ok(out)
}
