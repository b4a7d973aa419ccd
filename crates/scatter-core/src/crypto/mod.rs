//! Per-chunk encryption engine.
//!
//! Wire format: `blob = IV(16 bytes) || ciphertext`, AES-256-CBC with
//! PKCS#7 padding, no additional framing. Every call to [`encrypt`] draws a
//! fresh random IV, so chunks are independent of each other: any single
//! chunk can be decrypted (or re-uploaded) without its neighbors.
//!
//! There is no authentication tag — a failed padding check is the only
//! per-chunk integrity signal, and it is a weak one (corruption elsewhere
//! in the ciphertext can go unnoticed). This is kept as-is for wire
//! compatibility; the pipeline records a whole-file SHA-256 for an
//! end-to-end check.

use aes::Aes256;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::CryptoError;
use crate::types::FileKey;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// IV length in bytes, prepended to every blob.
pub const IV_LEN: usize = 16;

/// AES block length in bytes; ciphertext is always a multiple of this.
pub const BLOCK_LEN: usize = 16;

/// Generate a fresh 256-bit file key from the OS secure random source.
pub fn generate_key() -> FileKey {
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    FileKey(key)
}

/// Encrypted size of a plaintext of `plain_len` bytes: IV plus the padded
/// ciphertext (PKCS#7 always appends at least one byte of padding).
pub fn encrypted_len(plain_len: usize) -> usize {
    IV_LEN + (plain_len / BLOCK_LEN + 1) * BLOCK_LEN
}

/// Worst-case overhead [`encrypt`] adds on top of the plaintext.
pub fn max_overhead() -> usize {
    IV_LEN + BLOCK_LEN
}

/// Encrypt one chunk under the file key with a fresh random IV.
pub fn encrypt(key: &FileKey, plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    blob
}

/// Decrypt one blob produced by [`encrypt`].
///
/// Fails with [`CryptoError::InvalidLength`] if the blob cannot even carry
/// an IV plus one cipher block, and with [`CryptoError::PaddingInvalid`]
/// when unpadding fails — a wrong key or corrupted bytes.
pub fn decrypt(key: &FileKey, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < IV_LEN {
        return Err(CryptoError::InvalidLength(blob.len()));
    }
    let (iv, ciphertext) = blob.split_at(IV_LEN);
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::InvalidLength(blob.len()));
    }

    let dec = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .map_err(|_| CryptoError::InvalidLength(blob.len()))?;
    dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::PaddingInvalid)
}
