//! AES-128-CBC credential decryption
//!
//! Contrabass encrypts sensitive provider attributes as
//! `base64(IV[16] ∥ AES-128-CBC(key, PKCS7-padded plaintext))` with a
//! 16-byte UTF-8 key.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const BLOCK_SIZE: usize = 16;

/// Errors that can occur while decrypting a Contrabass credential
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("encryption key must be {BLOCK_SIZE} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("ciphertext is not a multiple of the block size")]
    NotBlockAligned,

    #[error("invalid padding")]
    InvalidPadding,

    #[error("plaintext is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Decrypt `base64(IV ∥ ciphertext)` with AES-128-CBC and PKCS7 padding.
pub fn decrypt_aes_cbc(b64_cipher: &str, key: &str) -> Result<String, CryptoError> {
    let key = key.as_bytes();
    if key.len() != BLOCK_SIZE {
        return Err(CryptoError::InvalidKeyLength(key.len()));
    }

    let raw = BASE64.decode(b64_cipher)?;
    if raw.len() < BLOCK_SIZE {
        return Err(CryptoError::CiphertextTooShort);
    }
    let (iv, ct) = raw.split_at(BLOCK_SIZE);
    if ct.is_empty() || ct.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::NotBlockAligned);
    }

    let mut buf = ct.to_vec();
    let plain = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|_| CryptoError::InvalidKeyLength(key.len()))?
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| CryptoError::InvalidPadding)?;

    Ok(String::from_utf8(plain.to_vec())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockEncryptMut;

    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    fn encrypt(plain: &str, key: &str, iv: &[u8; BLOCK_SIZE]) -> String {
        let ct = Aes128CbcEnc::new_from_slices(key.as_bytes(), iv)
            .unwrap()
            .encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());
        let mut raw = iv.to_vec();
        raw.extend_from_slice(&ct);
        BASE64.encode(raw)
    }

    #[test]
    fn round_trips_arbitrary_plaintexts() {
        let key = "0123456789abcdef";
        let iv = [7u8; BLOCK_SIZE];
        for plain in ["", "p", "password", "exactly16bytes!!", "a much longer secret value"] {
            let b64 = encrypt(plain, key, &iv);
            assert_eq!(decrypt_aes_cbc(&b64, key).unwrap(), plain);
        }
    }

    #[test]
    fn rejects_wrong_key_length() {
        let err = decrypt_aes_cbc("aGVsbG8=", "short").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKeyLength(5)));
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let b64 = BASE64.encode([0u8; 8]);
        let err = decrypt_aes_cbc(&b64, "0123456789abcdef").unwrap_err();
        assert!(matches!(err, CryptoError::CiphertextTooShort));
    }

    #[test]
    fn rejects_unaligned_ciphertext() {
        let b64 = BASE64.encode([0u8; BLOCK_SIZE + 5]);
        let err = decrypt_aes_cbc(&b64, "0123456789abcdef").unwrap_err();
        assert!(matches!(err, CryptoError::NotBlockAligned));
    }

    #[test]
    fn decrypt_with_wrong_key_does_not_yield_plaintext() {
        let iv = [3u8; BLOCK_SIZE];
        let b64 = encrypt("password", "0123456789abcdef", &iv);
        match decrypt_aes_cbc(&b64, "fedcba9876543210") {
            Ok(plain) => assert_ne!(plain, "password"),
            Err(_) => {}
        }
    }
}
