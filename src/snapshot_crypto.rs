use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose, Engine as _};

use crate::errors::{ConsoleError, ConsoleResult};

const NONCE_LEN: usize = 12;

/// Seal `data` with AES-256-GCM. The random nonce is prepended to the
/// ciphertext.
pub fn seal(data: &[u8], key: &[u8; 32]) -> ConsoleResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|_| ConsoleError::crypto("encryption failed"))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(nonce.as_slice());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

pub fn open(sealed: &[u8], key: &[u8; 32]) -> ConsoleResult<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(ConsoleError::crypto("sealed value too short"));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ConsoleError::crypto("decryption failed"))
}

pub fn decode_base64_key(encoded_key: &str) -> ConsoleResult<[u8; 32]> {
    let decoded = general_purpose::STANDARD
        .decode(encoded_key.trim())
        .map_err(|_| ConsoleError::crypto("invalid base64"))?;
    if decoded.len() != 32 {
        return Err(ConsoleError::crypto("invalid key length"));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded);
    Ok(key)
}
