use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use serde_json::Value;
use sha2::Sha256;

use crate::{Error, Result};

/// AES-256-GCM key length in bytes.
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

/// Application salt for password-based key derivation. Fixed so that the
/// same password always derives the same key, which the persisted-file
/// contract requires.
const KEY_SALT: &[u8] = b"tabula-store.v1";

/// PBKDF2 iteration count (OWASP recommendation for HMAC-SHA256).
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derives a 32-byte AES key from a password using PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), KEY_SALT, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypts `plaintext` with AES-256-GCM under a fresh random nonce.
///
/// Returns the 12-byte nonce followed by the ciphertext.
pub fn seal(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| Error::Internal(e.to_string()))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Internal(e.to_string()))?;

    let mut combined = nonce.to_vec();
    combined.extend_from_slice(&ciphertext);
    Ok(combined)
}

/// Decrypts the output of [`seal`]. Fails with [`Error::Decryption`] on a
/// wrong key or tampered data.
pub fn open(data: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    if data.len() < NONCE_LEN {
        return Err(Error::Decryption("ciphertext too short".to_string()));
    }
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| Error::Internal(e.to_string()))?;
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| Error::Decryption("wrong password or tampered data".to_string()))
}

/// Encrypts a single field value for inclusion in a JSON result.
///
/// The value is serialized to JSON bytes, sealed, and returned as a hex
/// string so the ciphertext stays representable inside a record.
pub fn encrypt_field(value: &Value, key: &[u8; KEY_LEN]) -> Result<Value> {
    let plaintext = serde_json::to_vec(value)?;
    Ok(Value::String(hex::encode(seal(&plaintext, key)?)))
}

/// Inverse of [`encrypt_field`]: recovers the exact original value.
pub fn decrypt_field(value: &Value, key: &[u8; KEY_LEN]) -> Result<Value> {
    let cipher_hex = value
        .as_str()
        .ok_or_else(|| Error::Decryption("encrypted field is not a string".to_string()))?;
    let combined =
        hex::decode(cipher_hex).map_err(|e| Error::Decryption(e.to_string()))?;
    let plaintext = open(&combined, key)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_seal_open_round_trip() {
        let key = derive_key("password");
        let plaintext = b"Hello, Tabula!";
        let sealed = seal(plaintext, &key).unwrap();
        assert_ne!(&sealed[NONCE_LEN..], plaintext.as_slice());
        assert_eq!(open(&sealed, &key).unwrap(), plaintext);
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let sealed = seal(b"secret", &derive_key("password")).unwrap();
        let err = open(&sealed, &derive_key("not the password")).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        assert_eq!(derive_key("password"), derive_key("password"));
        assert_ne!(derive_key("password"), derive_key("Password"));
    }

    #[test]
    fn test_field_round_trip_preserves_value_types() {
        let key = derive_key("password");
        for original in [json!("that"), json!(42), json!(null), json!({"a": [1, 2]})] {
            let sealed = encrypt_field(&original, &key).unwrap();
            assert_ne!(sealed, original);
            assert!(sealed.is_string());
            assert_eq!(decrypt_field(&sealed, &key).unwrap(), original);
        }
    }
}
