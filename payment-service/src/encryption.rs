//! AES-256-CBC encryption for card numbers stored at rest.
//!
//! The key and IV are fixed for the lifetime of the service, so the same
//! plaintext always maps to the same ciphertext. That makes stored values
//! comparable; it also means ciphertexts must never be treated as nonces.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use shared::{CheckoutError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

#[derive(Clone)]
pub struct EncryptionService {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService").finish_non_exhaustive()
    }
}

fn decode_fixed<const N: usize>(name: &str, value: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(value.trim())
        .map_err(|e| CheckoutError::Config(format!("{} is not valid hex: {}", name, e)))?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        CheckoutError::Config(format!(
            "{} must be {} bytes, got {}",
            name,
            N,
            bytes.len()
        ))
    })
}

impl EncryptionService {
    /// Builds the service from hex-encoded key (64 chars) and IV (32 chars).
    pub fn from_hex(key: &str, iv: &str) -> Result<Self> {
        if key.trim().is_empty() || iv.trim().is_empty() {
            return Err(CheckoutError::Config(
                "Encryption key and IV must be defined".to_string(),
            ));
        }

        Ok(Self {
            key: decode_fixed("encryption key", key)?,
            iv: decode_fixed("encryption IV", iv)?,
        })
    }

    /// Returns the ciphertext as lowercase hex.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        hex::encode(ciphertext)
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let bytes = hex::decode(ciphertext)
            .map_err(|e| CheckoutError::Decryption(format!("ciphertext is not valid hex: {}", e)))?;

        let plaintext = Aes256CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
            .map_err(|_| {
                CheckoutError::Decryption(
                    "ciphertext was not produced with the configured key and IV".to_string(),
                )
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| CheckoutError::Decryption("plaintext is not valid UTF-8".to_string()))
    }
}
