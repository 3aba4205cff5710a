//! Key material and encryption primitives for data at rest
//!
//! The master key is supplied by the caller. Everything actually used to
//! encrypt is derived from it with HKDF-SHA256 and a per-backend random salt
//! that is persisted in storage the first time a backend is used:
//! - value key: ChaCha20-Poly1305 with a random nonce per write
//! - name key: deterministic ChaCha20-Poly1305 for path segments
//!   (nonce taken from an HMAC of the segment)
//! - hash key: HMAC-SHA256 for opaque identifiers such as version keys

use crate::error::{Error, Result, StorageError};
use crate::storage::Storage;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use tracing::info;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Size of the master key and every derived key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits for ChaCha20-Poly1305)
const NONCE_SIZE: usize = 12;

/// Size of the per-backend salt in bytes
const SALT_SIZE: usize = 32;

/// Version byte leading every encrypted value
const BLOB_VERSION: u8 = 0x01;

/// Known plaintext sealed at setup to detect a wrong master key
const KEY_CHECK_PLAINTEXT: &[u8] = b"vkv/key-check/v1";

/// HKDF labels, one per derived key
const INFO_VALUE_KEY: &[u8] = b"vkv/value-encryption";
const INFO_NAME_KEY: &[u8] = b"vkv/name-encryption";
const INFO_NAME_NONCE_KEY: &[u8] = b"vkv/name-nonce";
const INFO_HASH_KEY: &[u8] = b"vkv/identifier-hash";

/// Fixed salt used when stretching a passphrase into a master key
const PASSPHRASE_SALT: &[u8] = b"vkv/master-key/v1";

/// Externally supplied root key material, zeroed on drop
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; KEY_SIZE]>);

impl MasterKey {
    /// Create from raw key bytes (must be exactly 32 bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(Error::invalid_key(format!(
                "Key must be {} bytes, got {} bytes",
                KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Create from a hex-encoded key (64 hex characters)
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|e| Error::invalid_key(format!("Invalid hex key: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Derive a master key from a passphrase with HKDF-SHA256
    pub fn from_passphrase(passphrase: &str) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(Error::invalid_key("Passphrase must not be empty"));
        }
        let hk = Hkdf::<Sha256>::new(Some(PASSPHRASE_SALT), passphrase.as_bytes());
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        hk.expand(b"master-key", key.as_mut())
            .map_err(|e| Error::invalid_key(format!("Key derivation failed: {}", e)))?;
        Ok(Self(key))
    }

    /// Generate a random master key
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        rand::thread_rng().fill_bytes(key.as_mut());
        Self(key)
    }

    /// Hex encoding of the key (use with caution)
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_ref())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// Encrypts values and names for one backend.
pub struct KeyEncryptor {
    value_cipher: ChaCha20Poly1305,
    name_cipher: ChaCha20Poly1305,
    name_nonce_mac: HmacSha256,
    hash_mac: HmacSha256,
}

impl KeyEncryptor {
    /// Raw storage key holding the per-backend salt
    pub const SALT_KEY: &'static str = "salt";

    /// Raw storage key holding the sealed master key check
    pub const KEY_CHECK_KEY: &'static str = "keycheck";

    /// Derive all working keys from the master key and a backend salt
    pub fn new(master: &MasterKey, salt: &[u8]) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(Some(salt), master.as_bytes());
        let derive = |info: &[u8]| -> Result<Zeroizing<[u8; KEY_SIZE]>> {
            let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
            hk.expand(info, okm.as_mut())
                .map_err(|e| Error::invalid_key(format!("Key derivation failed: {}", e)))?;
            Ok(okm)
        };

        let value_key = derive(INFO_VALUE_KEY)?;
        let name_key = derive(INFO_NAME_KEY)?;
        let name_nonce_key = derive(INFO_NAME_NONCE_KEY)?;
        let hash_key = derive(INFO_HASH_KEY)?;

        let new_mac = |key: &[u8]| -> Result<HmacSha256> {
            <HmacSha256 as Mac>::new_from_slice(key)
                .map_err(|e| Error::invalid_key(format!("Invalid HMAC key: {}", e)))
        };

        Ok(Self {
            value_cipher: ChaCha20Poly1305::new(Key::from_slice(value_key.as_ref())),
            name_cipher: ChaCha20Poly1305::new(Key::from_slice(name_key.as_ref())),
            name_nonce_mac: new_mac(name_nonce_key.as_ref())?,
            hash_mac: new_mac(hash_key.as_ref())?,
        })
    }

    /// Load the backend salt from `storage`, creating it on first use.
    ///
    /// Creating the salt is a write, so on read-only storage a backend that
    /// was never initialized fails here with [`StorageError::ReadOnly`].
    ///
    /// The master key is checked against a sealed marker stored next to the
    /// salt. A different key fails with [`StorageError::Decryption`] instead
    /// of silently addressing a disjoint set of physical keys.
    pub async fn load_or_init(storage: &dyn Storage, master: &MasterKey) -> Result<Self> {
        let salt = match storage.get(Self::SALT_KEY).await? {
            Some(salt) => salt,
            None => {
                let mut salt = vec![0u8; SALT_SIZE];
                rand::thread_rng().fill_bytes(&mut salt);
                storage.put(Self::SALT_KEY, &salt).await?;
                info!("Initialized key encryption salt for new backend");
                salt
            }
        };

        if salt.len() != SALT_SIZE {
            return Err(StorageError::decryption(
                Self::SALT_KEY,
                format!("salt has wrong size: expected {}, got {}", SALT_SIZE, salt.len()),
            )
            .into());
        }

        let encryptor = Self::new(master, &salt)?;

        match storage.get(Self::KEY_CHECK_KEY).await? {
            Some(blob) => encryptor.verify_key_check(&blob)?,
            None => {
                // Also covers a setup interrupted between the two writes
                let blob = encryptor.seal(Self::KEY_CHECK_KEY, KEY_CHECK_PLAINTEXT)?;
                storage.put(Self::KEY_CHECK_KEY, &blob).await?;
                info!("Recorded master key check for backend");
            }
        }

        Ok(encryptor)
    }

    fn verify_key_check(&self, blob: &[u8]) -> std::result::Result<(), StorageError> {
        let plaintext = self.open(Self::KEY_CHECK_KEY, blob).map_err(|_| {
            StorageError::decryption(
                Self::KEY_CHECK_KEY,
                "master key does not match the key this backend was initialized with",
            )
        })?;
        if plaintext != KEY_CHECK_PLAINTEXT {
            return Err(StorageError::decryption(
                Self::KEY_CHECK_KEY,
                "unexpected key check contents",
            ));
        }
        Ok(())
    }

    /// Encrypt `plaintext`, binding it to the physical storage key `aad`
    pub fn seal(&self, aad: &str, plaintext: &[u8]) -> std::result::Result<Vec<u8>, StorageError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .value_cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|e| StorageError::backend(format!("Encryption failed: {}", e)))?;

        let mut blob = Vec::with_capacity(1 + NONCE_SIZE + ciphertext.len());
        blob.push(BLOB_VERSION);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a blob produced by [`seal`](Self::seal) for the same `aad`
    pub fn open(&self, aad: &str, blob: &[u8]) -> std::result::Result<Vec<u8>, StorageError> {
        if blob.len() < 1 + NONCE_SIZE {
            return Err(StorageError::decryption(aad, "ciphertext too short"));
        }
        if blob[0] != BLOB_VERSION {
            return Err(StorageError::decryption(
                aad,
                format!("unsupported blob version {:#04x}", blob[0]),
            ));
        }

        let (nonce_bytes, ciphertext) = blob[1..].split_at(NONCE_SIZE);
        self.value_cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|e| StorageError::decryption(aad, format!("authentication failed: {}", e)))
    }

    /// Deterministically encrypt every segment of a `/`-separated path.
    ///
    /// Empty segments (a trailing `/`) are kept as-is.
    pub fn obfuscate_path(&self, path: &str) -> std::result::Result<String, StorageError> {
        let segments = path
            .split('/')
            .map(|segment| {
                if segment.is_empty() {
                    Ok(String::new())
                } else {
                    self.obfuscate_name(segment)
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(segments.join("/"))
    }

    /// Deterministically encrypt a single path segment
    pub fn obfuscate_name(&self, name: &str) -> std::result::Result<String, StorageError> {
        let mut mac = self.name_nonce_mac.clone();
        mac.update(name.as_bytes());
        let digest = mac.finalize().into_bytes();
        let nonce_bytes = &digest[..NONCE_SIZE];

        let ciphertext = self
            .name_cipher
            .encrypt(Nonce::from_slice(nonce_bytes), name.as_bytes())
            .map_err(|e| StorageError::backend(format!("Name encryption failed: {}", e)))?;

        let mut raw = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        raw.extend_from_slice(nonce_bytes);
        raw.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Reverse [`obfuscate_name`](Self::obfuscate_name)
    pub fn reveal_name(&self, encoded: &str) -> std::result::Result<String, StorageError> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| StorageError::decryption(encoded, format!("invalid name encoding: {}", e)))?;
        if raw.len() < NONCE_SIZE {
            return Err(StorageError::decryption(encoded, "encrypted name too short"));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
        let plaintext = self
            .name_cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| StorageError::decryption(encoded, format!("authentication failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|_| StorageError::decryption(encoded, "decrypted name is not valid UTF-8"))
    }

    /// Keyed, stable hex identifier for `input`
    pub fn hash_id(&self, input: &str) -> String {
        let mut mac = self.hash_mac.clone();
        mac.update(input.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for KeyEncryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEncryptor").finish_non_exhaustive()
    }
}
