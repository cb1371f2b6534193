//! Authenticated token encryption using HKDF + AES-128-CBC + HMAC-SHA256
//!
//! The key string is run through [`kdf::derive`]; the first 16 bytes of the
//! result sign, the last 16 bytes encrypt (encrypt-then-MAC).
//!
//! The binary format, before base64url encoding (with padding), is:
//! - version: 1 byte (0x80)
//! - timestamp: 8 bytes (big-endian Unix seconds, informational only)
//! - iv: 16 bytes
//! - ciphertext: variable length (PKCS7-padded, multiple of 16)
//! - tag: 32 bytes (HMAC-SHA256 over everything before it)
//!
//! This is byte-compatible with Fernet tokens keyed by the base64url
//! encoding of the derived key.

use crate::error::{LockboxError, Result};
use crate::kdf::{self, DerivedKey};
use aes::Aes128;
use base64::{Engine, engine::general_purpose::URL_SAFE};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// Token format version
pub const VERSION: u8 = 0x80;

/// Length of the big-endian timestamp
const TIMESTAMP_LEN: usize = 8;

/// Length of the CBC initialization vector
pub const IV_LEN: usize = 16;

/// AES block size
const BLOCK_LEN: usize = 16;

/// Length of the HMAC-SHA256 tag
const TAG_LEN: usize = 32;

/// version + timestamp + iv
const HEADER_LEN: usize = 1 + TIMESTAMP_LEN + IV_LEN;

/// Smallest valid token: header, one ciphertext block, tag
const MIN_TOKEN_LEN: usize = HEADER_LEN + BLOCK_LEN + TAG_LEN;

/// Number of random bytes in a generated key
const GENERATED_KEY_LEN: usize = 32;

/// Encrypt plaintext under a key string using a random IV and the current time.
///
/// Encryption of valid UTF-8 cannot fail, so unlike [`decrypt`] this is
/// infallible.
pub fn encrypt(plaintext: &str, key: &str) -> String {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    encrypt_with_parts(plaintext, key, unix_now(), &iv)
}

/// Encrypt plaintext with a caller-chosen timestamp and IV.
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates a random IV.
pub fn encrypt_with_parts(plaintext: &str, key: &str, timestamp: u64, iv: &[u8; IV_LEN]) -> String {
    let derived = kdf::derive(key.as_bytes());

    let ciphertext = Aes128CbcEnc::new(&(*derived.encryption_key()).into(), &(*iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len() + TAG_LEN);
    token.push(VERSION);
    token.extend_from_slice(&timestamp.to_be_bytes());
    token.extend_from_slice(iv);
    token.extend_from_slice(&ciphertext);

    let tag = signer(&derived).chain_update(&token).finalize().into_bytes();
    token.extend_from_slice(&tag);

    URL_SAFE.encode(token)
}

/// Decrypt a token with a key string.
///
/// Every failure (bad encoding, truncation, unknown version, tag mismatch,
/// bad padding, non-UTF-8 plaintext) is the same [`LockboxError::invalid_key`].
pub fn decrypt(token: &str, key: &str) -> Result<String> {
    let (_, plaintext) = open(token, key)?;
    String::from_utf8(plaintext).map_err(|_| LockboxError::invalid_key())
}

/// Verify a token and return the Unix timestamp recorded when it was created.
pub fn token_timestamp(token: &str, key: &str) -> Result<u64> {
    let (timestamp, plaintext) = open(token, key)?;
    drop(Zeroizing::new(plaintext));
    Ok(timestamp)
}

/// Generate a fresh random key: 32 bytes from the OS RNG, base64url-encoded
/// with padding.
pub fn generate_key() -> String {
    let mut bytes = Zeroizing::new([0u8; GENERATED_KEY_LEN]);
    OsRng.fill_bytes(&mut bytes[..]);
    URL_SAFE.encode(&bytes[..])
}

fn open(token: &str, key: &str) -> Result<(u64, Vec<u8>)> {
    let derived = kdf::derive(key.as_bytes());

    // Line breaks from wrapping or a trailing newline are not part of the token.
    let compact: String = token.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let data = URL_SAFE
        .decode(compact)
        .map_err(|_| LockboxError::invalid_key())?;

    if data.len() < MIN_TOKEN_LEN || (data.len() - HEADER_LEN - TAG_LEN) % BLOCK_LEN != 0 {
        return Err(LockboxError::invalid_key());
    }
    if data[0] != VERSION {
        return Err(LockboxError::invalid_key());
    }

    let (signed, tag) = data.split_at(data.len() - TAG_LEN);
    signer(&derived)
        .chain_update(signed)
        .verify_slice(tag)
        .map_err(|_| LockboxError::invalid_key())?;

    let timestamp = u64::from_be_bytes(
        signed[1..1 + TIMESTAMP_LEN]
            .try_into()
            .map_err(|_| LockboxError::invalid_key())?,
    );
    let iv: [u8; IV_LEN] = signed[1 + TIMESTAMP_LEN..HEADER_LEN]
        .try_into()
        .map_err(|_| LockboxError::invalid_key())?;
    let ciphertext = &signed[HEADER_LEN..];

    let plaintext = Aes128CbcDec::new(&(*derived.encryption_key()).into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| LockboxError::invalid_key())?;

    Ok((timestamp, plaintext))
}

fn signer(derived: &DerivedKey) -> HmacSha256 {
    let Ok(mac) = HmacSha256::new_from_slice(derived.signing_key()) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
