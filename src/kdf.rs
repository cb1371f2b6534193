//! Key derivation from an arbitrary passphrase
//!
//! HKDF-SHA256 with no salt and empty info, expanded to 32 bytes. The
//! first half of the output signs tokens, the second half encrypts them.

use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// Length of each half of the derived key
pub const HALF_KEY_LEN: usize = KEY_LEN / 2;

/// 32 bytes of key material derived from a passphrase, wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_LEN]);

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// HMAC-SHA256 key (bytes 0..16).
    pub fn signing_key(&self) -> &[u8; HALF_KEY_LEN] {
        self.0[..HALF_KEY_LEN]
            .try_into()
            .unwrap_or_else(|_| unreachable!("half of a 32-byte array is 16 bytes"))
    }

    /// AES-128 key (bytes 16..32).
    pub fn encryption_key(&self) -> &[u8; HALF_KEY_LEN] {
        self.0[HALF_KEY_LEN..]
            .try_into()
            .unwrap_or_else(|_| unreachable!("half of a 32-byte array is 16 bytes"))
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey(<redacted>)")
    }
}

/// Derive a 32-byte key from a passphrase.
///
/// Deterministic and infallible; the empty passphrase is accepted.
pub fn derive(passphrase: &[u8]) -> DerivedKey {
    let hkdf = Hkdf::<Sha256>::new(None, passphrase);

    let mut key = [0u8; KEY_LEN];
    let Ok(()) = hkdf.expand(&[], &mut key) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    let derived = DerivedKey(key);
    key.zeroize();
    derived
}
