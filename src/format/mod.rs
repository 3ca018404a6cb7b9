//! Container layout for encrypted backup archives.
//!
//! ```text
//! NONCE (12) | CIPHERTEXT (variable) | TAG (16) | SALT (32)
//! ```
//!
//! There is no magic and no version field. The salt always occupies the
//! trailing 32 bytes; everything before it is the AES-GCM payload.

use crate::crypto::{NONCE_LEN, SALT_LEN, TAG_LEN};
use crate::error::UnsealError;

/// Smallest structurally valid container: empty ciphertext.
pub const MIN_CONTAINER_LEN: usize = NONCE_LEN + TAG_LEN + SALT_LEN;

/// A parsed, borrowed view over an encrypted container.
#[derive(Debug, Clone, Copy)]
pub struct EncryptedContainer<'a> {
    nonce: &'a [u8; NONCE_LEN],
    sealed: &'a [u8],
    salt: &'a [u8; SALT_LEN],
}

impl<'a> EncryptedContainer<'a> {
    /// Splits raw bytes into nonce, sealed payload and salt.
    ///
    /// # Errors
    ///
    /// Returns [`UnsealError::MalformedContainer`] if the input is shorter
    /// than [`MIN_CONTAINER_LEN`].
    pub fn parse(data: &'a [u8]) -> Result<Self, UnsealError> {
        if data.len() < MIN_CONTAINER_LEN {
            return Err(UnsealError::MalformedContainer { len: data.len() });
        }

        let malformed = |_| UnsealError::MalformedContainer { len: data.len() };
        let (payload, salt) = data.split_at(data.len() - SALT_LEN);
        let (nonce, sealed) = payload.split_at(NONCE_LEN);

        Ok(Self {
            nonce: nonce.try_into().map_err(malformed)?,
            sealed,
            salt: salt.try_into().map_err(malformed)?,
        })
    }

    /// Returns the AES-GCM nonce.
    pub fn nonce(&self) -> &'a [u8; NONCE_LEN] {
        self.nonce
    }

    /// Returns the ciphertext with its authentication tag appended.
    pub fn sealed(&self) -> &'a [u8] {
        self.sealed
    }

    /// Returns the scrypt salt.
    pub fn salt(&self) -> &'a [u8; SALT_LEN] {
        self.salt
    }
}
