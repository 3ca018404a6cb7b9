mod crypto;
mod error;
mod format;
mod storage;

pub use crate::crypto::{
    CURRENT, KEY_LEN, KNOWN_PROFILES, KdfProfile, LEGACY, NONCE_LEN, SALT_LEN, TAG_LEN,
    derive_key,
};
pub use crate::error::UnsealError;
pub use crate::format::{EncryptedContainer, MIN_CONTAINER_LEN};
pub use crate::storage::{ENCRYPTED_EXT, Storage, output_path_for};

use std::time::Instant;

use tracing::{debug, info};
use zeroize::Zeroizing;

/// Recovers plaintext by trying an ordered list of scrypt profiles.
///
/// Holds no state between calls; one instance can serve any number of
/// containers from any number of threads.
#[derive(Debug, Clone, Copy)]
pub struct Decryptor<'p> {
    profiles: &'p [KdfProfile],
}

impl Default for Decryptor<'static> {
    fn default() -> Self {
        Self {
            profiles: &KNOWN_PROFILES,
        }
    }
}

impl<'p> Decryptor<'p> {
    /// Uses `profiles` in the given order instead of [`KNOWN_PROFILES`].
    pub fn with_profiles(profiles: &'p [KdfProfile]) -> Self {
        Self { profiles }
    }

    /// Returns the profiles in the order they are tried.
    pub fn profiles(&self) -> &'p [KdfProfile] {
        self.profiles
    }

    /// Decrypts `container`, returning the first plaintext that authenticates.
    ///
    /// Every attempt pays the full key derivation cost. Derived keys are
    /// wiped as soon as their attempt ends and the passphrase is wiped before
    /// returning, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`UnsealError::AuthenticationFailed`] if no profile yields a
    /// key that authenticates. A wrong passphrase, corrupted data and an
    /// unknown profile all look the same here.
    pub fn decrypt(
        &self,
        container: &EncryptedContainer<'_>,
        passphrase: Zeroizing<String>,
    ) -> Result<Zeroizing<Vec<u8>>, UnsealError> {
        let result = self.try_profiles(container, &passphrase);
        drop(passphrase);
        result
    }

    fn try_profiles(
        &self,
        container: &EncryptedContainer<'_>,
        passphrase: &str,
    ) -> Result<Zeroizing<Vec<u8>>, UnsealError> {
        for profile in self.profiles {
            debug!(profile = %profile.name(), n = profile.cost_n(), "deriving key");
            let started = Instant::now();

            let key = match derive_key(passphrase, container.salt(), *profile) {
                Ok(key) => key,
                Err(e) => {
                    debug!(profile = %profile.name(), "skipping profile: {e:#}");
                    continue;
                }
            };

            let opened = crypto::open(&key, container.nonce(), container.sealed());
            drop(key);
            let elapsed = started.elapsed();

            match opened {
                Ok(plaintext) => {
                    debug!(profile = %profile.name(), ?elapsed, "authenticated");
                    return Ok(plaintext);
                }
                Err(_) => {
                    debug!(profile = %profile.name(), ?elapsed, "authentication failed");
                }
            }
        }

        Err(UnsealError::AuthenticationFailed)
    }
}

/// Parses `data` and decrypts it with the known profiles.
pub fn decrypt(
    data: &[u8],
    passphrase: Zeroizing<String>,
) -> Result<Zeroizing<Vec<u8>>, UnsealError> {
    let container = EncryptedContainer::parse(data)?;
    Decryptor::default().decrypt(&container, passphrase)
}

/// Decrypts the file at `input` and atomically writes the plaintext to
/// `output`. Returns the number of plaintext bytes written.
pub fn decrypt_file(
    input: &Storage,
    output: &Storage,
    passphrase: Zeroizing<String>,
) -> Result<usize, UnsealError> {
    let data = input.load()?;
    let plaintext = decrypt(&data, passphrase)?;
    output.save(&plaintext)?;

    info!(
        input = %input.path().display(),
        output = %output.path().display(),
        bytes = plaintext.len(),
        "decrypted"
    );
    Ok(plaintext.len())
}
