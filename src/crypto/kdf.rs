use anyhow::{Context, Result, anyhow, bail};
use scrypt::Params;
use zeroize::Zeroizing;

use super::KEY_LEN;

/// Cost profile written by current versions of the backup tool (N = 2^17).
pub const CURRENT: KdfProfile = KdfProfile {
    name: "current",
    cost_n: 131_072,
    block_size_r: 8,
    parallelism_p: 1,
    key_len: KEY_LEN,
};

/// Cost profile written by older versions of the backup tool (N = 2^15).
pub const LEGACY: KdfProfile = KdfProfile {
    name: "legacy",
    cost_n: 32_768,
    block_size_r: 8,
    parallelism_p: 1,
    key_len: KEY_LEN,
};

/// Every profile a container may have been sealed with, most likely first.
///
/// Containers carry no version field, so decryption walks this list until a
/// key authenticates. New profiles are appended here.
pub const KNOWN_PROFILES: [KdfProfile; 2] = [CURRENT, LEGACY];

/// scrypt parameters used to stretch a passphrase into an AES-256 key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfProfile {
    name: &'static str,
    cost_n: u64,
    block_size_r: u32,
    parallelism_p: u32,
    key_len: usize,
}

impl KdfProfile {
    pub fn new(
        name: &'static str,
        cost_n: u64,
        block_size_r: u32,
        parallelism_p: u32,
    ) -> Result<Self> {
        let profile = Self {
            name,
            cost_n,
            block_size_r,
            parallelism_p,
            key_len: KEY_LEN,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cost_n(&self) -> u64 {
        self.cost_n
    }

    pub fn block_size_r(&self) -> u32 {
        self.block_size_r
    }

    pub fn parallelism_p(&self) -> u32 {
        self.parallelism_p
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn validate(&self) -> Result<()> {
        if self.cost_n < 2 || !self.cost_n.is_power_of_two() {
            bail!("scrypt cost N must be a power of two greater than 1");
        }
        if self.block_size_r < 1 {
            bail!("scrypt block size r must be >= 1");
        }
        if self.parallelism_p < 1 {
            bail!("scrypt parallelism p must be >= 1");
        }
        if self.key_len != KEY_LEN {
            bail!("scrypt output length must be {KEY_LEN} bytes");
        }
        Ok(())
    }

    fn params(&self) -> Result<Params> {
        // power of two checked in validate(), so this is exact
        let log_n = self.cost_n.trailing_zeros() as u8;
        Params::new(log_n, self.block_size_r, self.parallelism_p, self.key_len)
            .map_err(|e| anyhow!("failed to construct scrypt params: {e}"))
    }
}

/// Derive a key from a passphrase and salt under the given profile.
///
/// Deterministic in all three inputs. The result is wiped on drop.
pub fn derive_key(
    passphrase: &str,
    salt: &[u8],
    profile: KdfProfile,
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    profile.validate().context("invalid scrypt profile")?;
    let params = profile.params()?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(passphrase.as_bytes(), salt, &params, key.as_mut_slice())
        .map_err(|e| anyhow!("scrypt key derivation failed: {e}"))?;

    Ok(key)
}
