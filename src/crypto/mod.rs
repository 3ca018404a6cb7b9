//! Cryptographic primitives for backup containers.
//!
//! Provides scrypt key derivation under fixed cost profiles and
//! AES-256-GCM authenticated decryption.

pub mod aead;
pub mod kdf;

pub use aead::open;
pub use kdf::{CURRENT, KNOWN_PROFILES, KdfProfile, LEGACY, derive_key};

/// Length of the scrypt salt (32 bytes).
pub const SALT_LEN: usize = 32;
/// Length of the nonce (12 bytes / 96 bits for AES-GCM).
pub const NONCE_LEN: usize = 12;
/// Length of the GCM authentication tag (16 bytes).
pub const TAG_LEN: usize = 16;
/// Length of the encryption key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
