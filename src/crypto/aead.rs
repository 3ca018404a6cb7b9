use super::{KEY_LEN, NONCE_LEN};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Result, anyhow};
use zeroize::Zeroizing;

/// Decrypt and authenticate `sealed` (ciphertext with the GCM tag appended).
///
/// No associated data is bound. Any tag mismatch is reported as a plain
/// error; GCM gives no further diagnostics.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    sealed: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("invalid AES key: {e}"))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| anyhow!("Invalid password or corrupted data"))?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
pub(crate) fn seal(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Vec<u8> {
    Aes256Gcm::new_from_slice(key)
        .unwrap()
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TAG_LEN;

    #[test]
    fn open_recovers_sealed_data() {
        let key = [42u8; KEY_LEN];
        let nonce = [3u8; NONCE_LEN];

        let sealed = seal(&key, &nonce, b"backup archive");
        assert_eq!(sealed.len(), b"backup archive".len() + TAG_LEN);

        let plaintext = open(&key, &nonce, &sealed).unwrap();
        assert_eq!(plaintext.as_slice(), b"backup archive");
    }

    #[test]
    fn wrong_key_fails() {
        let nonce = [3u8; NONCE_LEN];
        let sealed = seal(&[1u8; KEY_LEN], &nonce, b"secret");

        assert!(open(&[2u8; KEY_LEN], &nonce, &sealed).is_err());
    }

    #[test]
    fn empty_plaintext_is_just_a_tag() {
        let key = [5u8; KEY_LEN];
        let nonce = [6u8; NONCE_LEN];

        let sealed = seal(&key, &nonce, b"");
        assert_eq!(sealed.len(), TAG_LEN);
        assert!(open(&key, &nonce, &sealed).unwrap().is_empty());
    }

    #[test]
    fn truncated_tag_fails() {
        let key = [5u8; KEY_LEN];
        let nonce = [6u8; NONCE_LEN];

        let sealed = seal(&key, &nonce, b"data");
        assert!(open(&key, &nonce, &sealed[..sealed.len() - 1]).is_err());
    }
}
