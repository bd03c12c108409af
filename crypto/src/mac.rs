//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! HMAC-SHA256 tagging of phone numbers.
//!
//! The tag is the pseudonym both parties feed into the first curve
//! exponentiation; it stays raw bytes here, encodings belong to the wire.

use hmac::Hmac;
use hmac::Mac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::CryptoError;
use crate::TAG_LEN;

type HmacSha256 = Hmac<Sha256>;

/// 32-byte shared secret for the phone pre-hash. Beta generates it and
/// hands it to Alpha out of band; after Alpha's step 1 it has no further
/// use.
pub struct HmacKey {
    bytes: Zeroizing<[u8; TAG_LEN]>,
}

impl HmacKey {
    pub fn generate() -> Result<HmacKey, CryptoError> {
        let mut bytes = Zeroizing::new([0u8; TAG_LEN]);
        OsRng.try_fill_bytes(&mut *bytes)?;
        Ok(HmacKey { bytes })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<HmacKey, CryptoError> {
        if bytes.len() != TAG_LEN {
            return Err(CryptoError::InvalidKeyBytes);
        }
        let mut buf = Zeroizing::new([0u8; TAG_LEN]);
        buf.copy_from_slice(bytes);
        Ok(HmacKey { bytes: buf })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }

    /// One-shot HMAC-SHA256 tag.
    pub fn tag(&self, message: &[u8]) -> [u8; TAG_LEN] {
        KeyedMac::new(self).tag(message)
    }
}

/// Pre-keyed HMAC state. Keying runs the compression function twice, so a
/// stage creates one of these and every record clones the small digest
/// state instead of re-deriving the key schedule.
pub struct KeyedMac {
    mac: HmacSha256,
}

impl KeyedMac {
    pub fn new(key: &HmacKey) -> KeyedMac {
        // new_from_slice only rejects oversized keys and ours is fixed at 32
        let mac = HmacSha256::new_from_slice(key.as_bytes()).expect("hmac accepts 32-byte keys");
        KeyedMac { mac }
    }

    pub fn tag(&self, message: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.finalize().into_bytes().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_unique() {
        let a = HmacKey::generate().unwrap();
        let b = HmacKey::generate().unwrap();
        assert_eq!(a.as_bytes().len(), TAG_LEN);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn tag_is_deterministic() {
        let key = HmacKey::from_bytes(&[7u8; 32]).unwrap();
        let t1 = key.tag(b"+79001234567");
        let t2 = key.tag(b"+79001234567");
        assert_eq!(t1, t2);
        assert_ne!(t1, key.tag(b"+79001234568"));
    }

    #[test]
    fn keyed_mac_matches_one_shot() {
        let key = HmacKey::generate().unwrap();
        let mac = KeyedMac::new(&key);
        assert_eq!(mac.tag(b"+15551230001"), key.tag(b"+15551230001"));
        // state resets between tags
        assert_eq!(mac.tag(b"+15551230002"), key.tag(b"+15551230002"));
    }

    #[test]
    fn key_length_is_enforced() {
        assert!(HmacKey::from_bytes(&[0u8; 16]).is_err());
        assert!(HmacKey::from_bytes(&[0u8; 33]).is_err());
    }
}
