//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Key persistence.
//!
//! Keys live in single-line lowercase-hex files with owner-only
//! permissions. Existing files are overwritten silently; callers pick
//! fresh paths per run.

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use zeroize::Zeroizing;

use crate::ecdh::EcdhKey;
use crate::errors::CryptoError;
use crate::mac::HmacKey;

const KEY_FILE_MODE: u32 = 0o600;

fn save_key_bytes(path: &Path, bytes: &[u8]) -> Result<(), CryptoError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(KEY_FILE_MODE)
        .open(path)?;
    file.write_all(hex::encode(bytes).as_bytes())?;
    Ok(())
}

fn load_key_bytes(path: &Path) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let text = fs::read_to_string(path)?;
    Ok(Zeroizing::new(hex::decode(text.trim())?))
}

pub fn save_hmac_key<P: AsRef<Path>>(path: P, key: &HmacKey) -> Result<(), CryptoError> {
    save_key_bytes(path.as_ref(), key.as_bytes())
}

pub fn load_hmac_key<P: AsRef<Path>>(path: P) -> Result<HmacKey, CryptoError> {
    let bytes = load_key_bytes(path.as_ref())?;
    HmacKey::from_bytes(&bytes)
}

pub fn save_ecdh_key<P: AsRef<Path>>(path: P, key: &EcdhKey) -> Result<(), CryptoError> {
    save_key_bytes(path.as_ref(), &key.to_bytes())
}

pub fn load_ecdh_key<P: AsRef<Path>>(path: P) -> Result<EcdhKey, CryptoError> {
    let bytes = load_key_bytes(path.as_ref())?;
    EcdhKey::from_bytes(&bytes)
}
