//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![crate_name = "crypto"]

pub mod ecdh;
pub mod errors;
pub mod keys;
pub mod mac;

/// HMAC-SHA256 tag and P-256 scalar length.
pub const TAG_LEN: usize = 32;

/// Uncompressed SEC1 point length on the wire.
pub const POINT_LEN: usize = 65;
