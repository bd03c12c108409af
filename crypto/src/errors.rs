//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("system rng failure: {0}")]
    Rng(#[from] rand_core::Error),

    #[error("key file i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid private key bytes")]
    InvalidKeyBytes,

    #[error("uncompressed point encoding must start with 0x04")]
    InvalidPointEncoding,

    #[error("point is not on the P-256 curve")]
    OffCurvePoint,

    #[error("result is the point at infinity")]
    PointAtInfinity,

    #[error("expected 32 bytes (tag) or 65 bytes (point), got {0}")]
    DataIntegrity(usize),
}
