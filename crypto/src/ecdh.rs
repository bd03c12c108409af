//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Commutative point exponentiation over NIST P-256.
//!
//! The one operation both parties run is [`EcdhKey::apply`]: raise the
//! input to the private scalar. The input is either a 32-byte HMAC tag,
//! interpreted as a scalar and multiplied into the generator first, or a
//! 65-byte uncompressed point produced by the other side. Because scalar
//! multiplication commutes, applying the two parties' scalars in either
//! order yields the same point, which is the whole protocol.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use p256::elliptic_curve::bigint::U256;
use p256::elliptic_curve::ops::Reduce;
use p256::elliptic_curve::sec1::FromEncodedPoint;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::elliptic_curve::Field;
use p256::elliptic_curve::Group;
use p256::elliptic_curve::PrimeField;
use p256::AffinePoint;
use p256::EncodedPoint;
use p256::FieldBytes;
use p256::ProjectivePoint;
use p256::Scalar;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::errors::CryptoError;
use crate::POINT_LEN;
use crate::TAG_LEN;

/// P-256 private scalar for the commutative exponentiation. Nonzero by
/// construction; zeroized on drop.
#[derive(Clone)]
pub struct EcdhKey {
    scalar: Zeroizing<Scalar>,
}

impl EcdhKey {
    /// Rejection-samples a fresh nonzero scalar from the system rng.
    pub fn generate() -> Result<EcdhKey, CryptoError> {
        let mut bytes = Zeroizing::new([0u8; TAG_LEN]);
        loop {
            OsRng.try_fill_bytes(&mut *bytes)?;
            let scalar = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(
                &*bytes,
            )));
            if let Some(scalar) = scalar {
                if !bool::from(scalar.is_zero()) {
                    return Ok(EcdhKey {
                        scalar: Zeroizing::new(scalar),
                    });
                }
            }
        }
    }

    /// Big-endian SEC1 scalar; rejects zero and anything >= the group order.
    pub fn from_bytes(bytes: &[u8]) -> Result<EcdhKey, CryptoError> {
        if bytes.len() != TAG_LEN {
            return Err(CryptoError::InvalidKeyBytes);
        }
        let scalar =
            Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
                .ok_or(CryptoError::InvalidKeyBytes)?;
        if bool::from(scalar.is_zero()) {
            return Err(CryptoError::InvalidKeyBytes);
        }
        Ok(EcdhKey {
            scalar: Zeroizing::new(scalar),
        })
    }

    pub fn to_bytes(&self) -> [u8; TAG_LEN] {
        self.scalar.to_repr().into()
    }

    /// Exponentiate a base64 input, returning base64 of the uncompressed
    /// result. Byte-identical inputs give byte-identical outputs.
    pub fn apply(&self, input_b64: &str) -> Result<String, CryptoError> {
        let bytes = BASE64.decode(input_b64)?;
        self.apply_bytes(&bytes)
    }

    /// Same as [`apply`](EcdhKey::apply) over raw bytes, used where the
    /// input is a tag that was never base64-encoded to begin with.
    pub fn apply_bytes(&self, input: &[u8]) -> Result<String, CryptoError> {
        let point = decode_input(input)?;
        let product = point * *self.scalar;
        if bool::from(product.is_identity()) {
            return Err(CryptoError::PointAtInfinity);
        }
        let encoded = product.to_affine().to_encoded_point(false);
        Ok(BASE64.encode(encoded.as_bytes()))
    }
}

fn decode_input(bytes: &[u8]) -> Result<ProjectivePoint, CryptoError> {
    match bytes.len() {
        // an HMAC tag: reduce mod n and multiply into the generator
        TAG_LEN => {
            let tag = <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(bytes));
            Ok(ProjectivePoint::GENERATOR * tag)
        }
        // an uncompressed point from the other party
        POINT_LEN => {
            if bytes[0] != 0x04 {
                return Err(CryptoError::InvalidPointEncoding);
            }
            let encoded =
                EncodedPoint::from_bytes(bytes).map_err(|_| CryptoError::InvalidPointEncoding)?;
            let affine = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
                .ok_or(CryptoError::OffCurvePoint)?;
            Ok(ProjectivePoint::from(affine))
        }
        n => Err(CryptoError::DataIntegrity(n)),
    }
}
