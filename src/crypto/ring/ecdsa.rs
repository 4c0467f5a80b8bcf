// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of ECDSA based on `ring`.
//!
//! Requires the `std` feature flag to be enabled.

use ring::signature::VerificationAlgorithm as _;

use crate::crypto::sig;

/// The length of an uncompressed SEC1 P-256 point.
pub const POINT_LEN: usize = 65;

/// A `ring`-based [`sig::Verify`] for DER-encoded ECDSA using the P-256 curve
/// and SHA-256.
pub struct VerifyP256 {
    key: [u8; POINT_LEN],
}

impl VerifyP256 {
    /// Creates a new `VerifyP256` from an uncompressed point,
    /// `0x04 || x || y`.
    ///
    /// Returns `None` if `point` is not of that form. Whether the point is
    /// actually on the curve is only checked when verifying.
    pub fn from_point(point: &[u8]) -> Option<Self> {
        if point.len() != POINT_LEN || point[0] != 0x04 {
            return None;
        }
        let mut key = [0; POINT_LEN];
        key.copy_from_slice(point);
        Some(Self { key })
    }
}

impl sig::Verify for VerifyP256 {
    fn verify(
        &mut self,
        message: &[&[u8]],
        signature: &[u8],
    ) -> Result<(), sig::Error> {
        let message = message.concat();
        ring::signature::ECDSA_P256_SHA256_ASN1
            .verify(
                (&self.key[..]).into(),
                message.as_slice().into(),
                signature.into(),
            )
            .map_err(|_| sig::Error::BadSignature)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::sig::Verify as _;

    #[test]
    fn verify_p256() {
        let key = testutil::EcdsaKey::generate();
        let sig = key.sign(b"signed data");

        let mut verifier = VerifyP256::from_point(key.public_point()).unwrap();
        verifier.verify(&[b"signed ", b"data"], &sig).unwrap();
        assert_eq!(
            verifier.verify(&[b"signed data!"], &sig),
            Err(sig::Error::BadSignature)
        );
    }

    #[test]
    fn compressed_point_rejected() {
        let mut point = [0; 33];
        point[0] = 0x02;
        assert!(VerifyP256::from_point(&point).is_none());
    }
}
