// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Algorithm-generic signature traits.
//!
//! Certificates and firmware images name the algorithm that signed them;
//! [`Ciphers`] turns such an algorithm, together with a public key, into a
//! [`Verify`] engine.

#[cfg(feature = "arbitrary-derive")]
use libfuzzer_sys::arbitrary::{self, Arbitrary};

/// A signature algorithm understood by `trustagent`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
pub enum Algo {
    /// ECDSA over NIST P-256 with SHA-256, with DER-encoded signatures.
    EcdsaP256Sha256,
    /// Hierarchical LMS signatures (RFC 8554, RFC 8708).
    HssLms,
}

/// Public key parameters extracted from a certificate.
///
/// These borrow from the certificate they were parsed from.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PublicKeyParams<'a> {
    /// An uncompressed P-256 point, `0x04 || x || y`.
    EcdsaP256 {
        /// The 65-byte SEC1 encoding of the point.
        point: &'a [u8],
    },
    /// An HSS public key, in RFC 8554 encoding.
    Hss {
        /// The encoded key: `u32 L || lms_public_key`.
        key: &'a [u8],
    },
}

impl PublicKeyParams<'_> {
    /// Returns the algorithm these parameters are used with.
    pub fn algo(&self) -> Algo {
        match self {
            Self::EcdsaP256 { .. } => Algo::EcdsaP256Sha256,
            Self::Hss { .. } => Algo::HssLms,
        }
    }

    /// Returns whether these parameters can verify signatures of `algo`.
    pub fn is_params_for(&self, algo: Algo) -> bool {
        self.algo() == algo
    }
}

/// An error returned by a signature operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The signature did not verify, or was malformed.
    BadSignature,
    /// The key or algorithm is not supported by this engine.
    Unsupported,
    /// An unspecified, internal error.
    Unspecified,
}

/// A signature-verification engine, already primed with a key.
///
/// There is no way to extract the key back out of a `Verify` value.
pub trait Verify {
    /// Verifies `signature` over the concatenation of the chunks of
    /// `message`.
    ///
    /// Returns `Ok(())` only if the signature is valid.
    fn verify(
        &mut self,
        message: &[&[u8]],
        signature: &[u8],
    ) -> Result<(), Error>;
}
impl dyn Verify {} // Ensure object-safe.

/// A source of [`Verify`] engines.
///
/// This is the hook through which certificate validation obtains signature
/// verification, so that an integration can supply hardware-backed engines.
pub trait Ciphers {
    /// Returns a verifier for `algo` using `key`, or `None` if the
    /// combination is unsupported.
    fn verifier<'a>(
        &'a mut self,
        algo: Algo,
        key: &PublicKeyParams,
    ) -> Option<&'a mut dyn Verify>;
}
impl dyn Ciphers {} // Ensure object-safe.

impl<C: Ciphers + ?Sized> Ciphers for &mut C {
    fn verifier<'a>(
        &'a mut self,
        algo: Algo,
        key: &PublicKeyParams,
    ) -> Option<&'a mut dyn Verify> {
        C::verifier(*self, algo, key)
    }
}

/// A [`Ciphers`] that blindly accepts all signatures.
///
/// This is useful for exercising parsers without a real key, for example
/// when fuzzing. It must never be used to make a trust decision.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoVerify;

impl Verify for NoVerify {
    fn verify(&mut self, _: &[&[u8]], _: &[u8]) -> Result<(), Error> {
        Ok(())
    }
}

impl Ciphers for NoVerify {
    fn verifier<'a>(
        &'a mut self,
        _: Algo,
        _: &PublicKeyParams,
    ) -> Option<&'a mut dyn Verify> {
        Some(self)
    }
}
