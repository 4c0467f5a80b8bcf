// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Certificate handling.
//!
//! This module decodes DER-encoded X.509 certificates into [`Cert`]s and
//! validates certificate chains against an explicit set of
//! [`TrustAnchors`].
//!
//! Parsing and signature verification are separate steps: [`Cert::parse()`]
//! only checks that a certificate is well-formed, while
//! [`chain::verify()`] finds a path from a leaf certificate to a trust
//! anchor and checks every signature along it.

use enumflags2::BitFlags;

use crate::crypto::sig;

// Note that all parsers leverage Brian Smith's `untrusted` crate to ensure
// we don't walk off the end of the buffer.
#[macro_use]
pub(crate) mod der;

pub mod chain;
mod time;
mod x509;

pub use time::Time;

/// A parsed X.509 certificate.
///
/// A `Cert` borrows from the buffer it was parsed from. Having a `Cert` only
/// means that the certificate is well-formed; its signature has not been
/// checked.
#[derive(Clone, Debug)]
pub struct Cert<'cert> {
    raw: &'cert [u8],
    tbs: &'cert [u8],
    version: u8,
    serial: &'cert [u8],
    sig_algo: sig::Algo,
    signature: &'cert [u8],
    issuer: Name<'cert>,
    subject: Name<'cert>,
    not_before: Time,
    not_after: Time,
    subject_key: sig::PublicKeyParams<'cert>,
    basic_constraints: Option<BasicConstraints>,
    key_usage: Option<BitFlags<KeyUsage>>,
}

/// The `basicConstraints` extension.
#[derive(Copy, Clone, Debug)]
struct BasicConstraints {
    is_ca: bool,
    path_len_constraint: Option<u32>,
}

/// A permitted usage of a certificate's subject key, from the `keyUsage`
/// extension.
///
/// Bit `n` corresponds to the RFC 5280 `KeyUsage` bit `n`.
#[enumflags2::bitflags]
#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[allow(missing_docs)]
pub enum KeyUsage {
    DigitalSignature = 1 << 0,
    NonRepudiation = 1 << 1,
    KeyEncipherment = 1 << 2,
    DataEncipherment = 1 << 3,
    KeyAgreement = 1 << 4,
    KeyCertSign = 1 << 5,
    CrlSign = 1 << 6,
    EncipherOnly = 1 << 7,
    DecipherOnly = 1 << 8,
}

/// An error produced while parsing or validating certificates.
///
/// Note: `Error: From<untrusted::EndOfInput>` is an *implementation detail*
/// that should not be relied upon.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The input ended before a complete value could be read.
    OutOfData,
    /// A value's contents were longer than its fields.
    LengthMismatch,
    /// A value had a different tag than expected.
    UnexpectedTag,
    /// A length was indefinite, too wide or not minimally encoded.
    InvalidLength,
    /// A value was syntactically valid DER, but was not a valid value for
    /// its field.
    InvalidData,
    /// An algorithm identifier was not recognized.
    UnknownAlgorithm,
    /// The signature algorithm of a certificate did not match the key it
    /// was verified with.
    WrongAlgorithm,
    /// A signature did not verify.
    BadSignature,
    /// Two adjacent certificates in a chain were incompatible: the issuer
    /// was not a CA, could not sign certificates, or its path length
    /// constraint was exceeded.
    BadChainLink,
    /// A chain could not be completed within the allowed depth.
    ChainTooLong,
    /// No path to any trust anchor was found.
    NoTrustAnchor,
    /// A certificate's validity period ended before the current time.
    Expired,
    /// A certificate's validity period starts after the current time.
    NotYetValid,
}

impl From<untrusted::EndOfInput> for Error {
    fn from(_: untrusted::EndOfInput) -> Self {
        Self::OutOfData
    }
}

impl<'cert> Cert<'cert> {
    /// Parses a DER-encoded certificate, which must span all of `der`.
    ///
    /// The signature is not checked; see [`Cert::verify_signature()`].
    pub fn parse(der: &'cert [u8]) -> Result<Self, Error> {
        x509::parse(der)
    }

    /// Checks this certificate's signature with the issuer's public `key`.
    pub fn verify_signature(
        &self,
        key: &sig::PublicKeyParams,
        ciphers: &mut impl sig::Ciphers,
    ) -> Result<(), Error> {
        check!(key.is_params_for(self.sig_algo), Error::WrongAlgorithm);
        let verifier = ciphers
            .verifier(self.sig_algo, key)
            .ok_or_else(|| fail!(Error::UnknownAlgorithm))?;
        verifier
            .verify(&[self.tbs], self.signature)
            .map_err(|_| fail!(Error::BadSignature))
    }

    /// Returns the slice this certificate was parsed from.
    pub fn raw(&self) -> &'cert [u8] {
        self.raw
    }

    /// Returns the encoded `TBSCertificate`, the signed portion of the
    /// certificate.
    pub fn tbs(&self) -> &'cert [u8] {
        self.tbs
    }

    /// Returns the X.509 version: 1, 2 or 3.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the big-endian bytes of the serial number.
    pub fn serial(&self) -> &'cert [u8] {
        self.serial
    }

    /// Returns the algorithm this certificate was signed with.
    pub fn sig_algo(&self) -> sig::Algo {
        self.sig_algo
    }

    /// Returns the raw signature bytes.
    pub fn signature(&self) -> &'cert [u8] {
        self.signature
    }

    /// Returns the name of the certificate issuer (i.e., the subject of the
    /// certificate that signed it).
    pub fn issuer(&self) -> Name<'cert> {
        self.issuer
    }

    /// Returns the name of the certificate subject.
    pub fn subject(&self) -> Name<'cert> {
        self.subject
    }

    /// Returns whether the issuer and subject names are identical.
    pub fn is_self_issued(&self) -> bool {
        self.issuer == self.subject
    }

    /// Returns the start of the validity period.
    pub fn not_before(&self) -> Time {
        self.not_before
    }

    /// Returns the end of the validity period.
    pub fn not_after(&self) -> Time {
        self.not_after
    }

    /// Checks that `now` lies within the validity period, inclusive.
    pub fn check_validity(&self, now: Time) -> Result<(), Error> {
        check!(now >= self.not_before, Error::NotYetValid);
        check!(now <= self.not_after, Error::Expired);
        Ok(())
    }

    /// The subject key bound to this certificate.
    pub fn subject_key(&self) -> &sig::PublicKeyParams<'cert> {
        &self.subject_key
    }

    /// Returns the contents of the `keyUsage` extension, if present.
    pub fn key_usage(&self) -> Option<BitFlags<KeyUsage>> {
        self.key_usage
    }

    /// Returns whether the subject key may be used for `usage`.
    ///
    /// A certificate without a `keyUsage` extension allows every usage.
    pub fn allows(&self, usage: KeyUsage) -> bool {
        self.key_usage.map_or(true, |ku| ku.contains(usage))
    }

    /// Whether this certificate's public key can be used to sign other
    /// certificates.
    pub fn supports_cert_signing(&self) -> bool {
        self.is_ca_cert() && self.allows(KeyUsage::KeyCertSign)
    }

    /// Returns whether this certificate is *explicitly* a CA (i.e., not
    /// leaf) cert, via its `basicConstraints`.
    pub fn is_ca_cert(&self) -> bool {
        self.basic_constraints.map_or(false, |bc| bc.is_ca)
    }

    /// Returns the path length constraint, if any.
    pub fn path_len_constraint(&self) -> Option<u32> {
        self.basic_constraints.and_then(|bc| bc.path_len_constraint)
    }

    /// Returns whether `len` is within the path length constraint for this
    /// certificate.
    ///
    /// If this certificate signs another certificate in a trust chain, it
    /// may specify the maximum number of non-leaf certificates that may
    /// follow it. `len` should be this number.
    pub fn is_within_path_len_constraint(&self, len: usize) -> bool {
        match self.path_len_constraint() {
            Some(l) => l as usize >= len,
            None => true,
        }
    }
}

/// A name associated with a certificate.
///
/// Names may only be printed (for debugging purposes) or compared
/// byte-for-byte. `trustagent` does not support X.500 distinguished name
/// comparisons.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Name<'cert>(&'cert [u8]);

impl<'cert> Name<'cert> {
    /// Wraps the contents of an encoded X.501 `Name`, without its
    /// `SEQUENCE` tag and length.
    pub fn new(contents: &'cert [u8]) -> Self {
        Self(contents)
    }

    /// Returns the encoded contents of this name.
    pub fn as_bytes(&self) -> &'cert [u8] {
        self.0
    }
}

/// A trusted public key, together with the name it signs certificates as.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Anchor<'a> {
    subject: Name<'a>,
    key: sig::PublicKeyParams<'a>,
}

impl<'a> Anchor<'a> {
    /// Creates an anchor from a subject name and key.
    pub fn new(subject: Name<'a>, key: sig::PublicKeyParams<'a>) -> Self {
        Self { subject, key }
    }

    /// Trusts the subject and key of `cert`, typically a self-signed root.
    ///
    /// The certificate itself is not checked in any way.
    pub fn from_cert(cert: &Cert<'a>) -> Self {
        Self::new(cert.subject(), *cert.subject_key())
    }

    /// Returns the anchor's subject name.
    pub fn subject(&self) -> Name<'a> {
        self.subject
    }

    /// Returns the anchor's public key.
    pub fn key(&self) -> &sig::PublicKeyParams<'a> {
        &self.key
    }
}

/// A set of trust anchors, which terminate certificate chains.
#[derive(Copy, Clone, Debug)]
pub struct TrustAnchors<'a> {
    anchors: &'a [Anchor<'a>],
}

impl<'a> TrustAnchors<'a> {
    /// Creates a new set of trust anchors.
    pub fn new(anchors: &'a [Anchor<'a>]) -> Self {
        Self { anchors }
    }

    /// Returns an iterator over the anchors.
    pub fn iter(&self) -> core::slice::Iter<'a, Anchor<'a>> {
        self.anchors.iter()
    }

    /// Returns the number of anchors.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Returns whether there are no anchors at all.
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}
