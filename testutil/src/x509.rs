// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! An X.509 certificate builder.
//!
//! Every field can be overridden, including with garbage, so the same
//! builder serves both as a fixture generator for chains and as a source of
//! malformed certificates for the parser.

use crate::der;

/// `id-ecPublicKey`.
pub const EC_PUBLIC_KEY: &[u32] = &[1, 2, 840, 10045, 2, 1];
/// `prime256v1`.
pub const P256: &[u32] = &[1, 2, 840, 10045, 3, 1, 7];
/// `ecdsa-with-SHA256`.
pub const ECDSA_SHA256: &[u32] = &[1, 2, 840, 10045, 4, 3, 2];
/// `id-alg-hss-lms-hashsig`.
pub const HSS_LMS: &[u32] = &[1, 2, 840, 113549, 1, 9, 16, 3, 17];
/// `id-ce-keyUsage`.
pub const KEY_USAGE: &[u32] = &[2, 5, 29, 15];
/// `id-ce-basicConstraints`.
pub const BASIC_CONSTRAINTS: &[u32] = &[2, 5, 29, 19];

/// `keyUsage` bits, numbered as in RFC 5280.
pub mod usage {
    pub const DIGITAL_SIGNATURE: u16 = 1 << 0;
    pub const KEY_CERT_SIGN: u16 = 1 << 5;
    pub const CRL_SIGN: u16 = 1 << 6;
}

/// Returns an ECDSA P-256 `AlgorithmIdentifier`.
pub fn ecdsa_sig_algo() -> Vec<u8> {
    der::seq(&[&der::oid(ECDSA_SHA256)])
}

/// Returns an HSS/LMS `AlgorithmIdentifier`.
pub fn hss_sig_algo() -> Vec<u8> {
    der::seq(&[&der::oid(HSS_LMS)])
}

/// Returns a `SubjectPublicKeyInfo` for an uncompressed P-256 point.
pub fn ecdsa_spki(point: &[u8]) -> Vec<u8> {
    der::seq(&[
        &der::seq(&[&der::oid(EC_PUBLIC_KEY), &der::oid(P256)]),
        &der::bits(point),
    ])
}

/// Returns a `SubjectPublicKeyInfo` for an encoded HSS public key.
pub fn hss_spki(key: &[u8]) -> Vec<u8> {
    der::seq(&[&hss_sig_algo(), &der::bits(key)])
}

/// Encodes a `keyUsage` bit mask as a minimal `BIT STRING`.
pub fn key_usage_bits(mask: u16) -> Vec<u8> {
    let mut bytes = vec![(mask as u8).reverse_bits()];
    if mask >> 8 != 0 {
        bytes.push(((mask >> 8) as u8).reverse_bits());
    }
    let last = *bytes.last().unwrap_or(&0);
    let unused = if last == 0 { 0 } else { last.trailing_zeros() as u8 };
    der::bits_with_unused(unused, &bytes)
}

/// Encodes a single `Extension`.
pub fn extension(oid: &[u32], critical: bool, value: &[u8]) -> Vec<u8> {
    if critical {
        der::seq(&[&der::oid(oid), &der::boolean(true), &der::octets(value)])
    } else {
        der::seq(&[&der::oid(oid), &der::octets(value)])
    }
}

/// A certificate under construction.
#[derive(Clone)]
pub struct CertBuilder {
    /// The encoded version field; `None` omits it (a v1 certificate).
    pub version: Option<Vec<u8>>,
    /// The encoded serial number.
    pub serial: Vec<u8>,
    /// The encoded `AlgorithmIdentifier` inside the TBS.
    pub inner_sig_algo: Vec<u8>,
    /// The encoded `AlgorithmIdentifier` after the TBS.
    pub outer_sig_algo: Vec<u8>,
    /// The encoded issuer name.
    pub issuer: Vec<u8>,
    /// The encoded validity period.
    pub validity: Vec<u8>,
    /// The encoded subject name.
    pub subject: Vec<u8>,
    /// The encoded subject public key info.
    pub spki: Vec<u8>,
    /// Raw fields inserted after the public key, such as unique IDs.
    pub after_spki: Vec<Vec<u8>>,
    /// Encoded extensions; `None` omits the extensions field.
    pub extensions: Option<Vec<Vec<u8>>>,
}

impl CertBuilder {
    /// Creates a v3 certificate for `subject`, issued by `issuer`, valid
    /// from 2020 through 2049, using ECDSA P-256 as its signature algorithm.
    pub fn new(issuer: &str, subject: &str, spki: Vec<u8>) -> Self {
        Self {
            version: Some(der::explicit(0, &der::uint(2))),
            serial: der::uint(0x1234),
            inner_sig_algo: ecdsa_sig_algo(),
            outer_sig_algo: ecdsa_sig_algo(),
            issuer: der::name(issuer),
            validity: der::seq(&[
                &der::utc_time("200101000000Z"),
                &der::utc_time("491231235959Z"),
            ]),
            subject: der::name(subject),
            spki,
            after_spki: Vec::new(),
            extensions: Some(Vec::new()),
        }
    }

    /// Switches the signature algorithm to HSS/LMS.
    pub fn hss_signed(mut self) -> Self {
        self.inner_sig_algo = hss_sig_algo();
        self.outer_sig_algo = hss_sig_algo();
        self
    }

    /// Sets the validity period, given as `UTCTime` strings.
    pub fn validity(mut self, not_before: &str, not_after: &str) -> Self {
        self.validity = der::seq(&[
            &der::utc_time(not_before),
            &der::utc_time(not_after),
        ]);
        self
    }

    /// Makes this a CA certificate: `basicConstraints` with `cA` set and
    /// `keyUsage` of `keyCertSign`.
    pub fn ca(self, path_len: Option<u32>) -> Self {
        let bc = match path_len {
            Some(len) => {
                der::seq(&[&der::boolean(true), &der::uint(len as u64)])
            }
            None => der::seq(&[&der::boolean(true)]),
        };
        self.extension(BASIC_CONSTRAINTS, true, &bc)
            .key_usage(usage::KEY_CERT_SIGN | usage::CRL_SIGN)
    }

    /// Adds a critical `keyUsage` extension.
    pub fn key_usage(self, mask: u16) -> Self {
        self.extension(KEY_USAGE, true, &key_usage_bits(mask))
    }

    /// Adds an arbitrary extension.
    pub fn extension(mut self, oid: &[u32], critical: bool, value: &[u8]) -> Self {
        self.extensions
            .get_or_insert_with(Vec::new)
            .push(extension(oid, critical, value));
        self
    }

    /// Returns the encoded `TBSCertificate`.
    pub fn tbs(&self) -> Vec<u8> {
        let mut fields = Vec::new();
        if let Some(v) = &self.version {
            fields.push(v.clone());
        }
        fields.push(self.serial.clone());
        fields.push(self.inner_sig_algo.clone());
        fields.push(self.issuer.clone());
        fields.push(self.validity.clone());
        fields.push(self.subject.clone());
        fields.push(self.spki.clone());
        fields.extend(self.after_spki.iter().cloned());
        if let Some(extns) = &self.extensions {
            if !extns.is_empty() {
                fields.push(der::explicit(3, &der::seq(&[&extns.concat()])));
            }
        }
        der::tlv(0x30, &fields.concat())
    }

    /// Signs the `TBSCertificate` with `signer` and returns the encoded
    /// certificate.
    pub fn sign(&self, signer: impl FnOnce(&[u8]) -> Vec<u8>) -> Vec<u8> {
        let tbs = self.tbs();
        let sig = signer(&tbs);
        der::seq(&[&tbs, &self.outer_sig_algo, &der::bits(&sig)])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_usage_is_minimal() {
        assert_eq!(
            key_usage_bits(usage::KEY_CERT_SIGN),
            vec![0x03, 0x02, 0x02, 0x04]
        );
        assert_eq!(
            key_usage_bits(usage::DIGITAL_SIGNATURE),
            vec![0x03, 0x02, 0x07, 0x80]
        );
        assert_eq!(
            key_usage_bits(1 << 8),
            vec![0x03, 0x03, 0x07, 0x00, 0x80]
        );
    }
}
