// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! X.509 parsing.

use arrayvec::ArrayVec;
use enumflags2::BitFlags;

use crate::cert::der;
use crate::cert::der::Oid;
use crate::cert::der::Tag;
use crate::cert::BasicConstraints;
use crate::cert::Cert;
use crate::cert::Error;
use crate::cert::KeyUsage;
use crate::cert::Name;
use crate::cert::Time;
use crate::crypto::lms::hss;
use crate::crypto::sig::Algo;
use crate::crypto::sig::PublicKeyParams;

#[cfg(test)]
#[path = "x509_test.rs"]
mod test;

/// OIDs used by the parser.
mod oid {
    use crate::cert::der::Oid;

    pub const EC_PUBLIC_KEY: Oid = oid!(1, 2, 840, 10045, 2, 1);
    pub const P256: Oid = oid!(1, 2, 840, 10045, 3, 1, 7);
    pub const ECDSA_SHA256: Oid = oid!(1, 2, 840, 10045, 4, 3, 2);
    pub const HSS_LMS: Oid = oid!(1, 2, 840, 113549, 1, 9, 16, 3, 17);

    pub const KEY_USAGE: Oid = oid!(2, 5, 29, 15);
    pub const BASIC_CONSTRAINTS: Oid = oid!(2, 5, 29, 19);
}

/// The largest serial number permitted by RFC 5280, in octets.
const MAX_SERIAL_LEN: usize = 20;

/// The most extensions a single certificate may carry.
const MAX_EXTENSIONS: usize = 32;

/// The length of an uncompressed P-256 point.
const P256_POINT_LEN: usize = 65;

/// Parses a signature `AlgorithmIdentifier`'s contents.
///
/// Both supported algorithms require the parameters to be absent.
fn parse_algo(buf: &mut untrusted::Reader) -> Result<Algo, Error> {
    let algo = match der::oid(buf)? {
        oid::ECDSA_SHA256 => Algo::EcdsaP256Sha256,
        oid::HSS_LMS => Algo::HssLms,
        _ => return Err(fail!(Error::UnknownAlgorithm)),
    };
    check!(buf.at_end(), Error::InvalidData);
    Ok(algo)
}

/// Parses an X.509 certificate.
///
/// The following are treated as errors, on top of any DER encoding error:
/// - Version fields that are out of range, or explicitly encode v1.
/// - Zero or overlong serial numbers.
/// - Inner and outer signature algorithms that do not match.
/// - Unique identifiers in a v1 certificate, or extensions outside of v3.
/// - Duplicate extensions, and unrecognized critical extensions.
/// - `keyCertSign` usage without `basicConstraints` marking a CA, and vice
///   versa.
pub fn parse(cert: &[u8]) -> Result<Cert<'_>, Error> {
    let buf = untrusted::Input::from(cert);
    buf.read_all(Error::LengthMismatch, |buf| {
        der::tagged(Tag::SEQUENCE, buf, |buf| {
            let mark = buf.mark();
            let tbs = der::parse(Tag::SEQUENCE, buf)?;
            let tbs_bytes = buf.get_input_between_marks(mark, buf.mark())?;

            let sig_algo_bytes = der::parse(Tag::SEQUENCE, buf)?;
            let sig_algo =
                sig_algo_bytes.read_all(Error::LengthMismatch, parse_algo)?;
            let signature = der::bits_total(buf)?.as_slice_less_safe();

            let mut cert = tbs.read_all(Error::LengthMismatch, |buf| {
                parse_tbs(sig_algo_bytes, sig_algo, buf)
            })?;
            cert.tbs = tbs_bytes.as_slice_less_safe();
            cert.signature = signature;
            Ok(cert)
        })
    })
    .map(|mut c| {
        c.raw = cert;
        c
    })
}

fn parse_tbs<'cert>(
    sig_algo_bytes: untrusted::Input,
    sig_algo: Algo,
    buf: &mut untrusted::Reader<'cert>,
) -> Result<Cert<'cert>, Error> {
    // `version [0] EXPLICIT Version DEFAULT v1`. DER forbids encoding the
    // default value.
    let version = match der::opt(Tag::context_specific(0), buf)? {
        None => 1,
        Some(v) => {
            let v = v.read_all(Error::LengthMismatch, der::u32)?;
            check!(v == 1 || v == 2, Error::InvalidData);
            v as u8 + 1
        }
    };

    // The certificate serial number must be a positive `INTEGER` consisting
    // of at most 20 octets.
    let serial = der::uint(buf)?.as_slice_less_safe();
    check!(serial.len() > 1 || serial[0] != 0, Error::InvalidData);
    check!(serial.len() <= MAX_SERIAL_LEN, Error::InvalidData);

    // A mismatch between the inner and outer signature algorithm
    // identifiers (byte-for-byte) is a syntax error.
    let sig_algo2 = der::parse(Tag::SEQUENCE, buf)?;
    check!(
        sig_algo2.as_slice_less_safe() == sig_algo_bytes.as_slice_less_safe(),
        Error::InvalidData
    );

    // The issuer is an opaque name.
    let issuer = Name(der::parse(Tag::SEQUENCE, buf)?.as_slice_less_safe());

    let (not_before, not_after) = der::tagged(Tag::SEQUENCE, buf, |buf| {
        Ok((Time::parse(buf)?, Time::parse(buf)?))
    })?;

    // The subject is also opaque.
    let subject = Name(der::parse(Tag::SEQUENCE, buf)?.as_slice_less_safe());

    let subject_key = der::tagged(Tag::SEQUENCE, buf, parse_spki)?;

    // The unique identifiers are implicitly-tagged `BIT STRING`s, which we
    // check for presence but otherwise ignore.
    for n in 1..=2 {
        if der::opt(Tag::context_specific_primitive(n), buf)?.is_some() {
            check!(version >= 2, Error::InvalidData);
        }
    }

    let mut extns = Extensions::default();
    if let Some(e) = der::opt(Tag::context_specific(3), buf)? {
        check!(version == 3, Error::InvalidData);
        e.read_all(Error::LengthMismatch, |buf| {
            der::tagged(Tag::SEQUENCE, buf, |buf| {
                // `SEQUENCE SIZE (1..MAX) OF Extension`.
                check!(!buf.at_end(), Error::InvalidData);
                while !buf.at_end() {
                    parse_extn(buf, &mut extns)?;
                }
                Ok(())
            })
        })?;
    }

    // keyCertSign requires cA. The converse is not required: a CA may
    // restrict itself to, say, CRL signing, and then cannot issue.
    let is_ca = extns.basic_constraints.map_or(false, |bc| bc.is_ca);
    if let Some(ku) = extns.key_usage {
        check!(!ku.contains(KeyUsage::KeyCertSign) || is_ca, Error::InvalidData);
    }

    Ok(Cert {
        raw: &[],
        tbs: &[],
        version,
        serial,
        sig_algo,
        signature: &[],
        issuer,
        subject,
        not_before,
        not_after,
        subject_key,
        basic_constraints: extns.basic_constraints,
        key_usage: extns.key_usage,
    })
}

/// Parses the contents of a `SubjectPublicKeyInfo`.
fn parse_spki<'cert>(
    buf: &mut untrusted::Reader<'cert>,
) -> Result<PublicKeyParams<'cert>, Error> {
    let (algo, aparams) = der::tagged(Tag::SEQUENCE, buf, |buf| {
        let algo = der::oid(buf)?;
        let aparams = buf.read_bytes_to_end();
        Ok((algo, aparams))
    })?;
    let key = der::bits_total(buf)?.as_slice_less_safe();

    match algo {
        oid::EC_PUBLIC_KEY => {
            // Only the named curve P-256 is supported.
            let curve = aparams.read_all(Error::LengthMismatch, der::oid)?;
            check!(curve == oid::P256, Error::UnknownAlgorithm);
            check!(
                key.len() == P256_POINT_LEN && key[0] == 0x04,
                Error::InvalidData
            );
            Ok(PublicKeyParams::EcdsaP256 { point: key })
        }
        oid::HSS_LMS => {
            check!(aparams.is_empty(), Error::InvalidData);
            // The raw HSS key is placed directly in the `BIT STRING`.
            hss::PublicKey::parse(key)
                .map_err(|_| fail!(Error::InvalidData))?;
            Ok(PublicKeyParams::Hss { key })
        }
        _ => Err(fail!(Error::UnknownAlgorithm)),
    }
}

/// Extensions recognized by the parser.
#[derive(Default)]
struct Extensions<'cert> {
    seen: ArrayVec<Oid<'cert>, MAX_EXTENSIONS>,
    basic_constraints: Option<BasicConstraints>,
    key_usage: Option<BitFlags<KeyUsage>>,
}

fn parse_extn<'cert>(
    buf: &mut untrusted::Reader<'cert>,
    extns: &mut Extensions<'cert>,
) -> Result<(), Error> {
    der::tagged(Tag::SEQUENCE, buf, |buf| {
        let oid = der::oid(buf)?;
        check!(!extns.seen.contains(&oid), Error::InvalidData);
        extns
            .seen
            .try_push(oid)
            .map_err(|_| fail!(Error::InvalidData))?;

        // `critical BOOLEAN DEFAULT FALSE`; DER forbids encoding `FALSE`.
        let is_critical = match der::opt_bool(buf)? {
            Some(false) => return Err(fail!(Error::InvalidData)),
            Some(true) => true,
            None => false,
        };

        der::tagged(Tag::OCTET_STRING, buf, |buf| match oid {
            oid::KEY_USAGE => {
                let bits = der::bits_partial(buf)?.as_slice_less_safe();
                extns.key_usage = Some(key_usage_from_bits(bits)?);
                Ok(())
            }
            oid::BASIC_CONSTRAINTS => der::tagged(Tag::SEQUENCE, buf, |buf| {
                let is_ca = match der::opt_bool(buf)? {
                    Some(false) => return Err(fail!(Error::InvalidData)),
                    Some(true) => true,
                    None => false,
                };
                let path_len_constraint = der::opt_u32(buf)?;
                check!(
                    is_ca || path_len_constraint.is_none(),
                    Error::InvalidData
                );
                extns.basic_constraints = Some(BasicConstraints {
                    is_ca,
                    path_len_constraint,
                });
                Ok(())
            }),
            _ if is_critical => Err(fail!(
                Error::InvalidData,
                "x509: unknown critical extension {:?}",
                oid
            )),
            _ => {
                // Drop the rest of the bytes on the floor. `untrusted` requires
                // us to explicitly use all bytes, but we just want to ignore
                // them in this case.
                buf.skip_to_end();
                Ok(())
            }
        })
    })
}

/// Converts the contents of a `KeyUsage` `BIT STRING` into flags.
///
/// ASN.1 numbers bits from the most significant bit of the first byte, so
/// each byte is bit-reversed. Bits past `decipherOnly` are dropped.
fn key_usage_from_bits(bytes: &[u8]) -> Result<BitFlags<KeyUsage>, Error> {
    let b0 = bytes.first().copied().unwrap_or(0);
    let b1 = bytes.get(1).copied().unwrap_or(0);
    let val = u16::from_le_bytes([b0.reverse_bits(), b1.reverse_bits()]);
    let usage = BitFlags::<KeyUsage>::from_bits_truncate(val);
    check!(!usage.is_empty(), Error::InvalidData);
    Ok(usage)
}
