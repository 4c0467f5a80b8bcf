// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Cert chains.
//!
//! A chain starts at a leaf certificate with some public key we wish to
//! authenticate and ends at one of a set of [`TrustAnchors`]. The
//! intermediate certificates are supplied as an unordered pool; [`verify()`]
//! searches it for the issuer of each certificate in turn.

use crate::cert::Cert;
use crate::cert::Error;
use crate::cert::KeyUsage;
use crate::cert::Time;
use crate::cert::TrustAnchors;
use crate::crypto::sig;

/// The largest number of intermediate certificates [`verify()`] will
/// consider at once.
pub const MAX_INTERMEDIATES: usize = 32;

/// Options for [`verify()`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Options {
    /// The largest number of certificates in a chain, counting the leaf but
    /// not the trust anchor.
    pub max_depth: usize,
    /// The current time, if known. Validity periods are only checked when a
    /// time is provided.
    pub now: Option<Time>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: 8,
            now: None,
        }
    }
}

/// Verifies that `leaf` chains up to one of `anchors`, using certificates
/// from `intermediates`.
///
/// Each certificate on the path must be signed by the next one; every
/// issuing certificate must be a CA allowed to sign certificates and
/// respect its path length constraint. No certificate is used twice.
///
/// On success, returns the number of certificates in the path, counting the
/// leaf but not the trust anchor.
///
/// If no path is found, the most specific reason a candidate issuer was
/// rejected is returned, or [`Error::NoTrustAnchor`] if there were no
/// candidates at all.
pub fn verify(
    leaf: &Cert,
    intermediates: &[Cert],
    anchors: &TrustAnchors,
    options: &Options,
    ciphers: &mut impl sig::Ciphers,
) -> Result<usize, Error> {
    check!(options.max_depth > 0, Error::ChainTooLong);
    check!(intermediates.len() <= MAX_INTERMEDIATES, Error::ChainTooLong);

    if let Some(now) = options.now {
        leaf.check_validity(now)?;
    }

    let mut used = 0u32;
    let mut current = leaf;
    let mut depth = 1;
    loop {
        let mut rejection = None;

        for anchor in anchors.iter() {
            if anchor.subject() != current.issuer() {
                continue;
            }
            match current.verify_signature(anchor.key(), ciphers) {
                Ok(()) => {
                    info!("chain: verified path of {} certificates", depth);
                    return Ok(depth);
                }
                Err(e) => rejection = Some(e),
            }
        }

        if depth >= options.max_depth {
            return Err(fail!(
                rejection.unwrap_or(Error::ChainTooLong),
                "chain: no anchor within {} certificates",
                options.max_depth
            ));
        }

        let mut next = None;
        for (i, candidate) in intermediates.iter().enumerate() {
            if used & (1 << i) != 0 || candidate.subject() != current.issuer()
            {
                continue;
            }
            match check_link(current, candidate, depth, options, ciphers) {
                Ok(()) => {
                    next = Some(i);
                    break;
                }
                Err(e) => rejection = Some(e),
            }
        }

        let i = match next {
            Some(i) => i,
            None => return Err(fail!(rejection.unwrap_or(Error::NoTrustAnchor))),
        };
        trace!("chain: certificate {} issued by intermediate {}", depth - 1, i);
        used |= 1 << i;
        current = &intermediates[i];
        depth += 1;
    }
}

/// Checks that `issuer` may have issued `cert`, which is preceded by
/// `depth - 1` certificates in the chain.
fn check_link(
    cert: &Cert,
    issuer: &Cert,
    depth: usize,
    options: &Options,
    ciphers: &mut impl sig::Ciphers,
) -> Result<(), Error> {
    check!(issuer.is_ca_cert(), Error::BadChainLink);
    check!(issuer.allows(KeyUsage::KeyCertSign), Error::BadChainLink);
    // The leaf does not count towards the path length.
    check!(
        issuer.is_within_path_len_constraint(depth - 1),
        Error::BadChainLink
    );
    if let Some(now) = options.now {
        issuer.check_validity(now)?;
    }
    cert.verify_signature(issuer.subject_key(), ciphers)
}

#[cfg(test)]
#[path = "chain_test.rs"]
mod test;
