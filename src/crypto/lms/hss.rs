// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The Hierarchical Signature System, RFC 8554 section 6.
//!
//! An HSS key is a tree of LMS trees: the top-level key signs the public key
//! of the next level down, and so on, until the bottom-level key signs the
//! message.

use arrayvec::ArrayVec;

use crate::crypto::hash;
use crate::crypto::lms;
use crate::crypto::lms::Error;
use crate::crypto::lms::Policy;
use crate::io;
use crate::io::Read as _;

/// The largest number of levels `L` accepted in a key.
pub const MAX_LEVELS: u32 = 8;

/// An HSS public key: the level count and the top-level LMS key.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PublicKey {
    levels: u32,
    top: lms::PublicKey,
}

impl PublicKey {
    /// Creates a new key with `levels` levels below (and including) `top`.
    pub fn new(levels: u32, top: lms::PublicKey) -> Result<Self, Error> {
        check!((1..=MAX_LEVELS).contains(&levels), Error::BadInput);
        Ok(Self { levels, top })
    }

    /// Parses an encoded key, `u32 L || lms_public_key`, which must span
    /// all of `bytes`.
    pub fn parse(mut bytes: &[u8]) -> Result<Self, Error> {
        let levels = bytes.read_be::<u32>()?;
        let top = lms::PublicKey::parse(bytes)?;
        Self::new(levels, top)
    }

    /// Returns the number of levels, `L`.
    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Returns the top-level LMS key.
    pub fn top(&self) -> &lms::PublicKey {
        &self.top
    }

    /// Returns the length of this key's encoding.
    pub fn encoded_len(&self) -> usize {
        4 + self.top.encoded_len()
    }

    /// Writes out this key's encoding.
    pub fn write_to(&self, mut w: impl io::Write) -> Result<(), io::Error> {
        w.write_be::<u32>(self.levels)?;
        self.top.write_to(w)
    }

    /// Returns this key's encoding.
    #[cfg(feature = "std")]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        // Writing into a `Vec` cannot fail.
        let _ = self.write_to(io::write::StdWrite(&mut out));
        out
    }
}

/// A signed lower-level public key within an HSS signature.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
struct SignedKey<'a> {
    sig: lms::Signature<'a>,
    key: lms::PublicKey,
    raw_key: &'a [u8],
}

/// A parsed HSS signature, borrowing from its encoding.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Signature<'a> {
    signed_keys: ArrayVec<SignedKey<'a>, { MAX_LEVELS as usize - 1 }>,
    last: lms::Signature<'a>,
}

impl<'a> Signature<'a> {
    /// Parses an encoded signature, which must span all of `bytes`:
    /// `u32 Nspk || (signature || public_key)[Nspk] || signature`.
    pub fn parse(mut bytes: &'a [u8]) -> Result<Self, Error> {
        let buf = &mut bytes;
        let nspk = buf.read_be::<u32>()?;
        check!(nspk < MAX_LEVELS, Error::BadInput);

        let mut signed_keys = ArrayVec::new();
        for _ in 0..nspk {
            let sig = lms::Signature::read(buf)?;
            let before = *buf;
            let key = lms::PublicKey::read(buf)?;
            let raw_key = &before[..before.len() - buf.len()];
            signed_keys.push(SignedKey { sig, key, raw_key });
        }
        let last = lms::Signature::read(buf)?;
        check!(buf.is_empty(), Error::BadInput);
        Ok(Self { signed_keys, last })
    }

    /// Returns the number of levels this signature spans.
    pub fn levels(&self) -> u32 {
        self.signed_keys.len() as u32 + 1
    }

    /// Returns the signature made by the bottom-level key.
    pub fn message_signature(&self) -> &lms::Signature<'a> {
        &self.last
    }
}

/// Verifies `sig` over the concatenation of `message` with `key`.
///
/// Every level is verified with `policy`; the number of levels in `sig`
/// must match the key.
pub fn verify<H: hash::Engine + ?Sized>(
    hashes: &mut H,
    policy: &Policy,
    key: &PublicKey,
    message: &[&[u8]],
    sig: &Signature,
) -> Result<(), Error> {
    check!(sig.levels() == key.levels, Error::BadInput);

    let mut current = &key.top;
    for (level, signed) in sig.signed_keys.iter().enumerate() {
        lms::verify(hashes, policy, current, &[signed.raw_key], &signed.sig)
            .map_err(|e| fail!(e, "hss: level {} key rejected", level))?;
        current = &signed.key;
    }
    lms::verify(hashes, policy, current, message, &sig.last)?;
    info!("hss: verified {}-level signature", key.levels);
    Ok(())
}
