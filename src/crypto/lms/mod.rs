// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Leighton-Micali hash-based signatures.
//!
//! This module verifies LMS signatures (RFC 8554), including their SHA-256/192
//! parameter sets from NIST SP 800-208, and the hierarchical HSS scheme
//! layered on top of them ([`hss`]). With the `std` feature, [`sign`]
//! provides a software signer for tooling and tests.
//!
//! Which parameter sets are acceptable is a matter of configuration: every
//! verification takes a [`Policy`], and signatures or keys using a parameter
//! set outside of it are rejected before any hashing takes place.
//!
//! All hashing goes through a [`hash::Engine`], and is always SHA-256; the
//! 192-bit parameter sets truncate its output.

use enumflags2::BitFlags;

use crate::crypto::csrng;
use crate::crypto::ct_eq;
use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::crypto::sig;
use crate::io;
use crate::io::read::take;
use crate::io::Read as _;

pub mod hss;
mod ots;

#[cfg(feature = "std")]
pub mod sign;

#[cfg(test)]
mod test;
#[cfg(test)]
mod testdata;

/// The length of the key-pair identifier `I`.
pub const ID_LEN: usize = 16;

/// The largest hash output `n` (or `m`) of any parameter set.
pub const MAX_HASH_LEN: usize = 32;

/// A single tree node, or any other hash value; only the first `n` bytes are
/// meaningful.
type Node = [u8; MAX_HASH_LEN];

// Domain-separation constants, RFC 8554 section 3.
const D_PBLC: u16 = 0x8080;
const D_MESG: u16 = 0x8181;
const D_LEAF: u16 = 0x8282;
const D_INTR: u16 = 0x8383;

/// An LMS parameter set: the tree height `h` and hash length `m`.
#[enumflags2::bitflags]
#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum LmsType {
    /// `LMS_SHA256_M32_H5`.
    Sha256M32H5 = 1 << 0,
    /// `LMS_SHA256_M32_H10`.
    Sha256M32H10 = 1 << 1,
    /// `LMS_SHA256_M32_H15`.
    Sha256M32H15 = 1 << 2,
    /// `LMS_SHA256_M32_H20`.
    Sha256M32H20 = 1 << 3,
    /// `LMS_SHA256_M32_H25`.
    Sha256M32H25 = 1 << 4,
    /// `LMS_SHA256_M24_H5`.
    Sha256M24H5 = 1 << 5,
    /// `LMS_SHA256_M24_H10`.
    Sha256M24H10 = 1 << 6,
    /// `LMS_SHA256_M24_H15`.
    Sha256M24H15 = 1 << 7,
    /// `LMS_SHA256_M24_H20`.
    Sha256M24H20 = 1 << 8,
    /// `LMS_SHA256_M24_H25`.
    Sha256M24H25 = 1 << 9,
}

impl LmsType {
    /// Returns the IANA registry code for this parameter set.
    pub fn code(self) -> u32 {
        match self {
            Self::Sha256M32H5 => 0x05,
            Self::Sha256M32H10 => 0x06,
            Self::Sha256M32H15 => 0x07,
            Self::Sha256M32H20 => 0x08,
            Self::Sha256M32H25 => 0x09,
            Self::Sha256M24H5 => 0x0a,
            Self::Sha256M24H10 => 0x0b,
            Self::Sha256M24H15 => 0x0c,
            Self::Sha256M24H20 => 0x0d,
            Self::Sha256M24H25 => 0x0e,
        }
    }

    /// Looks up a parameter set by its registry code.
    pub fn from_code(code: u32) -> Option<Self> {
        BitFlags::<Self>::all().iter().find(|t| t.code() == code)
    }

    /// Returns the number of bytes in each tree node, `m`.
    pub fn m(self) -> usize {
        if BitFlags::from(self).intersects(Self::m24()) {
            24
        } else {
            32
        }
    }

    /// Returns the height of the tree, `h`.
    pub fn h(self) -> u32 {
        match self {
            Self::Sha256M32H5 | Self::Sha256M24H5 => 5,
            Self::Sha256M32H10 | Self::Sha256M24H10 => 10,
            Self::Sha256M32H15 | Self::Sha256M24H15 => 15,
            Self::Sha256M32H20 | Self::Sha256M24H20 => 20,
            Self::Sha256M32H25 | Self::Sha256M24H25 => 25,
        }
    }

    /// Returns the number of leaves, i.e., one-time keys, in the tree.
    pub fn leaves(self) -> u32 {
        1 << self.h()
    }

    fn m24() -> BitFlags<Self> {
        Self::Sha256M24H5
            | Self::Sha256M24H10
            | Self::Sha256M24H15
            | Self::Sha256M24H20
            | Self::Sha256M24H25
    }
}

/// An LM-OTS parameter set: the hash length `n` and Winternitz width `w`.
#[enumflags2::bitflags]
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum OtsType {
    /// `LMOTS_SHA256_N32_W1`.
    Sha256N32W1 = 1 << 0,
    /// `LMOTS_SHA256_N32_W2`.
    Sha256N32W2 = 1 << 1,
    /// `LMOTS_SHA256_N32_W4`.
    Sha256N32W4 = 1 << 2,
    /// `LMOTS_SHA256_N32_W8`.
    Sha256N32W8 = 1 << 3,
    /// `LMOTS_SHA256_N24_W1`.
    Sha256N24W1 = 1 << 4,
    /// `LMOTS_SHA256_N24_W2`.
    Sha256N24W2 = 1 << 5,
    /// `LMOTS_SHA256_N24_W4`.
    Sha256N24W4 = 1 << 6,
    /// `LMOTS_SHA256_N24_W8`.
    Sha256N24W8 = 1 << 7,
}

/// Derived LM-OTS parameters, RFC 8554 section 4.1 and appendix B.
struct OtsParams {
    n: usize,
    w: u8,
    p: usize,
    ls: u32,
}

impl OtsType {
    /// Returns the IANA registry code for this parameter set.
    pub fn code(self) -> u32 {
        match self {
            Self::Sha256N32W1 => 0x01,
            Self::Sha256N32W2 => 0x02,
            Self::Sha256N32W4 => 0x03,
            Self::Sha256N32W8 => 0x04,
            Self::Sha256N24W1 => 0x05,
            Self::Sha256N24W2 => 0x06,
            Self::Sha256N24W4 => 0x07,
            Self::Sha256N24W8 => 0x08,
        }
    }

    /// Looks up a parameter set by its registry code.
    pub fn from_code(code: u32) -> Option<Self> {
        BitFlags::<Self>::all().iter().find(|t| t.code() == code)
    }

    fn params(self) -> OtsParams {
        let (n, w, p, ls) = match self {
            Self::Sha256N32W1 => (32, 1, 265, 7),
            Self::Sha256N32W2 => (32, 2, 133, 6),
            Self::Sha256N32W4 => (32, 4, 67, 4),
            Self::Sha256N32W8 => (32, 8, 34, 0),
            Self::Sha256N24W1 => (24, 1, 200, 8),
            Self::Sha256N24W2 => (24, 2, 101, 6),
            Self::Sha256N24W4 => (24, 4, 51, 4),
            Self::Sha256N24W8 => (24, 8, 26, 0),
        };
        OtsParams { n, w, p, ls }
    }

    /// Returns the hash length `n`.
    pub fn n(self) -> usize {
        self.params().n
    }

    /// Returns the Winternitz parameter `w`, in bits.
    pub fn w(self) -> u8 {
        self.params().w
    }

    /// Returns the number of hash chains, `p`.
    pub fn p(self) -> usize {
        self.params().p
    }

    /// Returns the length of an encoded LM-OTS signature of this type.
    pub fn signature_len(self) -> usize {
        4 + self.n() * (1 + self.p())
    }
}

/// The largest number of hash chains of any LM-OTS parameter set.
const MAX_P: usize = 265;

/// The set of parameter sets a verifier is willing to accept.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Policy {
    /// Accepted LMS types.
    pub lms: BitFlags<LmsType>,
    /// Accepted LM-OTS types.
    pub ots: BitFlags<OtsType>,
}

impl Policy {
    /// A policy accepting every supported parameter set.
    pub fn all() -> Self {
        Self {
            lms: BitFlags::all(),
            ots: BitFlags::all(),
        }
    }

    /// Returns whether this policy permits the given combination.
    pub fn allows(&self, lms: LmsType, ots: OtsType) -> bool {
        self.lms.contains(lms) && self.ots.contains(ots)
    }
}

impl Default for Policy {
    /// Accepts the 256-bit (`M32`/`N32`) parameter sets of RFC 8554.
    fn default() -> Self {
        Self {
            lms: !LmsType::m24(),
            ots: OtsType::Sha256N32W1
                | OtsType::Sha256N32W2
                | OtsType::Sha256N32W4
                | OtsType::Sha256N32W8,
        }
    }
}

/// An error returned by an LMS operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// A key or signature was malformed, used an unknown parameter set, or
    /// used one that the [`Policy`] does not permit.
    BadInput,
    /// The signature did not verify.
    VerifyFailed,
    /// The hash engine failed.
    Hash(hash::Error),
    /// Every one-time key of a private key has been used.
    OutOfPrivateKeys,
    /// The CSRNG failed while creating a key.
    Csrng(csrng::Error),
}

impl From<csrng::Error> for Error {
    fn from(e: csrng::Error) -> Self {
        Self::Csrng(e)
    }
}

impl From<hash::Error> for Error {
    fn from(e: hash::Error) -> Self {
        Self::Hash(e)
    }
}

impl From<io::Error> for Error {
    fn from(_: io::Error) -> Self {
        Self::BadInput
    }
}

/// Computes SHA-256 over the concatenation of `chunks`.
fn sha256<H: hash::Engine + ?Sized>(
    hashes: &mut H,
    chunks: &[&[u8]],
) -> Result<Node, Error> {
    let mut out = [0; MAX_HASH_LEN];
    let mut h = hashes.new_hash(hash::Algo::Sha256)?;
    h.write_all(chunks)?;
    h.finish(&mut out)?;
    Ok(out)
}

/// Reads a big-endian `u32` and maps it through `f`, failing if the
/// code is unknown.
fn read_type<T>(
    buf: &mut &[u8],
    f: impl FnOnce(u32) -> Option<T>,
) -> Result<T, Error> {
    let code = buf.read_be::<u32>()?;
    f(code).ok_or_else(|| fail!(Error::BadInput, "lms: unknown type {:#x}", code))
}

/// An LMS public key.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PublicKey {
    lms: LmsType,
    ots: OtsType,
    id: [u8; ID_LEN],
    root: Node,
}

impl PublicKey {
    /// Creates a public key from its components.
    ///
    /// `root` must be exactly `lms.m()` bytes long.
    pub fn new(
        lms: LmsType,
        ots: OtsType,
        id: [u8; ID_LEN],
        root: &[u8],
    ) -> Result<Self, Error> {
        check!(lms.m() == ots.n(), Error::BadInput);
        check!(root.len() == lms.m(), Error::BadInput);
        let mut node = [0; MAX_HASH_LEN];
        node[..root.len()].copy_from_slice(root);
        Ok(Self {
            lms,
            ots,
            id,
            root: node,
        })
    }

    /// Parses an encoded public key, which must span all of `bytes`.
    pub fn parse(mut bytes: &[u8]) -> Result<Self, Error> {
        let key = Self::read(&mut bytes)?;
        check!(bytes.is_empty(), Error::BadInput);
        Ok(key)
    }

    /// Parses an encoded public key from the front of `buf`.
    fn read(buf: &mut &[u8]) -> Result<Self, Error> {
        let lms = read_type(buf, LmsType::from_code)?;
        let ots = read_type(buf, OtsType::from_code)?;
        let mut id = [0; ID_LEN];
        buf.read_bytes(&mut id)?;
        let root = take(buf, lms.m())?;
        Self::new(lms, ots, id, root)
    }

    /// Returns the length of this key's encoding.
    pub fn encoded_len(&self) -> usize {
        4 + 4 + ID_LEN + self.lms.m()
    }

    /// Writes out this key's encoding:
    /// `u32 lms_type || u32 ots_type || I || T[1]`.
    pub fn write_to(&self, mut w: impl io::Write) -> Result<(), io::Error> {
        w.write_be::<u32>(self.lms.code())?;
        w.write_be::<u32>(self.ots.code())?;
        w.write_bytes(&self.id)?;
        w.write_bytes(self.root())
    }

    /// Returns this key's encoding.
    #[cfg(feature = "std")]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        // Writing into a `Vec` cannot fail.
        let _ = self.write_to(io::write::StdWrite(&mut out));
        out
    }

    /// Returns the LMS parameter set.
    pub fn lms_type(&self) -> LmsType {
        self.lms
    }

    /// Returns the LM-OTS parameter set.
    pub fn ots_type(&self) -> OtsType {
        self.ots
    }

    /// Returns the key-pair identifier `I`.
    pub fn id(&self) -> &[u8; ID_LEN] {
        &self.id
    }

    /// Returns the root of the Merkle tree, `T[1]`.
    pub fn root(&self) -> &[u8] {
        &self.root[..self.lms.m()]
    }
}

/// A parsed LMS signature, borrowing from its encoding.
///
/// Parsing checks the structure of the signature completely: once a
/// `Signature` exists, its lengths agree with its parameter sets and its
/// leaf index is within the tree.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Signature<'a> {
    q: u32,
    ots: OtsType,
    c: &'a [u8],
    y: &'a [u8],
    lms: LmsType,
    path: &'a [u8],
}

impl<'a> Signature<'a> {
    /// Parses an encoded signature, which must span all of `bytes`.
    pub fn parse(mut bytes: &'a [u8]) -> Result<Self, Error> {
        let sig = Self::read(&mut bytes)?;
        check!(bytes.is_empty(), Error::BadInput);
        Ok(sig)
    }

    /// Parses an encoded signature from the front of `buf`.
    fn read(buf: &mut &'a [u8]) -> Result<Self, Error> {
        let q = buf.read_be::<u32>()?;
        let ots = read_type(buf, OtsType::from_code)?;
        let c = take(buf, ots.n())?;
        let y = take(buf, ots.n() * ots.p())?;
        let lms = read_type(buf, LmsType::from_code)?;
        check!(lms.m() == ots.n(), Error::BadInput);
        check!(q < lms.leaves(), Error::BadInput);
        let path = take(buf, lms.h() as usize * lms.m())?;
        Ok(Self {
            q,
            ots,
            c,
            y,
            lms,
            path,
        })
    }

    /// Returns the length of an encoded signature for the given types.
    pub fn encoded_len(lms: LmsType, ots: OtsType) -> usize {
        4 + ots.signature_len() + 4 + lms.h() as usize * lms.m()
    }

    /// Returns the leaf index `q` of the one-time key that was used.
    pub fn leaf_index(&self) -> u32 {
        self.q
    }

    /// Returns the LMS parameter set.
    pub fn lms_type(&self) -> LmsType {
        self.lms
    }

    /// Returns the LM-OTS parameter set.
    pub fn ots_type(&self) -> OtsType {
        self.ots
    }

    /// Returns the `i`th node of the authentication path, counting from the
    /// leaf.
    fn path_node(&self, i: usize) -> &'a [u8] {
        let m = self.lms.m();
        &self.path[i * m..(i + 1) * m]
    }
}

/// Verifies `sig` over the concatenation of `message` with `key`.
///
/// The signature's parameter sets must match the key's, and both must be
/// allowed by `policy`.
pub fn verify<H: hash::Engine + ?Sized>(
    hashes: &mut H,
    policy: &Policy,
    key: &PublicKey,
    message: &[&[u8]],
    sig: &Signature,
) -> Result<(), Error> {
    check!(policy.allows(key.lms, key.ots), Error::BadInput);
    check!(sig.lms == key.lms && sig.ots == key.ots, Error::BadInput);

    let kc = ots::candidate_key(
        hashes, sig.ots, &key.id, sig.q, message, sig.c, sig.y,
    )?;

    // Fold the authentication path into the leaf, one level at a time, to
    // obtain a candidate root.
    let m = key.lms.m();
    let leaf_num = key.lms.leaves() + sig.q;
    let leaf = sha256(
        hashes,
        &[&key.id, &leaf_num.to_be_bytes(), &D_LEAF.to_be_bytes(), &kc[..m]],
    )?;
    let (_, root) = (0..key.lms.h() as usize).try_fold(
        (leaf_num, leaf),
        |(node_num, tmp), i| {
            let parent = (node_num / 2).to_be_bytes();
            let sibling = sig.path_node(i);
            let (left, right) = if node_num % 2 == 1 {
                (sibling, &tmp[..m])
            } else {
                (&tmp[..m], sibling)
            };
            let tmp = sha256(
                hashes,
                &[&key.id, &parent, &D_INTR.to_be_bytes(), left, right],
            )?;
            Ok::<_, Error>((node_num / 2, tmp))
        },
    )?;

    if !ct_eq(&root[..m], key.root()) {
        return Err(fail!(Error::VerifyFailed, "lms: root mismatch (q={})", sig.q));
    }
    trace!("lms: leaf {} verified", sig.q);
    Ok(())
}

/// A [`sig::Verify`] for HSS signatures, built from an encoded
/// [`hss::PublicKey`].
pub struct Verifier<H> {
    hashes: H,
    policy: Policy,
    key: hss::PublicKey,
}

impl<H: hash::Engine> Verifier<H> {
    /// Creates a new verifier for the encoded HSS public key `key`.
    pub fn new(hashes: H, policy: Policy, key: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            hashes,
            policy,
            key: hss::PublicKey::parse(key)?,
        })
    }
}

impl<H: hash::Engine> sig::Verify for Verifier<H> {
    fn verify(
        &mut self,
        message: &[&[u8]],
        signature: &[u8],
    ) -> Result<(), sig::Error> {
        let sig = hss::Signature::parse(signature)
            .map_err(|_| sig::Error::BadSignature)?;
        hss::verify(&mut self.hashes, &self.policy, &self.key, message, &sig)
            .map_err(|e| match e {
                Error::Hash(_) => sig::Error::Unspecified,
                _ => sig::Error::BadSignature,
            })
    }
}
