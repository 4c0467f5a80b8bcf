// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! A software LMS signer.
//!
//! One-time keys are derived from a secret seed as in RFC 8554 appendix A,
//! so the whole private key is described by its parameter sets, the
//! identifier `I`, the seed and the index of the next unused leaf. The Merkle
//! tree is rebuilt in memory on first use.
//!
//! This is intended for host-side tooling and tests. Signing state must be
//! persisted *before* a signature is released: reusing a one-time key
//! breaks the scheme entirely.
//!
//! Requires the `std` feature flag to be enabled.

use zeroize::Zeroize as _;

use crate::crypto::csrng;
use crate::crypto::hash;
use crate::crypto::lms;
use crate::crypto::lms::hss;
use crate::crypto::lms::ots;
use crate::crypto::lms::sha256;
use crate::crypto::lms::Error;
use crate::crypto::lms::LmsType;
use crate::crypto::lms::Node;
use crate::crypto::lms::OtsType;
use crate::crypto::lms::D_INTR;
use crate::crypto::lms::D_LEAF;
use crate::crypto::lms::ID_LEN;
use crate::crypto::lms::MAX_HASH_LEN;
use crate::io::write::StdWrite;
use crate::io::Write as _;

/// The chain index used to derive the per-signature randomizer `C`, which
/// is outside the range of real chain indices.
const RANDOMIZER_INDEX: u16 = 0xfffd;

/// An LMS private key.
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct PrivateKey {
    lms: LmsType,
    ots: OtsType,
    id: [u8; ID_LEN],
    seed: Vec<u8>,
    next_leaf: u32,
    /// The Merkle tree, in heap order: node `r` lives at `tree[r]`, with the
    /// root at `tree[1]`. Empty until first needed.
    #[cfg_attr(feature = "serde", serde(skip))]
    tree: Vec<Node>,
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.seed.zeroize();
    }
}

impl PrivateKey {
    /// Creates a private key from a secret `seed` of `ots.n()` bytes.
    pub fn new(
        lms: LmsType,
        ots: OtsType,
        id: [u8; ID_LEN],
        seed: &[u8],
    ) -> Result<Self, Error> {
        check!(lms.m() == ots.n(), Error::BadInput);
        check!(seed.len() == ots.n(), Error::BadInput);
        Ok(Self {
            lms,
            ots,
            id,
            seed: seed.to_vec(),
            next_leaf: 0,
            tree: Vec::new(),
        })
    }

    /// Creates a private key with a fresh seed and identifier drawn from
    /// `rng`.
    pub fn generate<R: csrng::Csrng + ?Sized>(
        lms: LmsType,
        ots: OtsType,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let mut id = [0; ID_LEN];
        rng.fill(&mut id)?;
        let mut seed = [0; MAX_HASH_LEN];
        rng.fill(&mut seed[..ots.n()])?;
        let key = Self::new(lms, ots, id, &seed[..ots.n()]);
        seed.zeroize();
        key
    }

    /// Returns the LMS parameter set.
    pub fn lms_type(&self) -> LmsType {
        self.lms
    }

    /// Returns the LM-OTS parameter set.
    pub fn ots_type(&self) -> OtsType {
        self.ots
    }

    /// Returns the number of signatures this key can still produce.
    pub fn remaining(&self) -> u32 {
        self.lms.leaves() - self.next_leaf.min(self.lms.leaves())
    }

    /// Returns the length of the signatures produced by [`Self::sign_hss()`].
    pub fn hss_signature_len(&self) -> usize {
        4 + lms::Signature::encoded_len(self.lms, self.ots)
    }

    /// Returns the LMS public key.
    pub fn public_key<H: hash::Engine + ?Sized>(
        &mut self,
        hashes: &mut H,
    ) -> Result<lms::PublicKey, Error> {
        self.build_tree(hashes)?;
        let m = self.lms.m();
        lms::PublicKey::new(self.lms, self.ots, self.id, &self.tree[1][..m])
    }

    /// Returns the public key of a single-level HSS key wrapping this key.
    pub fn hss_public_key<H: hash::Engine + ?Sized>(
        &mut self,
        hashes: &mut H,
    ) -> Result<hss::PublicKey, Error> {
        hss::PublicKey::new(1, self.public_key(hashes)?)
    }

    /// Signs the concatenation of `message`, consuming one leaf, and returns
    /// the encoded LMS signature.
    pub fn sign<H: hash::Engine + ?Sized>(
        &mut self,
        hashes: &mut H,
        message: &[&[u8]],
    ) -> Result<Vec<u8>, Error> {
        self.build_tree(hashes)?;
        let q = self.next_leaf;
        check!(q < self.lms.leaves(), Error::OutOfPrivateKeys);
        self.next_leaf += 1;

        let n = self.ots.n();
        let c = self.secret(hashes, q, RANDOMIZER_INDEX)?;
        let digest =
            ots::message_digest(hashes, self.ots, &self.id, q, &c[..n], message)?;

        let mut out = Vec::with_capacity(lms::Signature::encoded_len(
            self.lms, self.ots,
        ));
        let mut w_out = StdWrite(&mut out);
        w_out.write_be::<u32>(q)?;
        w_out.write_be::<u32>(self.ots.code())?;
        w_out.write_bytes(&c[..n])?;
        for i in 0..self.ots.p() {
            let a = ots::digit(&digest, self.ots, i);
            let mut x = self.secret(hashes, q, i as u16)?;
            let y = ots::chain(hashes, n, &self.id, q, i as u16, 0, a, &x)?;
            x.zeroize();
            w_out.write_bytes(&y[..n])?;
        }

        w_out.write_be::<u32>(self.lms.code())?;
        let m = self.lms.m();
        let mut r = self.lms.leaves() + q;
        while r > 1 {
            w_out.write_bytes(&self.tree[(r ^ 1) as usize][..m])?;
            r /= 2;
        }
        info!("lms: signed with leaf {}, {} left", q, self.remaining());
        Ok(out)
    }

    /// Signs the concatenation of `message` and returns an encoded
    /// single-level HSS signature.
    pub fn sign_hss<H: hash::Engine + ?Sized>(
        &mut self,
        hashes: &mut H,
        message: &[&[u8]],
    ) -> Result<Vec<u8>, Error> {
        let sig = self.sign(hashes, message)?;
        let mut out = Vec::with_capacity(4 + sig.len());
        out.extend_from_slice(&0u32.to_be_bytes());
        out.extend_from_slice(&sig);
        Ok(out)
    }

    /// Derives the `i`th secret value of the `q`th one-time key.
    fn secret<H: hash::Engine + ?Sized>(
        &self,
        hashes: &mut H,
        q: u32,
        i: u16,
    ) -> Result<Node, Error> {
        sha256(
            hashes,
            &[&self.id, &q.to_be_bytes(), &i.to_be_bytes(), &[0xff], &self.seed],
        )
    }

    /// Computes the public key of the `q`th one-time key.
    fn ots_public_key<H: hash::Engine + ?Sized>(
        &self,
        hashes: &mut H,
        q: u32,
    ) -> Result<Node, Error> {
        let n = self.ots.n();
        let end = ((1u16 << self.ots.w()) - 1) as u8;
        let z = (0..self.ots.p())
            .map(|i| {
                let mut x = self.secret(hashes, q, i as u16)?;
                let z = ots::chain(hashes, n, &self.id, q, i as u16, 0, end, &x);
                x.zeroize();
                z
            })
            .collect::<Result<Vec<_>, _>>()?;
        ots::public_key(hashes, n, &self.id, q, &z)
    }

    fn build_tree<H: hash::Engine + ?Sized>(
        &mut self,
        hashes: &mut H,
    ) -> Result<(), Error> {
        if !self.tree.is_empty() {
            return Ok(());
        }
        let m = self.lms.m();
        let leaves = self.lms.leaves();
        let mut tree = vec![[0; lms::MAX_HASH_LEN]; 2 * leaves as usize];
        for q in 0..leaves {
            let r = leaves + q;
            let k = self.ots_public_key(hashes, q)?;
            tree[r as usize] = sha256(
                hashes,
                &[&self.id, &r.to_be_bytes(), &D_LEAF.to_be_bytes(), &k[..m]],
            )?;
        }
        for r in (1..leaves).rev() {
            let (left, right) = (tree[2 * r as usize], tree[2 * r as usize + 1]);
            tree[r as usize] = sha256(
                hashes,
                &[
                    &self.id,
                    &r.to_be_bytes(),
                    &D_INTR.to_be_bytes(),
                    &left[..m],
                    &right[..m],
                ],
            )?;
        }
        self.tree = tree;
        Ok(())
    }
}
