// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Galois/Counter Mode, per NIST SP 800-38D.
//!
//! The counter-mode half runs on the caller's [`block::Cipher`]; GHASH is
//! the RustCrypto `ghash` crate. GHASH only accepts whole blocks, so input
//! that arrives in pieces is staged in a one-block buffer until a block
//! fills up or its section ends.

use ghash::universal_hash::KeyInit as _;
use ghash::universal_hash::UniversalHash as _;
use ghash::GHash;
use zeroize::Zeroize;
use zeroize::ZeroizeOnDrop;

use crate::crypto::aead::Direction;
use crate::crypto::aead::Error;
use crate::crypto::aead::MAX_TAG_LEN;
use crate::crypto::block;
use crate::crypto::block::Block;
use crate::crypto::block::BLOCK_LEN;

/// The largest payload GCM can process under one nonce: 2^39 - 256 bits.
const MAX_PAYLOAD_LEN: u64 = (1 << 36) - 32;

/// The largest amount of associated data: 2^64 - 1 bits.
const MAX_AAD_LEN: u64 = (1 << 61) - 1;

/// Increments the rightmost 32 bits of a counter block.
fn inc32(block: &mut Block) {
    let mut ctr = [0; 4];
    ctr.copy_from_slice(&block[12..]);
    let ctr = u32::from_be_bytes(ctr).wrapping_add(1);
    block[12..].copy_from_slice(&ctr.to_be_bytes());
}

/// Builds the final GHASH block, `[len(a)]_64 || [len(b)]_64`, from lengths
/// in bytes.
fn len_block(a: u64, b: u64) -> Block {
    let mut block = [0; BLOCK_LEN];
    block[..8].copy_from_slice(&(a * 8).to_be_bytes());
    block[8..].copy_from_slice(&(b * 8).to_be_bytes());
    block
}

/// Consumes `ghash`, returning its output as a [`Block`].
fn finish_ghash(ghash: GHash) -> Block {
    let mut out = [0; BLOCK_LEN];
    out.copy_from_slice(&ghash.finalize());
    out
}

/// GHASH input staging, for callers that feed arbitrarily-sized pieces.
#[derive(Zeroize)]
struct Absorber {
    partial: Block,
    partial_len: usize,
}

impl Absorber {
    fn new() -> Self {
        Self {
            partial: [0; BLOCK_LEN],
            partial_len: 0,
        }
    }

    /// Feeds `data` to `ghash`, holding back any trailing partial block.
    fn absorb(&mut self, ghash: &mut GHash, mut data: &[u8]) {
        if self.partial_len > 0 {
            let n = data.len().min(BLOCK_LEN - self.partial_len);
            self.partial[self.partial_len..self.partial_len + n]
                .copy_from_slice(&data[..n]);
            self.partial_len += n;
            data = &data[n..];
            if self.partial_len < BLOCK_LEN {
                return;
            }
            ghash.update_padded(&self.partial);
            self.partial_len = 0;
        }

        let whole = data.len() - data.len() % BLOCK_LEN;
        ghash.update_padded(&data[..whole]);
        let tail = &data[whole..];
        self.partial[..tail.len()].copy_from_slice(tail);
        self.partial_len = tail.len();
    }

    /// Zero-pads and absorbs any partial block, ending a section.
    fn pad(&mut self, ghash: &mut GHash) {
        ghash.update_padded(&self.partial[..self.partial_len]);
        self.partial_len = 0;
    }
}

/// The state of one GCM operation.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(super) struct Gcm {
    /// `E(K, J0)`, which masks the final tag.
    tag_mask: Block,
    counter: Block,
    keystream: Block,
    keystream_pos: usize,
    #[zeroize(skip)]
    ghash: GHash,
    absorber: Absorber,
    aad_len: u64,
    payload_len: u64,
}

impl Gcm {
    pub fn start(
        cipher: &mut impl block::Cipher,
        nonce: &[u8],
        aad_len: usize,
        payload_len: usize,
        tag_len: usize,
    ) -> Result<Self, Error> {
        check!(!nonce.is_empty(), Error::BadInput);
        check!((4..=MAX_TAG_LEN).contains(&tag_len), Error::BadInput);
        let aad_len = aad_len as u64;
        let payload_len = payload_len as u64;
        check!(aad_len <= MAX_AAD_LEN, Error::BadInput);
        check!(payload_len <= MAX_PAYLOAD_LEN, Error::BadInput);

        // The hash subkey, `E(K, 0^128)`.
        let mut h = block::encrypt_copy(cipher, &[0; BLOCK_LEN])?;
        let key = ghash::Key::from_slice(&h);
        let ghash = GHash::new(key);

        // J0 is the nonce followed by a 32-bit counter of 1 when the nonce
        // is 96 bits long, and GHASH(nonce || pad || [len(nonce)]_64)
        // otherwise.
        let mut j0 = [0; BLOCK_LEN];
        if nonce.len() == 12 {
            j0[..12].copy_from_slice(nonce);
            j0[15] = 1;
        } else {
            let mut g = GHash::new(key);
            g.update_padded(nonce);
            g.update_padded(&len_block(0, nonce.len() as u64));
            j0 = finish_ghash(g);
        }
        h.zeroize();

        let tag_mask = block::encrypt_copy(cipher, &j0)?;
        inc32(&mut j0);
        Ok(Self {
            tag_mask,
            counter: j0,
            keystream: [0; BLOCK_LEN],
            keystream_pos: BLOCK_LEN,
            ghash,
            absorber: Absorber::new(),
            aad_len,
            payload_len,
        })
    }

    pub fn aad(&mut self, aad: &[u8], complete: bool) {
        self.absorber.absorb(&mut self.ghash, aad);
        if complete {
            self.absorber.pad(&mut self.ghash);
        }
    }

    pub fn payload(
        &mut self,
        cipher: &mut impl block::Cipher,
        dir: Direction,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        // GHASH always runs over the ciphertext.
        if dir == Direction::Decrypt {
            self.absorber.absorb(&mut self.ghash, buf);
        }
        for byte in buf.iter_mut() {
            if self.keystream_pos == BLOCK_LEN {
                self.keystream = block::encrypt_copy(cipher, &self.counter)?;
                inc32(&mut self.counter);
                self.keystream_pos = 0;
            }
            *byte ^= self.keystream[self.keystream_pos];
            self.keystream_pos += 1;
        }
        if dir == Direction::Encrypt {
            self.absorber.absorb(&mut self.ghash, buf);
        }
        Ok(())
    }

    pub fn tag(&mut self, out: &mut [u8; MAX_TAG_LEN]) {
        self.absorber.pad(&mut self.ghash);
        self.ghash
            .update_padded(&len_block(self.aad_len, self.payload_len));

        *out = finish_ghash(self.ghash.clone());
        out.iter_mut()
            .zip(self.tag_mask.iter())
            .for_each(|(t, m)| *t ^= m);
    }
}
