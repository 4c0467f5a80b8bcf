// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Counter with CBC-MAC, per NIST SP 800-38C and RFC 3610.
//!
//! CCM\* differs only in allowing a zero-length tag, in which case no MAC is
//! computed at all.

use zeroize::Zeroize;
use zeroize::ZeroizeOnDrop;

use crate::crypto::aead::Direction;
use crate::crypto::aead::Error;
use crate::crypto::aead::MAX_TAG_LEN;
use crate::crypto::block;
use crate::crypto::block::Block;
use crate::crypto::block::BLOCK_LEN;

/// The state of one CCM operation.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(super) struct Ccm {
    /// The size of the length field, `q = 15 - nonce_len`.
    q: usize,
    /// The counter block template: flags, nonce, and the counter `i`.
    counter: Block,
    next_counter: u64,
    keystream: Block,
    keystream_pos: usize,
    /// `E(K, A0)`, which masks the final tag.
    tag_mask: Block,
    /// The running CBC-MAC, with pending bytes already XORed in.
    mac: Block,
    mac_pos: usize,
    authenticate: bool,
}

impl Ccm {
    pub fn start(
        cipher: &mut impl block::Cipher,
        nonce: &[u8],
        aad_len: usize,
        payload_len: usize,
        tag_len: usize,
    ) -> Result<Self, Error> {
        check!((7..=13).contains(&nonce.len()), Error::BadInput);
        check!(
            tag_len == 0
                || ((4..=MAX_TAG_LEN).contains(&tag_len) && tag_len % 2 == 0),
            Error::BadInput
        );
        let q = 15 - nonce.len();
        let payload_len = payload_len as u64;
        check!(q >= 8 || payload_len >> (8 * q) == 0, Error::BadInput);

        let mut counter = [0; BLOCK_LEN];
        counter[0] = (q - 1) as u8;
        counter[1..=nonce.len()].copy_from_slice(nonce);

        let mut ccm = Self {
            q,
            counter,
            next_counter: 1,
            keystream: [0; BLOCK_LEN],
            keystream_pos: BLOCK_LEN,
            tag_mask: block::encrypt_copy(cipher, &counter)?,
            mac: [0; BLOCK_LEN],
            mac_pos: 0,
            authenticate: tag_len != 0,
        };
        if !ccm.authenticate {
            return Ok(ccm);
        }

        // B0 := flags || nonce || [payload_len]_q.
        let mut b0 = [0; BLOCK_LEN];
        b0[0] = (q - 1) as u8 | (((tag_len - 2) / 2) as u8) << 3;
        if aad_len > 0 {
            b0[0] |= 0x40;
        }
        b0[1..=nonce.len()].copy_from_slice(nonce);
        for (i, b) in b0[16 - q..].iter_mut().rev().enumerate() {
            *b = payload_len.checked_shr(8 * i as u32).unwrap_or(0) as u8;
        }
        ccm.mac = block::encrypt_copy(cipher, &b0)?;

        // The associated data is prefixed with an encoding of its length.
        match aad_len as u64 {
            0 => {}
            len @ 1..=0xfeff => {
                ccm.absorb(cipher, &(len as u16).to_be_bytes())?;
            }
            len @ 0xff00..=0xffff_ffff => {
                ccm.absorb(cipher, &[0xff, 0xfe])?;
                ccm.absorb(cipher, &(len as u32).to_be_bytes())?;
            }
            len => {
                ccm.absorb(cipher, &[0xff, 0xff])?;
                ccm.absorb(cipher, &len.to_be_bytes())?;
            }
        }
        Ok(ccm)
    }

    /// Feeds `data` into the CBC-MAC.
    fn absorb(
        &mut self,
        cipher: &mut impl block::Cipher,
        data: &[u8],
    ) -> Result<(), Error> {
        for &byte in data {
            self.mac[self.mac_pos] ^= byte;
            self.mac_pos += 1;
            if self.mac_pos == BLOCK_LEN {
                cipher.encrypt_block(&mut self.mac)?;
                self.mac_pos = 0;
            }
        }
        Ok(())
    }

    /// Finishes any partial CBC-MAC block; the zero padding is implicit.
    fn pad(&mut self, cipher: &mut impl block::Cipher) -> Result<(), Error> {
        if self.mac_pos != 0 {
            cipher.encrypt_block(&mut self.mac)?;
            self.mac_pos = 0;
        }
        Ok(())
    }

    pub fn aad(
        &mut self,
        cipher: &mut impl block::Cipher,
        aad: &[u8],
        complete: bool,
    ) -> Result<(), Error> {
        if !self.authenticate {
            return Ok(());
        }
        self.absorb(cipher, aad)?;
        if complete {
            self.pad(cipher)?;
        }
        Ok(())
    }

    pub fn payload(
        &mut self,
        cipher: &mut impl block::Cipher,
        dir: Direction,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        for byte in buf.iter_mut() {
            if self.keystream_pos == BLOCK_LEN {
                let i = self.next_counter;
                let q = self.q;
                for (j, b) in self.counter[16 - q..].iter_mut().rev().enumerate()
                {
                    *b = i.checked_shr(8 * j as u32).unwrap_or(0) as u8;
                }
                self.keystream = block::encrypt_copy(cipher, &self.counter)?;
                self.next_counter += 1;
                self.keystream_pos = 0;
            }
            let k = self.keystream[self.keystream_pos];
            self.keystream_pos += 1;

            // The CBC-MAC always runs over the plaintext.
            match dir {
                Direction::Encrypt => {
                    if self.authenticate {
                        self.absorb(cipher, &[*byte])?;
                    }
                    *byte ^= k;
                }
                Direction::Decrypt => {
                    *byte ^= k;
                    if self.authenticate {
                        self.absorb(cipher, &[*byte])?;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn tag(
        &mut self,
        cipher: &mut impl block::Cipher,
        out: &mut [u8; MAX_TAG_LEN],
    ) -> Result<(), Error> {
        if !self.authenticate {
            *out = [0; MAX_TAG_LEN];
            return Ok(());
        }
        self.pad(cipher)?;
        out.iter_mut()
            .zip(self.mac.iter().zip(self.tag_mask.iter()))
            .for_each(|(t, (m, s))| *t = m ^ s);
        Ok(())
    }
}
