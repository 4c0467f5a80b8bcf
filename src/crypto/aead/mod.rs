// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Authenticated encryption with associated data.
//!
//! This module implements CCM (NIST SP 800-38C, RFC 3610), its IEEE
//! 802.15.4 variant CCM\*, and GCM (NIST SP 800-38D) on top of any
//! [`block::Cipher`].
//!
//! A [`Context`] drives one operation at a time through the following
//! states:
//! ```text
//! Idle --start()--> Aad --update_aad()*--> Payload --update()*--> finish*() --> Idle
//! ```
//! All lengths are declared up front in [`Context::start()`]; the context
//! refuses to process more data than declared, and refuses to finish before
//! everything declared has been processed. Calls made in the wrong state
//! fail with [`Error::BadState`].
//!
//! Decryption releases plaintext before the tag has been checked, since the
//! tag is only available once everything has been processed. Callers must
//! hand that plaintext back to [`Context::finish_verify()`], which erases it
//! if the tag does not match. [`Context::open_in_place()`] does this
//! automatically.

use zeroize::Zeroize as _;

#[cfg(feature = "arbitrary-derive")]
use libfuzzer_sys::arbitrary::{self, Arbitrary};

use crate::crypto::block;
use crate::crypto::ct_eq;

mod ccm;
mod gcm;


/// The largest tag produced by any [`Mode`].
pub const MAX_TAG_LEN: usize = 16;

/// An authenticated-encryption mode.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
pub enum Mode {
    /// Counter with CBC-MAC.
    ///
    /// Nonces are 7 to 13 bytes; tags are 4, 6, 8, 10, 12, 14 or 16 bytes.
    Ccm,
    /// CCM\*, which additionally permits a zero-length tag, turning the
    /// mode into unauthenticated counter-mode encryption.
    CcmStar,
    /// Galois/Counter Mode.
    ///
    /// Nonces may be any non-zero length (12 bytes is recommended); tags are
    /// 4 to 16 bytes.
    Gcm,
}

/// The direction of an operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Direction {
    /// Plaintext in, ciphertext and tag out.
    Encrypt,
    /// Ciphertext in, plaintext out; the tag is checked at the end.
    Decrypt,
}

/// An error returned by an AEAD operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// A parameter was invalid: a nonce or tag of the wrong length, more
    /// data than declared, or a finish before all declared data arrived.
    BadInput,
    /// The tag did not match the processed data.
    AuthenticationFailed,
    /// The operation was not valid in the context's current state.
    BadState,
    /// The underlying block cipher failed.
    Cipher(block::Error),
}

impl From<block::Error> for Error {
    fn from(e: block::Error) -> Self {
        Self::Cipher(e)
    }
}

/// A single-owner AEAD context, holding a loaded key.
pub struct Context<C> {
    cipher: C,
    mode: Mode,
    op: Option<Op>,
}

/// The bookkeeping for an in-flight operation.
struct Op {
    dir: Direction,
    aad_len: usize,
    aad_done: usize,
    payload_len: usize,
    payload_done: usize,
    tag_len: usize,
    engine: Engine,
}

enum Engine {
    Ccm(ccm::Ccm),
    Gcm(gcm::Gcm),
}

impl<C: block::Cipher> Context<C> {
    /// Creates a new context around an already-keyed `cipher`.
    pub fn init(cipher: C, mode: Mode) -> Self {
        Self {
            cipher,
            mode,
            op: None,
        }
    }

    /// Loads `key` through `builder` and creates a new context.
    ///
    /// Fails with [`Error::BadInput`] if the key length does not match
    /// `algo`.
    pub fn with_key<B>(
        builder: &B,
        algo: block::Algo,
        key: &[u8],
        mode: Mode,
    ) -> Result<Self, Error>
    where
        B: block::Builder<Cipher = C>,
    {
        check!(key.len() == algo.key_len(), Error::BadInput);
        let cipher = builder.new_cipher(algo, key)?;
        Ok(Self::init(cipher, mode))
    }

    /// Returns the mode this context was created with.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns whether an operation is in progress.
    pub fn is_busy(&self) -> bool {
        self.op.is_some()
    }

    /// Begins a new operation.
    ///
    /// The total number of associated-data and payload bytes must be known
    /// in advance. `tag_len` is the length of the tag that will be produced
    /// or checked.
    pub fn start(
        &mut self,
        dir: Direction,
        nonce: &[u8],
        aad_len: usize,
        payload_len: usize,
        tag_len: usize,
    ) -> Result<(), Error> {
        check!(self.op.is_none(), Error::BadState);
        let engine = match self.mode {
            Mode::Ccm | Mode::CcmStar => {
                check!(
                    tag_len != 0 || self.mode == Mode::CcmStar,
                    Error::BadInput
                );
                Engine::Ccm(ccm::Ccm::start(
                    &mut self.cipher,
                    nonce,
                    aad_len,
                    payload_len,
                    tag_len,
                )?)
            }
            Mode::Gcm => Engine::Gcm(gcm::Gcm::start(
                &mut self.cipher,
                nonce,
                aad_len,
                payload_len,
                tag_len,
            )?),
        };
        trace!(
            "aead: start {:?}/{:?}, aad={}, payload={}, tag={}",
            self.mode,
            dir,
            aad_len,
            payload_len,
            tag_len
        );
        self.op = Some(Op {
            dir,
            aad_len,
            aad_done: 0,
            payload_len,
            payload_done: 0,
            tag_len,
            engine,
        });
        Ok(())
    }

    /// Feeds associated data into the operation.
    ///
    /// May be called any number of times, but never after payload
    /// processing has begun.
    pub fn update_aad(&mut self, aad: &[u8]) -> Result<(), Error> {
        let op = self.op.as_mut().ok_or_else(|| fail!(Error::BadState))?;
        check!(op.payload_done == 0 || aad.is_empty(), Error::BadState);
        let total = op
            .aad_done
            .checked_add(aad.len())
            .ok_or_else(|| fail!(Error::BadInput))?;
        check!(total <= op.aad_len, Error::BadInput);

        let complete = total == op.aad_len;
        match &mut op.engine {
            Engine::Ccm(e) => e.aad(&mut self.cipher, aad, complete)?,
            Engine::Gcm(e) => e.aad(aad, complete),
        }
        op.aad_done = total;
        Ok(())
    }

    /// Encrypts or decrypts the next chunk of payload, from `input` into
    /// `output`.
    ///
    /// Returns the number of bytes written, which is always `input.len()`.
    pub fn update(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<usize, Error> {
        check!(output.len() >= input.len(), Error::BadInput);
        let out = &mut output[..input.len()];
        out.copy_from_slice(input);
        if let Err(e) = self.update_in_place(out) {
            out.zeroize();
            return Err(e);
        }
        Ok(input.len())
    }

    /// Encrypts or decrypts the next chunk of payload in place.
    pub fn update_in_place(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let op = self.op.as_mut().ok_or_else(|| fail!(Error::BadState))?;
        check!(op.aad_done == op.aad_len, Error::BadState);
        let total = op
            .payload_done
            .checked_add(buf.len())
            .ok_or_else(|| fail!(Error::BadInput))?;
        check!(total <= op.payload_len, Error::BadInput);

        match &mut op.engine {
            Engine::Ccm(e) => e.payload(&mut self.cipher, op.dir, buf)?,
            Engine::Gcm(e) => e.payload(&mut self.cipher, op.dir, buf)?,
        }
        op.payload_done = total;
        Ok(())
    }

    /// Completes an encryption, writing the tag to `tag`.
    ///
    /// `tag` must be exactly as long as the tag length passed to
    /// [`Context::start()`]. The context returns to idle on success.
    pub fn finish(&mut self, tag: &mut [u8]) -> Result<(), Error> {
        let mut full = self.compute_tag(Direction::Encrypt, tag.len())?;
        tag.copy_from_slice(&full[..tag.len()]);
        full.zeroize();
        trace!("aead: finished encryption");
        Ok(())
    }

    /// Completes a decryption, checking `tag` in constant time.
    ///
    /// `plaintext` should be everything this operation wrote out; if the tag
    /// does not match, it is erased and [`Error::AuthenticationFailed`] is
    /// returned. Either way, the context returns to idle.
    pub fn finish_verify(
        &mut self,
        tag: &[u8],
        plaintext: &mut [u8],
    ) -> Result<(), Error> {
        let mut full = match self.compute_tag(Direction::Decrypt, tag.len()) {
            Ok(full) => full,
            Err(e) => {
                plaintext.zeroize();
                return Err(e);
            }
        };
        let ok = ct_eq(&full[..tag.len()], tag);
        full.zeroize();
        if !ok {
            plaintext.zeroize();
            return Err(fail!(Error::AuthenticationFailed));
        }
        trace!("aead: tag verified");
        Ok(())
    }

    /// Discards any in-flight operation, returning the context to idle.
    pub fn reset(&mut self) {
        self.op = None;
    }

    /// Encrypts `buf` in place in one call, writing the tag to `tag`.
    pub fn seal_in_place(
        &mut self,
        nonce: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        tag: &mut [u8],
    ) -> Result<(), Error> {
        self.start(Direction::Encrypt, nonce, aad.len(), buf.len(), tag.len())?;
        let res = self
            .update_aad(aad)
            .and_then(|_| self.update_in_place(buf))
            .and_then(|_| self.finish(tag));
        if res.is_err() {
            self.reset();
        }
        res
    }

    /// Decrypts and authenticates `buf` in place in one call.
    ///
    /// On any failure, `buf` is erased: no unauthenticated plaintext is ever
    /// left behind.
    pub fn open_in_place(
        &mut self,
        nonce: &[u8],
        aad: &[u8],
        buf: &mut [u8],
        tag: &[u8],
    ) -> Result<(), Error> {
        if let Err(e) =
            self.start(Direction::Decrypt, nonce, aad.len(), buf.len(), tag.len())
        {
            buf.zeroize();
            return Err(e);
        }
        let res = self
            .update_aad(aad)
            .and_then(|_| self.update_in_place(buf));
        if let Err(e) = res {
            self.reset();
            buf.zeroize();
            return Err(e);
        }
        self.finish_verify(tag, buf)
    }

    /// Checks that the current operation is ready to finish in `dir`, then
    /// consumes it and computes its full-length tag.
    fn compute_tag(
        &mut self,
        dir: Direction,
        tag_len: usize,
    ) -> Result<[u8; MAX_TAG_LEN], Error> {
        let op = self.op.as_ref().ok_or_else(|| fail!(Error::BadState))?;
        check!(op.dir == dir, Error::BadState);
        check!(tag_len == op.tag_len, Error::BadInput);
        check!(
            op.aad_done == op.aad_len && op.payload_done == op.payload_len,
            Error::BadInput
        );

        // The operation is over no matter how the tag computation goes.
        let mut op = self.op.take().ok_or_else(|| fail!(Error::BadState))?;
        let mut tag = [0; MAX_TAG_LEN];
        match &mut op.engine {
            Engine::Ccm(e) => e.tag(&mut self.cipher, &mut tag)?,
            Engine::Gcm(e) => e.tag(&mut tag),
        }
        Ok(tag)
    }
}
