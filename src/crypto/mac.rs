// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Message authentication codes and key derivation.
//!
//! [`Engine`] computes HMAC over any SHA-2 [`hash::Algo`] in the same raw,
//! session-based style as [`hash::Engine`]; [`EngineExt`] layers a typed
//! [`Mac`] session and constant-time tag verification on top of it.
//!
//! [`Hkdf`] is RFC 5869 extract-and-expand. [`hkdf()`] implements it on top
//! of any HMAC [`Engine`], for integrations that only have an HMAC core.

use zeroize::Zeroize as _;

use crate::crypto::ct_eq;
use crate::crypto::hash;

/// An error returned by a MAC or KDF operation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates that the wrong size of tag was provided to
    /// [`Engine::finish_raw()`], or that too much output was requested from
    /// a KDF.
    WrongSize,

    /// Indicates that the engine was idle, but a write or finish
    /// operation was requested.
    Idle,

    /// Indicates that the requested algorithm is not supported by the engine.
    Unsupported,

    /// Indicates that a tag did not match.
    BadTag,

    /// Indicates an unspecified, internal error.
    Unspecified,
}

impl From<hash::Error> for Error {
    fn from(e: hash::Error) -> Self {
        match e {
            hash::Error::WrongSize => Self::WrongSize,
            hash::Error::Idle => Self::Idle,
            hash::Error::Unsupported => Self::Unsupported,
            hash::Error::Unspecified => Self::Unspecified,
        }
    }
}

/// An HMAC engine, which maintains the state for one tag computation.
///
/// As with [`hash::Engine`], callers should go through [`EngineExt`]
/// rather than using the raw API directly.
pub trait Engine {
    /// Returns whether this engine supports HMAC over the given algorithm.
    fn supports(&mut self, algo: hash::Algo) -> bool;

    /// Begins a new HMAC operation keyed with `key`, discarding any previous
    /// state.
    fn start_raw(&mut self, algo: hash::Algo, key: &[u8]) -> Result<(), Error>;

    /// Adds `data` to the MAC state.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Completes the operation.
    ///
    /// `out` must be exactly as long as the digest of the algorithm the
    /// operation was started with.
    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), Error>;
}

// Ensure Engine is object-safe.
impl dyn Engine {}

/// Helpers for creating a [`Mac`] from an [`Engine`].
#[extend::ext(name = EngineExt)]
pub impl<E: Engine + ?Sized> E {
    /// Begins a new HMAC operation.
    #[inline]
    fn new_mac(
        &mut self,
        algo: hash::Algo,
        key: &[u8],
    ) -> Result<Mac<&mut Self>, Error> {
        self.start_raw(algo, key)?;
        Ok(Mac { engine: self, algo })
    }

    /// Computes the tag of the concatenation of `message` into `out`.
    #[inline]
    fn contiguous_mac(
        &mut self,
        algo: hash::Algo,
        key: &[u8],
        message: &[&[u8]],
        out: &mut [u8],
    ) -> Result<(), Error> {
        let mut m = self.new_mac(algo, key)?;
        m.write_all(message)?;
        m.finish(out)
    }

    /// Checks `tag` against the tag of the concatenation of `message`.
    ///
    /// `tag` may be a truncation of the full tag, but no shorter than half
    /// of it.
    #[inline]
    fn verify_mac(
        &mut self,
        algo: hash::Algo,
        key: &[u8],
        message: &[&[u8]],
        tag: &[u8],
    ) -> Result<(), Error> {
        let mut m = self.new_mac(algo, key)?;
        m.write_all(message)?;
        m.verify(tag)
    }
}

/// A helper for managing an HMAC operation with an [`Engine`].
pub struct Mac<E> {
    engine: E,
    algo: hash::Algo,
}

impl<E: Engine + ?Sized> Mac<&mut E> {
    /// Adds `data` to the MAC state.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.write_raw(data)
    }

    /// Adds each of `chunks`, in order, to the MAC state.
    pub fn write_all(&mut self, chunks: &[&[u8]]) -> Result<(), Error> {
        chunks.iter().try_for_each(|c| self.engine.write_raw(c))
    }

    /// Completes the operation, writing the tag to `out`.
    pub fn finish(self, out: &mut [u8]) -> Result<(), Error> {
        self.engine.finish_raw(out)
    }

    /// Completes the operation, comparing the tag against `expected` in
    /// constant time.
    pub fn verify(self, expected: &[u8]) -> Result<(), Error> {
        let len = self.algo.bytes();
        let mut tag = [0; hash::MAX_DIGEST_LEN];
        self.engine.finish_raw(&mut tag[..len])?;
        check!(
            expected.len() <= len && expected.len() >= len / 2,
            Error::WrongSize
        );
        check!(ct_eq(&tag[..expected.len()], expected), Error::BadTag);
        Ok(())
    }
}

/// An RFC 5869 key derivation function.
pub trait Hkdf {
    /// Derives `out.len()` bytes of keying material from `ikm`.
    ///
    /// `info` is concatenated to form the context string. At most
    /// `255 * algo.bytes()` bytes may be derived.
    fn derive(
        &mut self,
        algo: hash::Algo,
        salt: &[u8],
        ikm: &[u8],
        info: &[&[u8]],
        out: &mut [u8],
    ) -> Result<(), Error>;
}

// Ensure Hkdf is object-safe.
impl dyn Hkdf {}

/// Runs HKDF extract-and-expand using `engine` for every HMAC invocation.
pub fn hkdf<E: Engine + ?Sized>(
    engine: &mut E,
    algo: hash::Algo,
    salt: &[u8],
    ikm: &[u8],
    info: &[&[u8]],
    out: &mut [u8],
) -> Result<(), Error> {
    let len = algo.bytes();
    check!(out.len() <= 255 * len, Error::WrongSize);

    let zeros = [0; hash::MAX_DIGEST_LEN];
    let salt = if salt.is_empty() { &zeros[..len] } else { salt };
    let mut prk = [0; hash::MAX_DIGEST_LEN];
    engine.contiguous_mac(algo, salt, &[ikm], &mut prk[..len])?;

    let mut t = [0; hash::MAX_DIGEST_LEN];
    let mut t_len = 0;
    for (i, chunk) in out.chunks_mut(len).enumerate() {
        let mut m = engine.new_mac(algo, &prk[..len])?;
        m.write(&t[..t_len])?;
        m.write_all(info)?;
        m.write(&[i as u8 + 1])?;
        m.finish(&mut t[..len])?;
        t_len = len;
        chunk.copy_from_slice(&t[..chunk.len()]);
    }

    prk.zeroize();
    t.zeroize();
    Ok(())
}
