// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Cryptographic hashing.
//!
//! In general, users of this module should be pulling in [`EngineExt`],
//! adds functions to [`Engine`] for more ergonomic usage, but which would
//! otherwise make it object-unsafe.

#[cfg(feature = "arbitrary-derive")]
use libfuzzer_sys::arbitrary::{self, Arbitrary};

/// A cryptographic hashing algorithm.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
pub enum Algo {
    /// 256-bit SHA-2.
    Sha256,
    /// 384-bit SHA-2.
    Sha384,
    /// 512-bit SHA-2.
    Sha512,
    /// 224-bit SHA-3.
    Sha3_224,
    /// 256-bit SHA-3.
    Sha3_256,
    /// 384-bit SHA-3.
    Sha3_384,
    /// 512-bit SHA-3.
    Sha3_512,
}

impl Algo {
    /// The number of bits in a digest of this strength.
    #[inline]
    pub const fn bits(self) -> usize {
        match self {
            Self::Sha3_224 => 224,
            Self::Sha256 | Self::Sha3_256 => 256,
            Self::Sha384 | Self::Sha3_384 => 384,
            Self::Sha512 | Self::Sha3_512 => 512,
        }
    }

    /// The number of bytes in a digest of this strength.
    #[inline]
    pub const fn bytes(self) -> usize {
        self.bits() / 8
    }
}

/// The largest digest produced by any [`Algo`].
pub const MAX_DIGEST_LEN: usize = 64;

/// An error returned by a hashing function.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates that the wrong size of digest was provided to
    /// [`Engine::finish_raw()`].
    WrongSize,

    /// Indicates that the engine was idle, but a write or finish
    /// operation was requested.
    Idle,

    /// Indicates that the requested algorithm is not supported by the engine.
    Unsupported,

    /// Indicates an unspecified, internal error.
    Unspecified,
}

/// A hashing engine, which maintains the state for one digest.
///
/// Callers should not use the `raw` API directly; [`Hasher`] is a type-safe
/// wrapper that manages a session with an `Engine`.
///
/// Implementers only need to provide the "raw" form of the API; the remaining
/// functions are convenience helpers.
pub trait Engine {
    /// Returns whether this engine supports the given algorithm.
    fn supports(&mut self, algo: Algo) -> bool;

    /// Begins a new hashing operation, discarding any previous state.
    fn start_raw(&mut self, algo: Algo) -> Result<(), Error>;

    /// Adds `data` to the hashing state.
    fn write_raw(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Completes the hashing operation.
    ///
    /// `out` must be exactly as long as the digest of the algorithm the
    /// operation was started with. Calling this function multiple times
    /// will have an unspecified effect.
    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), Error>;
}

/// Helpers for creating a [`Hasher`] from an [`Engine`].
#[extend::ext(name = EngineExt)]
pub impl<E: Engine + ?Sized> E {
    /// Begins a new hashing operation.
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn new_hash(&mut self, algo: Algo) -> Result<Hasher<&mut Self>, Error> {
        self.start_raw(algo)?;
        Ok(Hasher { engine: self })
    }

    /// Convenience helper for hashing a contiguous memory region.
    ///
    /// Implementers do not need to implement this function themselves.
    #[inline]
    fn contiguous_hash(
        &mut self,
        algo: Algo,
        buf: &[u8],
        out: &mut [u8],
    ) -> Result<(), Error> {
        let mut h = self.new_hash(algo)?;
        h.write(buf)?;
        h.finish(out)
    }
}

// Ensure Engine is object-safe.
impl dyn Engine {}

/// A helper for managing a hashing operation with an [`Engine`].
///
/// Users should prefer to use this instead of calling [`Engine`]'s raw API
/// directly.
pub struct Hasher<E> {
    engine: E,
}

impl<E: Engine + ?Sized> Hasher<&mut E> {
    /// Adds `data` to the hashing state.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.engine.write_raw(data)
    }

    /// Adds each of `chunks`, in order, to the hashing state.
    pub fn write_all(&mut self, chunks: &[&[u8]]) -> Result<(), Error> {
        chunks.iter().try_for_each(|c| self.engine.write_raw(c))
    }

    /// Completes the hashing operation, writing the result to `out`.
    pub fn finish(self, out: &mut [u8]) -> Result<(), Error> {
        self.engine.finish_raw(out)
    }
}
