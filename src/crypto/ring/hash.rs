// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::hash`] based on `ring`.
//!
//! `ring` has no SHA-3, so those algorithms are provided by the RustCrypto
//! `sha3` crate behind the same engine.

use core::mem;

use ring::digest;
use sha3::Digest as _;

use crate::crypto::hash;

#[cfg(doc)]
use crate::crypto;

/// A `ring`-based [`hash::Engine`].
pub struct Engine {
    inner: Inner,
}

enum Inner {
    Idle,
    Sha2(digest::Context),
    Sha3_224(sha3::Sha3_224),
    Sha3_256(sha3::Sha3_256),
    Sha3_384(sha3::Sha3_384),
    Sha3_512(sha3::Sha3_512),
}

impl Engine {
    /// Creates a new `Engine`.
    pub fn new() -> Self {
        Self { inner: Inner::Idle }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies a finished digest into `out`, checking its size first.
fn emit(digest: &[u8], out: &mut [u8]) -> Result<(), hash::Error> {
    check!(out.len() == digest.len(), hash::Error::WrongSize);
    out.copy_from_slice(digest);
    Ok(())
}

impl hash::Engine for Engine {
    fn supports(&mut self, _: hash::Algo) -> bool {
        true
    }

    fn start_raw(&mut self, algo: hash::Algo) -> Result<(), hash::Error> {
        use hash::Algo::*;
        self.inner = match algo {
            Sha256 => Inner::Sha2(digest::Context::new(&digest::SHA256)),
            Sha384 => Inner::Sha2(digest::Context::new(&digest::SHA384)),
            Sha512 => Inner::Sha2(digest::Context::new(&digest::SHA512)),
            Sha3_224 => Inner::Sha3_224(sha3::Sha3_224::new()),
            Sha3_256 => Inner::Sha3_256(sha3::Sha3_256::new()),
            Sha3_384 => Inner::Sha3_384(sha3::Sha3_384::new()),
            Sha3_512 => Inner::Sha3_512(sha3::Sha3_512::new()),
        };
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), hash::Error> {
        match &mut self.inner {
            Inner::Idle => return Err(fail!(hash::Error::Idle)),
            Inner::Sha2(c) => c.update(data),
            Inner::Sha3_224(c) => c.update(data),
            Inner::Sha3_256(c) => c.update(data),
            Inner::Sha3_384(c) => c.update(data),
            Inner::Sha3_512(c) => c.update(data),
        }
        Ok(())
    }

    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), hash::Error> {
        match mem::replace(&mut self.inner, Inner::Idle) {
            Inner::Idle => Err(fail!(hash::Error::Idle)),
            Inner::Sha2(c) => emit(c.finish().as_ref(), out),
            Inner::Sha3_224(c) => emit(&c.finalize(), out),
            Inner::Sha3_256(c) => emit(&c.finalize(), out),
            Inner::Sha3_384(c) => emit(&c.finalize(), out),
            Inner::Sha3_512(c) => emit(&c.finalize(), out),
        }
    }
}
