// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::mac`] based on `ring`.
//!
//! Only the SHA-2 algorithms are supported.

use core::mem;

use ring::hkdf;
use ring::hmac;

use crate::crypto::hash;
use crate::crypto::mac;

#[cfg(doc)]
use crate::crypto;

/// A `ring`-based [`mac::Engine`] and [`mac::Hkdf`].
pub struct Engine {
    ctx: Option<hmac::Context>,
}

impl Engine {
    /// Creates a new `Engine`.
    pub fn new() -> Self {
        Self { ctx: None }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn hmac_algo(algo: hash::Algo) -> Option<hmac::Algorithm> {
    match algo {
        hash::Algo::Sha256 => Some(hmac::HMAC_SHA256),
        hash::Algo::Sha384 => Some(hmac::HMAC_SHA384),
        hash::Algo::Sha512 => Some(hmac::HMAC_SHA512),
        _ => None,
    }
}

fn hkdf_algo(algo: hash::Algo) -> Option<hkdf::Algorithm> {
    match algo {
        hash::Algo::Sha256 => Some(hkdf::HKDF_SHA256),
        hash::Algo::Sha384 => Some(hkdf::HKDF_SHA384),
        hash::Algo::Sha512 => Some(hkdf::HKDF_SHA512),
        _ => None,
    }
}

impl mac::Engine for Engine {
    fn supports(&mut self, algo: hash::Algo) -> bool {
        hmac_algo(algo).is_some()
    }

    fn start_raw(
        &mut self,
        algo: hash::Algo,
        key: &[u8],
    ) -> Result<(), mac::Error> {
        self.ctx = None;
        let algo =
            hmac_algo(algo).ok_or_else(|| fail!(mac::Error::Unsupported))?;
        self.ctx = Some(hmac::Context::with_key(&hmac::Key::new(algo, key)));
        Ok(())
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), mac::Error> {
        match &mut self.ctx {
            Some(ctx) => ctx.update(data),
            None => return Err(fail!(mac::Error::Idle)),
        }
        Ok(())
    }

    fn finish_raw(&mut self, out: &mut [u8]) -> Result<(), mac::Error> {
        let ctx = mem::take(&mut self.ctx)
            .ok_or_else(|| fail!(mac::Error::Idle))?;
        let tag = ctx.sign();
        check!(out.len() == tag.as_ref().len(), mac::Error::WrongSize);
        out.copy_from_slice(tag.as_ref());
        Ok(())
    }
}

/// An output length, as `ring::hkdf` wants it.
struct Len(usize);

impl hkdf::KeyType for Len {
    fn len(&self) -> usize {
        self.0
    }
}

impl mac::Hkdf for Engine {
    fn derive(
        &mut self,
        algo: hash::Algo,
        salt: &[u8],
        ikm: &[u8],
        info: &[&[u8]],
        out: &mut [u8],
    ) -> Result<(), mac::Error> {
        let algo =
            hkdf_algo(algo).ok_or_else(|| fail!(mac::Error::Unsupported))?;
        let prk = hkdf::Salt::new(algo, salt).extract(ikm);
        prk.expand(info, Len(out.len()))
            .and_then(|okm| okm.fill(out))
            .map_err(|_| fail!(mac::Error::WrongSize))
    }
}
