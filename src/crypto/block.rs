// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Raw AES block encryption.
//!
//! Both CCM and GCM only ever run the forward direction of the block cipher,
//! so this is the only operation an integration needs to supply in order to
//! use [`aead`]. This makes it easy to plug in a hardware AES core.
//!
//! [`aead`]: super::aead

use zeroize::Zeroize;

#[cfg(feature = "arbitrary-derive")]
use libfuzzer_sys::arbitrary::{self, Arbitrary};

/// The size of an AES block, in bytes.
pub const BLOCK_LEN: usize = 16;

/// A single AES block.
pub type Block = [u8; BLOCK_LEN];

/// An AES key size.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "arbitrary-derive", derive(Arbitrary))]
pub enum Algo {
    /// AES with a 128-bit key.
    Aes128,
    /// AES with a 192-bit key.
    Aes192,
    /// AES with a 256-bit key.
    Aes256,
}

impl Algo {
    /// The length of a key for this algorithm, in bytes.
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    /// Picks the algorithm whose key length is `len` bytes.
    pub fn from_key_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Self::Aes128),
            24 => Some(Self::Aes192),
            32 => Some(Self::Aes256),
            _ => None,
        }
    }
}

/// An error returned by a block cipher.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// The key did not have the length required by the algorithm.
    BadKeyLength,
    /// The requested algorithm is not supported.
    Unsupported,
    /// Indicates an unspecified, internal error.
    Unspecified,
}

/// A block cipher, already primed with a key.
///
/// There is no way to extract the key back out of a `Cipher`;
/// implementations should erase their key schedule when dropped.
pub trait Cipher {
    /// Encrypts `block` in place.
    fn encrypt_block(&mut self, block: &mut Block) -> Result<(), Error>;
}

impl<C: Cipher + ?Sized> Cipher for &mut C {
    fn encrypt_block(&mut self, block: &mut Block) -> Result<(), Error> {
        C::encrypt_block(*self, block)
    }
}

// Ensure Cipher is object-safe.
impl dyn Cipher {}

/// A builder for [`Cipher`]s.
///
/// This is the entry point for loading key material.
pub trait Builder {
    /// The cipher type produced by this builder.
    type Cipher: Cipher;

    /// Loads `key` into a fresh cipher for `algo`.
    ///
    /// Returns [`Error::BadKeyLength`] if `key` is not exactly
    /// `algo.key_len()` bytes long.
    fn new_cipher(&self, algo: Algo, key: &[u8]) -> Result<Self::Cipher, Error>;
}

/// Encrypts a copy of `block`, leaving the input untouched.
pub(crate) fn encrypt_copy(
    cipher: &mut impl Cipher,
    block: &Block,
) -> Result<Block, Error> {
    let mut out = *block;
    if let Err(e) = cipher.encrypt_block(&mut out) {
        out.zeroize();
        return Err(e);
    }
    Ok(out)
}
