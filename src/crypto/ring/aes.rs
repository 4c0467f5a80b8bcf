// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Software AES for [`crypto::block`].
//!
//! `ring` does not expose a raw block operation, so this uses the RustCrypto
//! `aes` crate, which erases its key schedule on drop.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::BlockEncrypt as _;
use aes::cipher::KeyInit as _;

use crate::crypto::block;

#[cfg(doc)]
use crate::crypto;

/// A software [`block::Builder`].
#[derive(Default)]
pub struct Builder {
    _priv: (),
}

impl Builder {
    /// Creates a new `Builder`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl block::Builder for Builder {
    type Cipher = Cipher;

    fn new_cipher(
        &self,
        algo: block::Algo,
        key: &[u8],
    ) -> Result<Cipher, block::Error> {
        check!(key.len() == algo.key_len(), block::Error::BadKeyLength);
        let bad_len = |_| fail!(block::Error::BadKeyLength);
        let inner = match algo {
            block::Algo::Aes128 => {
                Inner::Aes128(aes::Aes128Enc::new_from_slice(key).map_err(bad_len)?)
            }
            block::Algo::Aes192 => {
                Inner::Aes192(aes::Aes192Enc::new_from_slice(key).map_err(bad_len)?)
            }
            block::Algo::Aes256 => {
                Inner::Aes256(aes::Aes256Enc::new_from_slice(key).map_err(bad_len)?)
            }
        };
        Ok(Cipher { inner })
    }
}

/// A software [`block::Cipher`].
pub struct Cipher {
    inner: Inner,
}

enum Inner {
    Aes128(aes::Aes128Enc),
    Aes192(aes::Aes192Enc),
    Aes256(aes::Aes256Enc),
}

impl block::Cipher for Cipher {
    fn encrypt_block(
        &mut self,
        block: &mut block::Block,
    ) -> Result<(), block::Error> {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match &self.inner {
            Inner::Aes128(c) => c.encrypt_block(block),
            Inner::Aes192(c) => c.encrypt_block(block),
            Inner::Aes256(c) => c.encrypt_block(block),
        }
        Ok(())
    }
}
