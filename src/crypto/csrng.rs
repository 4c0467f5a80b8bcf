// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Cryptographic random numbers.

/// An error returned by a CSRNG.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Error {
    /// Indicates an unspecified, internal error.
    Unspecified,
}

/// A cryptographically-secure random number generator.
///
/// Used wherever this crate has to invent secrets, such as the seed and
/// identifier of a fresh LMS private key.
///
/// `Csrng`s must already be seeded with sufficient entropy.
pub trait Csrng {
    /// Fills `buf` with random bytes.
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), Error>;
}
impl dyn Csrng {} // Ensure object-safe.

impl<R: Csrng + ?Sized> Csrng for &mut R {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        R::fill(*self, buf)
    }
}
