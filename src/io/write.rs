// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Provides the [`Write`] trait, analogous to [`std::io::Write`].

use static_assertions::assert_obj_safe;

use crate::io;
use crate::io::endian::BeInt;

/// Represents a place that bytes can be written to.
///
/// # Relation with [`std::io::Write`]
/// [`std::io::Write`] provides approximately a superset of `Write`, with
/// more detailed errors. [`StdWrite`] provides an implementation of
/// `Write` in terms of [`std::io::Write`].
pub trait Write {
    /// Attempt to write `buf` exactly to `self`.
    ///
    /// This function does not perform partial writes: it will either block
    /// until completion or return an error.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error>;

    /// Writes a big-endian integer.
    ///
    /// # Note
    /// Do not implement this function yourself. Callers are not required to
    /// call it in order to actually perform a write, so whether or not it is
    /// called is an implementation detail.
    #[inline]
    fn write_be<I: BeInt>(&mut self, val: I) -> Result<(), io::Error>
    where
        Self: Sized,
    {
        val.write_to(self)
    }
}

assert_obj_safe!(Write);

impl<W: Write + ?Sized> Write for &'_ mut W {
    #[inline]
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        W::write_bytes(*self, buf)
    }
}

/// Adapts a [`std::io::Write`], usually a `Vec<u8>`, into a [`Write`].
///
/// Used to serialize keys and signatures into owned buffers.
#[cfg(feature = "std")]
pub struct StdWrite<W>(pub W);

#[cfg(feature = "std")]
impl<W: std::io::Write> Write for StdWrite<W> {
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), io::Error> {
        self.0.write_all(buf).map_err(|_| io::Error::Internal)
    }
}
