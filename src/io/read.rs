// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Provides the [`Read`] trait, analogous to [`std::io::Read`].

use static_assertions::assert_obj_safe;

use crate::io;
use crate::io::endian::BeInt;

/// Represents a place that bytes can be read from, such as a `&[u8]`.
///
/// Reads never return short: a buffer that runs out reports
/// [`io::Error::BufferExhausted`] and leaves the caller to treat the input
/// as malformed.
pub trait Read {
    /// Reads exactly `out.len()` bytes from `self`.
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error>;

    /// Reads a big-endian integer.
    ///
    /// # Note
    /// Do not implement this function yourself. Callers are not required to
    /// call it in order to actually perform a read, so whether or not it is
    /// called is an implementation detail.
    #[inline]
    fn read_be<I: BeInt>(&mut self) -> Result<I, io::Error>
    where
        Self: Sized,
    {
        I::read_from(self)
    }
}
assert_obj_safe!(Read);

impl<R: Read + ?Sized> Read for &'_ mut R {
    #[inline]
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        R::read_bytes(*self, out)
    }
}

impl Read for &[u8] {
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        let n = out.len();
        if self.len() < n {
            return Err(io::Error::BufferExhausted);
        }

        out.copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(())
    }
}

/// Splits `n` bytes off the front of `buf` without copying them.
///
/// This is the borrowing counterpart of [`Read::read_bytes()`], for parsers
/// that hand out views into their input.
pub fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8], io::Error> {
    if buf.len() < n {
        return Err(io::Error::BufferExhausted);
    }
    let (head, tail) = buf.split_at(n);
    *buf = tail;
    Ok(head)
}
