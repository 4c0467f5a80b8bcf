// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Flash device abstraction.
//!
//! This module provides the [`Flash`] trait, which represents an *abstract
//! flash device*: a region of memory that can be read or programmed at byte
//! granularity. Such a "device" can range from a simple Rust slice to a
//! remote SPI flash device (or even a subregion of it!).
//!
//! Firmware images are staged into slots carved out of a [`Flash`] by
//! [`fota::storage::FlashStorage`](crate::fota::storage::FlashStorage).

use core::convert::TryInto as _;

use static_assertions::assert_obj_safe;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A [`Flash`] error.
///
/// All of these errors are non-retryable from the point of view of the
/// device; a [`Flash`] implementation should block until the operation
/// succeeds or fails outright.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates that an operation failed because the requested
    /// operation was outside of the device's address space.
    OutOfRange,

    /// Indicates that the device is locked in some manner and cannot
    /// be affected by the operation.
    Locked,

    /// Indicates that an unspecified error occured.
    Unspecified,
}

/// Provides access to a flash-like storage device.
///
/// This trait provides abstract operations on a device, as if it were a
/// block of random-access memory. It is the implementation's responsibility
/// to implement these operations efficiently with respect to the underlying
/// device.
pub trait Flash {
    /// Returns the size, in bytes, of this device.
    fn size(&self) -> Result<u32, Error>;

    /// Attempts to read `out.len()` bytes starting at `offset`.
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error>;

    /// Attempts to write `buf.len()` bytes starting at `offset`.
    ///
    /// Note that this function is not guaranteed to succeed (and be
    /// reflected in the return value of `read`) until `flush()` is called.
    /// This is to permit a `Flash` implementation to buffer writes before
    /// sending them out.
    fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<(), Error>;

    /// Flushes any pending `program()` operations.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}
assert_obj_safe!(Flash);

/// A shared reference to a device is read-only.
impl<F: Flash + ?Sized> Flash for &F {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        F::size(self)
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        F::read(self, offset, out)
    }

    #[inline]
    fn program(&mut self, _: Ptr, _: &[u8]) -> Result<(), Error> {
        Err(Error::Locked)
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        Err(Error::Locked)
    }
}

impl<F: Flash + ?Sized> Flash for &mut F {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        F::size(self)
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        F::read(self, offset, out)
    }

    #[inline]
    fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<(), Error> {
        F::program(self, offset, buf)
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        F::flush(self)
    }
}

/// Adapter for working with a sub-region of a [`Flash`] type.
///
/// Reads and writes on the device will be constrained to a given [`Region`],
/// and offsets are relative to the start of that region. Unlike a bare
/// device, an access that straddles the end of the region is rejected even
/// if the underlying device is larger.
#[derive(Copy, Clone)]
pub struct SubFlash<F>(pub F, pub Region);

impl<F: Flash> SubFlash<F> {
    /// Creates a new `SubFlash` representing the entirety of the given device.
    pub fn full(flash: F) -> Result<Self, Error> {
        let region = Region::new(0, flash.size()?);
        Ok(Self(flash, region))
    }

    /// Translates an access of `len` bytes at `offset` into an address on
    /// the underlying device.
    fn translate(&self, offset: Ptr, len: usize) -> Result<Ptr, Error> {
        let len: u32 = len.try_into().map_err(|_| Error::OutOfRange)?;
        let end = offset
            .address
            .checked_add(len)
            .ok_or_else(|| fail!(Error::OutOfRange))?;
        if end > self.1.len {
            return Err(Error::OutOfRange);
        }
        self.1
            .ptr
            .address
            .checked_add(offset.address)
            .map(Ptr::new)
            .ok_or_else(|| fail!(Error::OutOfRange))
    }
}

impl<F> SubFlash<F> {
    /// Returns the region of the underlying device this `SubFlash` covers.
    pub fn region(&self) -> Region {
        self.1
    }
}

impl<F: Flash> Flash for SubFlash<F> {
    #[inline]
    fn size(&self) -> Result<u32, Error> {
        Ok(self.1.len)
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        let ptr = self.translate(offset, out.len())?;
        self.0.read(ptr, out)
    }

    #[inline]
    fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<(), Error> {
        let ptr = self.translate(offset, buf.len())?;
        self.0.program(ptr, buf)
    }

    #[inline]
    fn flush(&mut self) -> Result<(), Error> {
        self.0.flush()
    }
}

/// Adapter for converting mutable, RAM-backed storage into a [`Flash`].
///
/// For the purposes of this type, "RAM-backed" means that `AsRef<[u8]>`
/// and `AsMut<[u8]>` are implemented.
#[derive(Copy, Clone)]
pub struct RamMut<Bytes>(pub Bytes);

impl<Bytes: AsRef<[u8]>> RamMut<Bytes> {
    fn range(&self, offset: Ptr, len: usize) -> Result<(usize, usize), Error> {
        let start = offset.address as usize;
        let end = start
            .checked_add(len)
            .ok_or_else(|| fail!(Error::OutOfRange))?;
        if end > self.0.as_ref().len() {
            return Err(Error::OutOfRange);
        }
        Ok((start, end))
    }
}

impl<Bytes: AsRef<[u8]> + AsMut<[u8]>> Flash for RamMut<Bytes> {
    fn size(&self) -> Result<u32, Error> {
        self.0
            .as_ref()
            .len()
            .try_into()
            .map_err(|_| Error::Unspecified)
    }

    #[inline]
    fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), Error> {
        let (start, end) = self.range(offset, out.len())?;
        out.copy_from_slice(&self.0.as_ref()[start..end]);
        Ok(())
    }

    fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<(), Error> {
        let (start, end) = self.range(offset, buf.len())?;
        self.0.as_mut()[start..end].copy_from_slice(buf);
        Ok(())
    }
}

/// An abstract pointer into a [`Flash`] type.
///
/// A `Ptr` needs to be used in conjunction with a [`Flash`]
/// implementation to be read from or written to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ptr {
    /// The abstract address of this pointer.
    pub address: u32,
}

impl Ptr {
    /// Convenience method for creating a `Ptr` without having to use
    /// a struct literal.
    pub const fn new(address: u32) -> Self {
        Self { address }
    }
}

/// A region within  a [`Flash`] type.
///
/// Much like a [`Ptr`], a `Region` needs to be interpreted with
/// respect to a [`Flash`] implementation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    /// The base pointer for this slice.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub ptr: Ptr,
    /// The length of the slice, in bytes.
    pub len: u32,
}

impl Region {
    /// Convenience method for creating a `Region` without having to use
    /// a struct literal.
    pub const fn new(ptr: u32, len: u32) -> Self {
        Self {
            ptr: Ptr::new(ptr),
            len,
        }
    }

    /// Returns whether `other` lies entirely within this region.
    pub fn contains(&self, other: Region) -> bool {
        let end = |r: Region| r.ptr.address as u64 + r.len as u64;
        other.ptr.address >= self.ptr.address && end(other) <= end(*self)
    }

    /// Returns whether this region and `other` share any bytes.
    pub fn overlaps(&self, other: Region) -> bool {
        let end = |r: Region| r.ptr.address as u64 + r.len as u64;
        self.len != 0
            && other.len != 0
            && (self.ptr.address as u64) < end(other)
            && (other.ptr.address as u64) < end(*self)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ram_bounds() {
        let mut ram = RamMut([0u8; 16]);
        assert_eq!(ram.size(), Ok(16));
        ram.program(Ptr::new(12), &[1, 2, 3, 4]).unwrap();
        assert_eq!(ram.program(Ptr::new(13), &[0; 4]), Err(Error::OutOfRange));

        let mut out = [0; 4];
        ram.read(Ptr::new(12), &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(ram.read(Ptr::new(16), &mut [0]), Err(Error::OutOfRange));
        assert_eq!(ram.read(Ptr::new(16), &mut []), Ok(()));
    }

    #[test]
    fn sub_flash() {
        let mut ram = RamMut(vec![0u8; 32]);
        {
            let mut sub = SubFlash(&mut ram, Region::new(8, 8));
            assert_eq!(sub.size(), Ok(8));
            sub.program(Ptr::new(0), &[0xaa; 8]).unwrap();
            assert_eq!(
                sub.program(Ptr::new(4), &[0xbb; 5]),
                Err(Error::OutOfRange)
            );
            assert_eq!(
                sub.program(Ptr::new(u32::MAX), &[0xbb]),
                Err(Error::OutOfRange)
            );
        }
        assert_eq!(&ram.0[..8], &[0; 8]);
        assert_eq!(&ram.0[8..16], &[0xaa; 8]);
        assert_eq!(&ram.0[16..], &[0; 16]);

        let sub = SubFlash::full(&mut ram).unwrap();
        assert_eq!(sub.region(), Region::new(0, 32));
    }

    #[test]
    fn regions() {
        let r = Region::new(16, 16);
        assert!(r.contains(Region::new(16, 16)));
        assert!(r.contains(Region::new(20, 4)));
        assert!(!r.contains(Region::new(20, 16)));
        assert!(!r.contains(Region::new(0, 17)));

        assert!(r.overlaps(Region::new(31, 4)));
        assert!(!r.overlaps(Region::new(32, 4)));
        assert!(!r.overlaps(Region::new(0, 16)));
        assert!(!r.overlaps(Region::new(20, 0)));
        assert!(!Region::new(u32::MAX, 1).overlaps(Region::new(0, 16)));
    }
}
