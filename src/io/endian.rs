// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Big-endian integer encoding.
//!
//! RFC 8554 keys and signatures are built entirely out of 32-bit type codes,
//! counts and leaf indices in network byte order, so that is the only width
//! provided.

use byteorder::ByteOrder as _;
use byteorder::BE;

use crate::io;
use crate::io::Read;
use crate::io::Write;

/// An integer with a fixed big-endian wire encoding.
pub trait BeInt: Sized + Copy {
    /// Reads a value of type `Self`.
    fn read_from<R: Read>(r: R) -> Result<Self, io::Error>;

    /// Writes a value of type `Self`.
    fn write_to<W: Write>(self, w: W) -> Result<(), io::Error>;
}

impl BeInt for u32 {
    #[inline]
    fn read_from<R: Read>(mut r: R) -> Result<Self, io::Error> {
        let mut bytes = [0; 4];
        r.read_bytes(&mut bytes)?;
        Ok(BE::read_u32(&bytes))
    }

    #[inline]
    fn write_to<W: Write>(self, mut w: W) -> Result<(), io::Error> {
        let mut bytes = [0; 4];
        BE::write_u32(&mut bytes, self);
        w.write_bytes(&bytes)
    }
}
