// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Image storage.
//!
//! A [`Storage`] receives a verified payload in three steps: [`open`], any
//! number of [`write`]s, and a final [`commit`]. Until the commit succeeds,
//! the previously installed image (if any) must remain the one reported as
//! installed. An [`abort`] discards a partially written image.
//!
//! [`FlashStorage`] implements this interface on top of a [`Flash`] device
//! partitioned into one slot per component. Each slot holds two banks: the
//! new image is staged in whichever bank the installed image is not using,
//! and writing its record is what makes it the installed one.
//!
//! [`open`]: Storage::open
//! [`write`]: Storage::write
//! [`commit`]: Storage::commit
//! [`abort`]: Storage::abort

use core::mem;
use core::time::Duration;

use static_assertions::const_assert_eq;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::LayoutVerified;
use zerocopy::Unaligned;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::fota::image::Header;
use crate::hardware::flash;
use crate::hardware::flash::Flash;
use crate::hardware::flash::Ptr;
use crate::hardware::flash::Region;
use crate::hardware::flash::SubFlash;

/// A storage error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The operation did not complete within its timeout.
    Timeout,
    /// There is no room for an image of the requested size.
    OutOfSpace,
    /// The component has nowhere to store images.
    NoSlot,
    /// The handle does not refer to an open image.
    BadHandle,
    /// A write fell outside of the image being stored.
    OutOfRange,
    /// Another image is already being stored.
    Busy,
    /// The storage layout is inconsistent.
    BadLayout,
    /// The underlying device failed.
    Flash(flash::Error),
}

impl From<flash::Error> for Error {
    fn from(e: flash::Error) -> Self {
        Self::Flash(e)
    }
}

/// An open image, as returned by [`Storage::open()`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

/// Durable storage for firmware images.
///
/// All operations block; `timeout` bounds how long an implementation may
/// wait before giving up with [`Error::Timeout`].
pub trait Storage {
    /// Prepares to receive the payload of the image described by `header`.
    fn open(
        &mut self,
        header: &Header,
        timeout: Duration,
    ) -> Result<Handle, Error>;

    /// Writes `bytes` at `offset` within the payload.
    fn write(
        &mut self,
        handle: Handle,
        offset: u32,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<(), Error>;

    /// Makes the written payload the installed image for its component.
    ///
    /// `handle` is closed whether or not this succeeds.
    fn commit(&mut self, handle: Handle, timeout: Duration)
        -> Result<(), Error>;

    /// Discards the image being written and closes `handle`.
    fn abort(&mut self, handle: Handle) -> Result<(), Error>;
}
impl dyn Storage {} // Ensure object-safe.

impl<S: Storage + ?Sized> Storage for &mut S {
    fn open(
        &mut self,
        header: &Header,
        timeout: Duration,
    ) -> Result<Handle, Error> {
        S::open(self, header, timeout)
    }

    fn write(
        &mut self,
        handle: Handle,
        offset: u32,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<(), Error> {
        S::write(self, handle, offset, bytes, timeout)
    }

    fn commit(
        &mut self,
        handle: Handle,
        timeout: Duration,
    ) -> Result<(), Error> {
        S::commit(self, handle, timeout)
    }

    fn abort(&mut self, handle: Handle) -> Result<(), Error> {
        S::abort(self, handle)
    }
}

/// A region of flash reserved for one component's images.
///
/// The region is split into two equal banks, each a record followed by a
/// payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Slot {
    /// The component stored in this slot.
    pub component_id: u32,
    /// The region of the device this slot occupies.
    pub region: Region,
}

impl Slot {
    /// Returns the region occupied by bank `bank`, which is 0 or 1.
    fn bank(&self, bank: usize) -> Region {
        let len = self.region.len / 2;
        Region::new(self.region.ptr.address + bank as u32 * len, len)
    }

    /// Returns the largest payload a bank of this slot can hold.
    pub fn capacity(&self) -> u32 {
        (self.region.len / 2).saturating_sub(RECORD_LEN as u32)
    }
}

/// The record at the start of every bank, describing the payload that
/// follows it. A record without the magic number marks an empty bank.
///
/// Of two valid records in a slot, the one with the larger generation is
/// the installed image.
#[derive(Clone, Copy, Debug, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
struct Record {
    magic: [u8; 4],
    component_id: [u8; 4],
    generation: [u8; 4],
    version: [u8; 4],
    len: [u8; 4],
}

/// The length of the record preceding each stored payload.
pub const RECORD_LEN: usize = 20;
const_assert_eq!(mem::size_of::<Record>(), RECORD_LEN);

const RECORD_MAGIC: [u8; 4] = *b"TACM";

/// An image that has been committed to a slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Installed {
    /// The version of the image.
    pub version: u32,
    /// The length of the payload.
    pub len: u32,
}

/// A valid record, located.
#[derive(Copy, Clone, Debug)]
struct Active {
    bank: usize,
    generation: u32,
    image: Installed,
}

#[derive(Copy, Clone, Debug)]
struct Open {
    handle: Handle,
    slot: Slot,
    bank: usize,
    generation: u32,
    version: u32,
    len: u32,
}

/// A [`Storage`] backed by slots within a [`Flash`] device.
///
/// Flash operations block until complete, so timeouts are not enforced.
pub struct FlashStorage<'s, F> {
    flash: F,
    slots: &'s [Slot],
    open: Option<Open>,
    next_handle: u32,
}

impl<'s, F: Flash> FlashStorage<'s, F> {
    /// Creates a new `FlashStorage` over `flash`.
    ///
    /// Each slot must lie within the device, have room for a record in both
    /// of its banks, and not overlap any other; each component may have at
    /// most one slot.
    pub fn new(flash: F, slots: &'s [Slot]) -> Result<Self, Error> {
        let device = Region::new(0, flash.size()?);
        for (i, slot) in slots.iter().enumerate() {
            check!(device.contains(slot.region), Error::BadLayout);
            check!(
                slot.region.len as usize >= 2 * RECORD_LEN,
                Error::BadLayout
            );
            for other in &slots[..i] {
                check!(!other.region.overlaps(slot.region), Error::BadLayout);
                check!(
                    other.component_id != slot.component_id,
                    Error::BadLayout
                );
            }
        }

        Ok(Self {
            flash,
            slots,
            open: None,
            next_handle: 0,
        })
    }

    /// Returns the image currently installed for `component_id`, if any.
    pub fn installed(
        &self,
        component_id: u32,
    ) -> Result<Option<Installed>, Error> {
        let slot = self.slot(component_id)?;
        Ok(self.active(slot)?.map(|a| a.image))
    }

    /// Reads the installed payload for `component_id` into `out`, returning
    /// the portion of `out` that was filled.
    pub fn read_installed<'a>(
        &self,
        component_id: u32,
        out: &'a mut [u8],
    ) -> Result<&'a [u8], Error> {
        let slot = self.slot(component_id)?;
        let active = self.active(slot)?.ok_or_else(|| fail!(Error::NoSlot))?;
        let out = out
            .get_mut(..active.image.len as usize)
            .ok_or_else(|| fail!(Error::OutOfSpace))?;

        SubFlash(&self.flash, slot.bank(active.bank))
            .read(Ptr::new(RECORD_LEN as u32), out)?;
        Ok(&*out)
    }

    /// Consumes this `FlashStorage`, returning the underlying device.
    pub fn into_inner(self) -> F {
        self.flash
    }

    fn slot(&self, component_id: u32) -> Result<Slot, Error> {
        self.slots
            .iter()
            .find(|s| s.component_id == component_id)
            .copied()
            .ok_or_else(|| {
                fail!(Error::NoSlot, "storage: no slot for {}", component_id)
            })
    }

    fn check_handle(&self, handle: Handle) -> Result<Open, Error> {
        match self.open {
            Some(open) if open.handle == handle => Ok(open),
            _ => Err(fail!(Error::BadHandle)),
        }
    }

    /// Reads the record of `bank`, if it describes a payload that fits.
    fn record(&self, slot: Slot, bank: usize) -> Result<Option<Active>, Error> {
        let mut bytes = [0; RECORD_LEN];
        SubFlash(&self.flash, slot.bank(bank)).read(Ptr::new(0), &mut bytes)?;

        let record = LayoutVerified::<_, Record>::new_unaligned(&bytes[..])
            .ok_or_else(|| fail!(Error::BadLayout))?
            .into_ref();
        let len = u32::from_be_bytes(record.len);
        if record.magic != RECORD_MAGIC
            || u32::from_be_bytes(record.component_id) != slot.component_id
            || len > slot.capacity()
        {
            return Ok(None);
        }
        Ok(Some(Active {
            bank,
            generation: u32::from_be_bytes(record.generation),
            image: Installed {
                version: u32::from_be_bytes(record.version),
                len,
            },
        }))
    }

    /// Finds the bank holding the installed image of `slot`.
    fn active(&self, slot: Slot) -> Result<Option<Active>, Error> {
        let a = self.record(slot, 0)?;
        let b = self.record(slot, 1)?;
        Ok(match (a, b) {
            (Some(a), Some(b)) if b.generation > a.generation => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        })
    }

    fn write_record(
        &mut self,
        slot: Slot,
        bank: usize,
        record: &Record,
    ) -> Result<(), Error> {
        let mut flash = SubFlash(&mut self.flash, slot.bank(bank));
        flash.program(Ptr::new(0), record.as_bytes())?;
        flash.flush()?;
        Ok(())
    }
}

impl<F: Flash> Storage for FlashStorage<'_, F> {
    fn open(
        &mut self,
        header: &Header,
        _: Duration,
    ) -> Result<Handle, Error> {
        check!(self.open.is_none(), Error::Busy);
        let slot = self.slot(header.component_id)?;
        check!(header.payload_len <= slot.capacity(), Error::OutOfSpace);

        let (bank, generation) = match self.active(slot)? {
            Some(active) => (active.bank ^ 1, active.generation.wrapping_add(1)),
            None => (0, 1),
        };
        check!(generation != 0, Error::OutOfSpace);

        // Whatever the staging bank held is older than the installed image,
        // and must not be mistaken for the new one.
        let blank = Record {
            magic: [0; 4],
            component_id: [0; 4],
            generation: [0; 4],
            version: [0; 4],
            len: [0; 4],
        };
        self.write_record(slot, bank, &blank)?;

        let handle = Handle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.open = Some(Open {
            handle,
            slot,
            bank,
            generation,
            version: header.image_version,
            len: header.payload_len,
        });
        trace!(
            "storage: opened {:?} for component {} in bank {}",
            handle,
            header.component_id,
            bank
        );
        Ok(handle)
    }

    fn write(
        &mut self,
        handle: Handle,
        offset: u32,
        bytes: &[u8],
        _: Duration,
    ) -> Result<(), Error> {
        let open = self.check_handle(handle)?;
        check!(
            offset as u64 + bytes.len() as u64 <= open.len as u64,
            Error::OutOfRange
        );
        SubFlash(&mut self.flash, open.slot.bank(open.bank))
            .program(Ptr::new(RECORD_LEN as u32 + offset), bytes)?;
        Ok(())
    }

    fn commit(&mut self, handle: Handle, _: Duration) -> Result<(), Error> {
        let open = self.check_handle(handle)?;
        self.open = None;

        self.flash.flush()?;
        let record = Record {
            magic: RECORD_MAGIC,
            component_id: open.slot.component_id.to_be_bytes(),
            generation: open.generation.to_be_bytes(),
            version: open.version.to_be_bytes(),
            len: open.len.to_be_bytes(),
        };
        self.write_record(open.slot, open.bank, &record)?;
        trace!("storage: committed {:?} to bank {}", handle, open.bank);
        Ok(())
    }

    fn abort(&mut self, handle: Handle) -> Result<(), Error> {
        self.check_handle(handle)?;
        self.open = None;
        trace!("storage: aborted {:?}", handle);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hardware::flash::RamMut;

    const T: Duration = Duration::from_millis(10);

    /// Component 1 gets banks of 64 bytes, component 2 banks of 32.
    const SLOTS: &[Slot] = &[
        Slot {
            component_id: 1,
            region: Region::new(0, 128),
        },
        Slot {
            component_id: 2,
            region: Region::new(128, 64),
        },
    ];

    fn header(component_id: u32, version: u32, len: u32) -> Header {
        Header {
            component_id,
            image_version: version,
            payload_len: len,
            chain_len: 0,
            signature_len: 0,
        }
    }

    fn install<F: Flash>(
        storage: &mut FlashStorage<F>,
        component_id: u32,
        version: u32,
        payload: &[u8],
    ) {
        let h = storage
            .open(&header(component_id, version, payload.len() as u32), T)
            .unwrap();
        storage.write(h, 0, payload, T).unwrap();
        storage.commit(h, T).unwrap();
    }

    /// A device whose programming starts failing on request.
    struct Faulty<'a> {
        ram: RamMut<Vec<u8>>,
        broken: &'a Cell<bool>,
    }

    impl Flash for Faulty<'_> {
        fn size(&self) -> Result<u32, flash::Error> {
            self.ram.size()
        }

        fn read(&self, offset: Ptr, out: &mut [u8]) -> Result<(), flash::Error> {
            self.ram.read(offset, out)
        }

        fn program(&mut self, offset: Ptr, buf: &[u8]) -> Result<(), flash::Error> {
            if self.broken.get() {
                return Err(flash::Error::Unspecified);
            }
            self.ram.program(offset, buf)
        }
    }

    #[test]
    fn install_and_read_back() {
        let mut storage =
            FlashStorage::new(RamMut(vec![0xff; 192]), SLOTS).unwrap();
        assert_eq!(storage.installed(1), Ok(None));

        let h = storage.open(&header(1, 5, 10), T).unwrap();
        storage.write(h, 0, b"hello", T).unwrap();
        storage.write(h, 5, b"world", T).unwrap();
        assert_eq!(storage.installed(1), Ok(None));
        storage.commit(h, T).unwrap();

        assert_eq!(
            storage.installed(1),
            Ok(Some(Installed {
                version: 5,
                len: 10
            }))
        );
        let mut buf = [0; 64];
        assert_eq!(storage.read_installed(1, &mut buf), Ok(&b"helloworld"[..]));
        assert_eq!(storage.installed(2), Ok(None));

        // The first image lands in the first bank, right after its record.
        let ram = storage.into_inner();
        assert_eq!(&ram.0[..4], b"TACM");
        assert_eq!(&ram.0[RECORD_LEN..RECORD_LEN + 10], b"helloworld");
    }

    #[test]
    fn updates_alternate_banks() {
        let mut storage =
            FlashStorage::new(RamMut(vec![0; 192]), SLOTS).unwrap();
        let mut buf = [0; 64];
        let updates: [(u32, &[u8]); 3] =
            [(1, b"first"), (2, b"second"), (3, b"third")];
        for (version, payload) in updates.iter() {
            install(&mut storage, 2, *version, payload);
            assert_eq!(
                storage.installed(2).unwrap().map(|i| i.version),
                Some(*version)
            );
            assert_eq!(storage.read_installed(2, &mut buf), Ok(*payload));
        }

        // Both banks hold a valid image; the newer one wins.
        let ram = storage.into_inner();
        assert_eq!(&ram.0[128..132], b"TACM");
        assert_eq!(&ram.0[160..164], b"TACM");
        assert_eq!(&ram.0[128 + RECORD_LEN..128 + RECORD_LEN + 5], b"third");
        assert_eq!(&ram.0[160 + RECORD_LEN..160 + RECORD_LEN + 6], b"second");
    }

    #[test]
    fn abort_keeps_installed_image() {
        let mut storage =
            FlashStorage::new(RamMut(vec![0; 192]), SLOTS).unwrap();
        install(&mut storage, 2, 1, b"abcd");

        let h = storage.open(&header(2, 2, 4), T).unwrap();
        storage.write(h, 0, b"xy", T).unwrap();
        storage.abort(h).unwrap();

        let mut buf = [0; 8];
        assert_eq!(
            storage.installed(2),
            Ok(Some(Installed { version: 1, len: 4 }))
        );
        assert_eq!(storage.read_installed(2, &mut buf), Ok(&b"abcd"[..]));

        // The handle is dead after an abort.
        assert_eq!(storage.write(h, 2, b"cd", T), Err(Error::BadHandle));
        assert_eq!(storage.commit(h, T), Err(Error::BadHandle));

        // A later update still goes through.
        install(&mut storage, 2, 3, b"efgh");
        assert_eq!(storage.read_installed(2, &mut buf), Ok(&b"efgh"[..]));
    }

    #[test]
    fn failed_write_keeps_installed_image() {
        let broken = Cell::new(false);
        let flash = Faulty {
            ram: RamMut(vec![0; 192]),
            broken: &broken,
        };
        let mut storage = FlashStorage::new(flash, SLOTS).unwrap();
        install(&mut storage, 1, 1, b"known good");

        let h = storage.open(&header(1, 2, 8), T).unwrap();
        storage.write(h, 0, b"new!", T).unwrap();
        broken.set(true);
        assert_eq!(
            storage.write(h, 4, b"new!", T),
            Err(Error::Flash(flash::Error::Unspecified))
        );
        storage.abort(h).unwrap();

        let mut buf = [0; 16];
        assert_eq!(storage.read_installed(1, &mut buf), Ok(&b"known good"[..]));

        // A commit whose record cannot be written changes nothing either.
        broken.set(false);
        let h = storage.open(&header(1, 2, 4), T).unwrap();
        storage.write(h, 0, b"new!", T).unwrap();
        broken.set(true);
        assert_eq!(
            storage.commit(h, T),
            Err(Error::Flash(flash::Error::Unspecified))
        );
        assert_eq!(
            storage.installed(1),
            Ok(Some(Installed {
                version: 1,
                len: 10
            }))
        );
    }

    #[test]
    fn handles() {
        let mut storage =
            FlashStorage::new(RamMut(vec![0; 192]), SLOTS).unwrap();
        let h = storage.open(&header(1, 1, 4), T).unwrap();
        assert_eq!(storage.open(&header(2, 1, 4), T), Err(Error::Busy));
        assert_eq!(storage.write(Handle(h.0 + 1), 0, b"x", T), Err(Error::BadHandle));
        storage.abort(h).unwrap();

        let h2 = storage.open(&header(2, 1, 4), T).unwrap();
        assert_ne!(h, h2);
    }

    #[test]
    fn bounds() {
        let mut storage =
            FlashStorage::new(RamMut(vec![0; 192]), SLOTS).unwrap();
        assert_eq!(SLOTS[1].capacity(), 32 - RECORD_LEN as u32);
        assert_eq!(storage.open(&header(3, 1, 4), T), Err(Error::NoSlot));
        assert_eq!(
            storage.open(&header(2, 1, SLOTS[1].capacity() + 1), T),
            Err(Error::OutOfSpace)
        );

        let h = storage.open(&header(2, 1, 4), T).unwrap();
        assert_eq!(storage.write(h, 2, b"abc", T), Err(Error::OutOfRange));
        assert_eq!(
            storage.write(h, u32::MAX, b"a", T),
            Err(Error::OutOfRange)
        );
        storage.write(h, 1, b"abc", T).unwrap();
    }

    #[test]
    fn layouts() {
        let ram = || RamMut(vec![0; 192]);
        assert!(FlashStorage::new(ram(), &[]).is_ok());

        let outside = [Slot {
            component_id: 1,
            region: Region::new(180, 48),
        }];
        assert_eq!(
            FlashStorage::new(ram(), &outside).map(|_| ()),
            Err(Error::BadLayout)
        );

        let tiny = [Slot {
            component_id: 1,
            region: Region::new(0, 2 * RECORD_LEN as u32 - 1),
        }];
        assert_eq!(
            FlashStorage::new(ram(), &tiny).map(|_| ()),
            Err(Error::BadLayout)
        );

        let overlapping = [SLOTS[0], Slot {
            component_id: 3,
            region: Region::new(127, 48),
        }];
        assert_eq!(
            FlashStorage::new(ram(), &overlapping).map(|_| ()),
            Err(Error::BadLayout)
        );

        let duplicate = [SLOTS[0], Slot {
            component_id: 1,
            region: Region::new(128, 48),
        }];
        assert_eq!(
            FlashStorage::new(ram(), &duplicate).map(|_| ()),
            Err(Error::BadLayout)
        );
    }

    #[test]
    fn read_only_device() {
        let ram = RamMut(vec![0; 192]);
        let mut storage = FlashStorage::new(&ram, SLOTS).unwrap();
        assert_eq!(
            storage.open(&header(1, 1, 4), T),
            Err(Error::Flash(flash::Error::Locked))
        );
    }
}
