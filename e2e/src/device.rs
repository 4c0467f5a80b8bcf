// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! A virtual device.
//!
//! The device is a RAM-backed flash carved into one two-bank slot per
//! component. Its platform reports whatever is committed to those slots, and
//! an in-memory server offers signed images for them.

use std::collections::HashMap;
use std::convert::TryFrom as _;
use std::time::Duration;

use trustagent::cert::Anchor;
use trustagent::cert::Cert;
use trustagent::cert::TrustAnchors;
use trustagent::crypto::ring;
use trustagent::fota;
use trustagent::fota::image::Header;
use trustagent::fota::storage;
use trustagent::fota::storage::FlashStorage;
use trustagent::fota::storage::Handle;
use trustagent::fota::storage::Slot;
use trustagent::fota::Component;
use trustagent::fota::Report;
use trustagent::fota::Storage;
use trustagent::fota::Target;
use trustagent::hardware::flash::RamMut;
use trustagent::hardware::flash::Region;

/// Options for the device.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
pub struct Options {
    /// The size of the flash device.
    pub flash_size: u32,
    /// The slots carved out of the flash device; one per component.
    pub slots: Vec<Slot>,
    /// The version reported for a component with nothing installed.
    pub factory_version: u32,
    /// The largest image the platform will accept.
    pub max_image_size: u32,
    /// The largest write the agent may issue.
    pub write_chunk: usize,
    /// The number of storage writes that time out before storage starts
    /// working.
    pub flaky_writes: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            flash_size: 0x10000,
            slots: (0..3)
                .map(|i| Slot {
                    component_id: i + 1,
                    region: Region::new(i * 0x4000, 0x4000),
                })
                .collect(),
            factory_version: 0,
            max_image_size: 0x4000,
            write_chunk: 512,
            flaky_writes: 0,
        }
    }
}

pub struct Virtual {
    options: Options,
    flash: RamMut<Vec<u8>>,
    offers: HashMap<u32, Vec<u8>>,
}

impl Virtual {
    /// Creates a device with blank flash and nothing on offer.
    pub fn new(options: Options) -> Self {
        let flash = RamMut(vec![0xff; options.flash_size as usize]);
        Self {
            options,
            flash,
            offers: HashMap::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    #[cfg(test)]
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    /// Returns the raw flash contents.
    #[cfg(test)]
    pub fn flash(&self) -> &[u8] {
        &self.flash.0
    }

    /// Offers `image` for the component named in its header, replacing any
    /// previous offer.
    pub fn offer(&mut self, image: Vec<u8>) {
        let header = Header::parse(&image).unwrap();
        self.offers.insert(header.component_id, image);
    }

    /// Returns what the platform currently reports.
    pub fn inventory(&self) -> Vec<Component> {
        let storage = FlashStorage::new(&self.flash, &self.options.slots).unwrap();
        self.options
            .slots
            .iter()
            .map(|slot| {
                let id = slot.component_id;
                let version = storage
                    .installed(id)
                    .unwrap()
                    .map_or(self.options.factory_version, |i| i.version);
                let target = self.offers.get(&id).map(|image| Target {
                    version: Header::parse(image).unwrap().image_version,
                    max_size: self.options.max_image_size,
                });
                Component {
                    id,
                    version,
                    target,
                }
            })
            .collect()
    }

    /// Returns the version and payload installed for `id`, if any.
    pub fn installed(&self, id: u32) -> Option<(u32, Vec<u8>)> {
        let storage = FlashStorage::new(&self.flash, &self.options.slots).unwrap();
        let installed = storage.installed(id).unwrap()?;
        let mut buf = vec![0; installed.len as usize];
        let payload = storage.read_installed(id, &mut buf).unwrap();
        Some((installed.version, payload.to_vec()))
    }

    /// Runs the update agent over every component, trusting `anchors`.
    pub fn update(&mut self, anchors: &[Vec<u8>]) -> Result<Report, fota::Error> {
        let certs = anchors
            .iter()
            .map(|der| Cert::parse(der).unwrap())
            .collect::<Vec<_>>();
        let anchors = certs.iter().map(Anchor::from_cert).collect::<Vec<_>>();
        let mut options = fota::Options::new(TrustAnchors::new(&anchors));
        options.write_chunk = self.options.write_chunk;

        let mut platform = Inventory(self.inventory());
        let mut server = Server(&self.offers);
        let mut storage = Flaky {
            inner: FlashStorage::new(&mut self.flash, &self.options.slots)
                .unwrap(),
            failures: self.options.flaky_writes,
        };
        let mut buf = vec![0; self.options.max_image_size as usize];

        fota::Agent::new(options).update_all(
            &mut platform,
            &mut server,
            &mut storage,
            &mut ring::sig::Ciphers::new(),
            &mut ring::hash::Engine::new(),
            &mut buf,
        )
    }
}

struct Inventory(Vec<Component>);

impl fota::Platform for Inventory {
    fn components(&mut self) -> Result<&[Component], fota::Error> {
        Ok(&self.0)
    }
}

struct Server<'a>(&'a HashMap<u32, Vec<u8>>);

impl fota::ImageSource for Server<'_> {
    fn image_len(&mut self, component: &Component) -> Result<u32, fota::Error> {
        let image = self.0.get(&component.id).ok_or(fota::Error::Source)?;
        u32::try_from(image.len()).map_err(|_| fota::Error::Source)
    }

    fn read(
        &mut self,
        component: &Component,
        offset: u32,
        out: &mut [u8],
    ) -> Result<(), fota::Error> {
        let image = self.0.get(&component.id).ok_or(fota::Error::Source)?;
        let start = offset as usize;
        let bytes = image
            .get(start..start + out.len())
            .ok_or(fota::Error::Source)?;
        out.copy_from_slice(bytes);
        Ok(())
    }
}

/// Times out the first `failures` writes.
struct Flaky<S> {
    inner: S,
    failures: u32,
}

impl<S: Storage> Storage for Flaky<S> {
    fn open(
        &mut self,
        header: &Header,
        timeout: Duration,
    ) -> Result<Handle, storage::Error> {
        self.inner.open(header, timeout)
    }

    fn write(
        &mut self,
        handle: Handle,
        offset: u32,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<(), storage::Error> {
        if self.failures > 0 {
            self.failures -= 1;
            log::warn!("flaky storage: dropping write at {}", offset);
            return Err(storage::Error::Timeout);
        }
        self.inner.write(handle, offset, bytes, timeout)
    }

    fn commit(
        &mut self,
        handle: Handle,
        timeout: Duration,
    ) -> Result<(), storage::Error> {
        self.inner.commit(handle, timeout)
    }

    fn abort(&mut self, handle: Handle) -> Result<(), storage::Error> {
        self.inner.abort(handle)
    }
}
