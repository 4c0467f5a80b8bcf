// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Tests for updates that must be refused without touching storage.

use trustagent::crypto::lms;
use trustagent::fota::storage;
use trustagent::fota::Error;
use trustagent::fota::Outcome;

use crate::device;
use crate::pki::Pki;

/// Installs version 1 of component 1, returning the device and the flash
/// contents afterwards.
fn provisioned(pki: &mut Pki) -> (device::Virtual, Vec<u8>) {
    let mut virt = device::Virtual::new(Default::default());
    virt.offer(pki.sign(1, 1, b"known good"));
    let report = virt.update(&[pki.root.clone()]).unwrap();
    assert_eq!(report.installed(), 1);
    let flash = virt.flash().to_vec();
    (virt, flash)
}

#[test]
fn foreign_signer() {
    let mut pki = Pki::new();
    let (mut virt, flash) = provisioned(&mut pki);

    let mut other = Pki::new();
    virt.offer(other.sign(1, 2, b"evil"));
    let report = virt.update(&[pki.root.clone()]).unwrap();

    assert!(matches!(report.outcome(1), Some(Outcome::Failed(Error::Cert(_)))));
    assert_eq!(virt.flash(), &flash[..]);
    assert_eq!(virt.installed(1), Some((1, b"known good".to_vec())));
}

#[test]
fn tampered_payload() {
    let mut pki = Pki::new();
    let (mut virt, flash) = provisioned(&mut pki);

    let mut image = pki.sign(1, 2, b"new firmware");
    // The payload follows the 28-byte header.
    image[30] ^= 0x01;
    virt.offer(image);
    let report = virt.update(&[pki.root.clone()]).unwrap();

    assert_eq!(
        report.outcome(1),
        Some(Outcome::Failed(Error::Signature(lms::Error::VerifyFailed)))
    );
    assert_eq!(virt.flash(), &flash[..]);
}

#[test]
fn missing_intermediate() {
    let mut pki = Pki::new();
    let (mut virt, flash) = provisioned(&mut pki);

    // Trusting only the firmware CA's issuer is not enough if the CA itself
    // is left out of the image.
    pki.intermediate.clear();
    virt.offer(pki.sign(1, 2, b"new firmware"));
    let report = virt.update(&[pki.root.clone()]).unwrap();

    assert!(matches!(report.outcome(1), Some(Outcome::Failed(Error::Cert(_)))));
    assert_eq!(virt.flash(), &flash[..]);
}

#[test]
fn image_too_large_for_slot() {
    let mut pki = Pki::new();
    let (mut virt, flash) = provisioned(&mut pki);

    virt.offer(pki.sign(1, 2, &vec![0xaa; 0x2000]));
    let report = virt.update(&[pki.root.clone()]).unwrap();

    assert_eq!(
        report.outcome(1),
        Some(Outcome::Failed(Error::Storage(storage::Error::OutOfSpace)))
    );
    assert_eq!(virt.flash(), &flash[..]);
    assert_eq!(virt.installed(1), Some((1, b"known good".to_vec())));
}

#[test]
fn image_too_large_for_platform() {
    let mut pki = Pki::new();
    let (mut virt, flash) = provisioned(&mut pki);

    virt.offer(pki.sign(1, 2, &vec![0xaa; 0x4000]));
    let report = virt.update(&[pki.root.clone()]).unwrap();

    assert_eq!(report.outcome(1), Some(Outcome::Failed(Error::TooLarge)));
    assert_eq!(virt.flash(), &flash[..]);
}
