// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Tests for updates that are expected to go through.

use trustagent::fota::storage;
use trustagent::fota::Error;
use trustagent::fota::Outcome;

use crate::device;
use crate::pki::Pki;

fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(seed)).collect()
}

#[test]
fn installs_every_component() {
    let mut virt = device::Virtual::new(Default::default());
    let mut pki = Pki::new();
    for id in 1..=3 {
        virt.offer(pki.sign(id, 1, &payload(1000 * id as usize, id as u8)));
    }

    let report = virt.update(&[pki.root.clone()]).unwrap();
    assert_eq!(report.installed(), 3);
    for id in 1..=3 {
        assert_eq!(report.outcome(id), Some(Outcome::Installed { version: 1 }));
        let (version, bytes) = virt.installed(id).unwrap();
        assert_eq!(version, 1);
        assert_eq!(bytes, payload(1000 * id as usize, id as u8));
    }
}

#[test]
fn updates_are_idempotent() {
    let mut virt = device::Virtual::new(Default::default());
    let mut pki = Pki::new();
    virt.offer(pki.sign(2, 7, b"seven"));

    let report = virt.update(&[pki.root.clone()]).unwrap();
    assert_eq!(report.outcome(2), Some(Outcome::Installed { version: 7 }));
    assert_eq!(report.outcome(1), Some(Outcome::Skipped(Error::NoTarget)));

    // The platform now reports version 7, so the same offer is a downgrade.
    let flash = virt.flash().to_vec();
    let report = virt.update(&[pki.root.clone()]).unwrap();
    assert_eq!(report.installed(), 0);
    assert_eq!(report.outcome(2), Some(Outcome::Skipped(Error::Downgrade)));
    assert_eq!(virt.flash(), &flash[..]);
}

#[test]
fn newer_images_replace_older_ones() {
    let mut virt = device::Virtual::new(Default::default());
    let mut pki = Pki::new();

    virt.offer(pki.sign(1, 1, &payload(4000, 3)));
    virt.update(&[pki.root.clone()]).unwrap();
    virt.offer(pki.sign(1, 2, b"much shorter"));
    let report = virt.update(&[pki.root.clone()]).unwrap();

    assert_eq!(report.outcome(1), Some(Outcome::Installed { version: 2 }));
    assert_eq!(virt.installed(1), Some((2, b"much shorter".to_vec())));
}

#[test]
fn flaky_storage_is_retried() {
    let mut virt = device::Virtual::new(device::Options {
        flaky_writes: 2,
        ..Default::default()
    });
    let mut pki = Pki::new();
    virt.offer(pki.sign(3, 1, &payload(2048, 5)));

    let report = virt.update(&[pki.root.clone()]).unwrap();
    assert_eq!(report.outcome(3), Some(Outcome::Installed { version: 1 }));
    assert_eq!(virt.installed(3).unwrap().1, payload(2048, 5));
}

#[test]
fn failed_installs_keep_the_running_image() {
    let mut virt = device::Virtual::new(Default::default());
    let mut pki = Pki::new();
    virt.offer(pki.sign(1, 1, b"known good"));
    virt.update(&[pki.root.clone()]).unwrap();

    // More timeouts than the agent has retries.
    virt.options_mut().flaky_writes = 100;
    virt.offer(pki.sign(1, 2, &payload(3000, 7)));
    let report = virt.update(&[pki.root.clone()]).unwrap();
    assert_eq!(
        report.outcome(1),
        Some(Outcome::Failed(Error::Storage(storage::Error::Timeout)))
    );
    assert_eq!(virt.installed(1), Some((1, b"known good".to_vec())));

    // Once storage recovers, the same offer goes through.
    virt.options_mut().flaky_writes = 0;
    let report = virt.update(&[pki.root.clone()]).unwrap();
    assert_eq!(report.outcome(1), Some(Outcome::Installed { version: 2 }));
    assert_eq!(virt.installed(1), Some((2, payload(3000, 7))));
}

#[test]
fn device_options_round_trip_through_json() {
    let options = device::Options::default();
    let json = serde_json::to_string(&options).unwrap();
    let parsed: device::Options = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.slots, options.slots);
    assert_eq!(parsed.max_image_size, options.max_image_size);
}
