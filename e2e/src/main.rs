// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

#![deny(warnings)]
#![deny(unused)]
#![deny(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use structopt::StructOpt;

pub mod device;
pub mod pki;

#[cfg(test)]
mod tests;

#[derive(Debug, StructOpt)]
enum Options {
    /// Signs an image for every slot of a virtual device, updates it, and
    /// prints the outcome.
    Demo {
        /// A JSON file describing the device; see `device::Options`.
        #[structopt(long, parse(from_os_str))]
        device: Option<PathBuf>,

        /// The length of each generated payload.
        #[structopt(long, default_value = "1024")]
        payload_len: usize,
    },
    /// Prints the default device description as JSON.
    DefaultDevice,
}

fn main() {
    env_logger::init();
    match Options::from_args() {
        Options::Demo {
            device,
            payload_len,
        } => {
            let options = match device {
                Some(path) => {
                    let json = fs::read(path).unwrap();
                    serde_json::from_slice(&json).unwrap()
                }
                None => device::Options::default(),
            };
            let mut virt = device::Virtual::new(options);
            let mut pki = pki::Pki::new();

            for slot in virt.options().slots.clone() {
                let payload = (0..payload_len)
                    .map(|i| (i as u32 ^ slot.component_id) as u8)
                    .collect::<Vec<_>>();
                virt.offer(pki.sign(slot.component_id, 1, &payload));
            }

            let report = virt.update(&[pki.root.clone()]).unwrap();
            for (id, outcome) in report.outcomes() {
                println!("component {}: {:?}", id, outcome);
                if let Some((version, payload)) = virt.installed(*id) {
                    println!("  version {}, {} bytes", version, payload.len());
                }
            }
            log::info!(
                "{} installed, {} failed",
                report.installed(),
                report.failed()
            );
        }
        Options::DefaultDevice => {
            let json =
                serde_json::to_string_pretty(&device::Options::default())
                    .unwrap();
            println!("{}", json);
        }
    }
}

#[cfg(test)]
#[ctor::ctor]
fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
