// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for the firmware image parser.

#![no_main]

use libfuzzer_sys::fuzz_target;

use trustagent::fota::image::Image;
use trustagent::fota::image::HEADER_LEN;
use trustagent::fota::MAX_CHAIN_CERTS;

fuzz_target!(|data: &[u8]| {
    let image = match Image::parse(data) {
        Ok(image) => image,
        Err(_) => return,
    };

    let header = image.header();
    assert_eq!(header.image_len(), data.len() as u64);
    assert_eq!(image.signed_bytes().len(), HEADER_LEN + image.payload().len());
    assert_eq!(image.chain().len(), header.chain_len as usize);
    assert_eq!(image.signature().len(), header.signature_len as usize);
    let _ = image.certs::<MAX_CHAIN_CERTS>();
});
