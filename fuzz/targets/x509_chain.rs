// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for chain building, over certificates whose signatures are
//! all accepted.

#![no_main]

use libfuzzer_sys::fuzz_target;

use trustagent::cert::chain;
use trustagent::cert::Anchor;
use trustagent::cert::Cert;
use trustagent::cert::TrustAnchors;
use trustagent::crypto::sig::NoVerify;

fuzz_target!(|ders: Vec<Vec<u8>>| {
    let certs = ders
        .iter()
        .filter_map(|der| Cert::parse(der).ok())
        .collect::<Vec<_>>();
    let (leaf, rest) = match certs.split_first() {
        Some(split) => split,
        None => return,
    };

    // The last certificate doubles as the anchor, so that some inputs
    // actually chain.
    let anchors = rest.last().map(Anchor::from_cert).into_iter().collect::<Vec<_>>();
    let options = chain::Options::default();
    if let Ok(depth) = chain::verify(
        leaf,
        rest,
        &TrustAnchors::new(&anchors),
        &options,
        &mut NoVerify,
    ) {
        assert!(depth >= 1 && depth <= options.max_depth);
    }
});
