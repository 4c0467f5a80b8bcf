// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for HSS key and signature parsing and verification.

#![no_main]

use libfuzzer_sys::arbitrary;
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use trustagent::crypto::lms;
use trustagent::crypto::lms::hss;
use trustagent::crypto::ring;

#[derive(Arbitrary, Debug)]
struct Input {
    key: Vec<u8>,
    message: Vec<u8>,
    signature: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let key = match hss::PublicKey::parse(&input.key) {
        Ok(key) => key,
        Err(_) => return,
    };
    let sig = match hss::Signature::parse(&input.signature) {
        Ok(sig) => sig,
        Err(_) => return,
    };

    // Forging a signature by chance would be a remarkable find.
    let result = hss::verify(
        &mut ring::hash::Engine::new(),
        &lms::Policy::all(),
        &key,
        &[&input.message],
        &sig,
    );
    assert!(result.is_err());
});
