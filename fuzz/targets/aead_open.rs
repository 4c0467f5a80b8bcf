// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for AEAD decryption.

#![no_main]

use libfuzzer_sys::arbitrary;
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use trustagent::crypto::aead;
use trustagent::crypto::block;
use trustagent::crypto::ring;

#[derive(Arbitrary, Debug)]
struct Input {
    algo: block::Algo,
    mode: aead::Mode,
    key: Vec<u8>,
    nonce: Vec<u8>,
    aad: Vec<u8>,
    ciphertext: Vec<u8>,
    tag: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let mut ctx = match aead::Context::with_key(
        &ring::aes::Builder::new(),
        input.algo,
        &input.key,
        input.mode,
    ) {
        Ok(ctx) => ctx,
        Err(_) => return,
    };

    let mut buf = input.ciphertext.clone();
    let result =
        ctx.open_in_place(&input.nonce, &input.aad, &mut buf, &input.tag);
    if result.is_err() {
        assert!(buf.iter().all(|&b| b == 0));
    }
    assert!(!ctx.is_busy());
});
