// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz tests for the X.509 certificate parser, without signature
//! validation.

#![no_main]

use libfuzzer_sys::fuzz_target;

use trustagent::cert::Cert;
use trustagent::cert::KeyUsage;
use trustagent::crypto::sig::NoVerify;

fuzz_target!(|data: &[u8]| {
    let cert = match Cert::parse(data) {
        Ok(cert) => cert,
        Err(_) => return,
    };

    assert_eq!(cert.raw(), data);
    let _ = cert.allows(KeyUsage::DigitalSignature);
    let _ = cert.is_within_path_len_constraint(usize::MAX);
    if cert.is_self_issued() {
        let _ = cert.verify_signature(cert.subject_key(), &mut NoVerify);
    }
});
