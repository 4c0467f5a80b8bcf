// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Test utilities shared by the `trustagent` workspace.
//!
//! This crate must not depend on `trustagent` itself; it only knows how to
//! produce encoded test data: hex literals, DER, X.509 certificates and
//! ECDSA signatures.

pub mod der;
pub mod x509;

mod keys;
pub use keys::EcdsaKey;

/// Decodes a hex string, ignoring any whitespace.
///
/// # Panics
///
/// Panics if `s` is not valid hex.
pub fn hex(s: &str) -> Vec<u8> {
    let digits = s
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_digit(16).expect("bad hex digit") as u8)
        .collect::<Vec<_>>();
    assert!(digits.len() % 2 == 0, "odd-length hex string");
    digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_ignores_whitespace() {
        assert_eq!(hex("00 ff\n1a"), vec![0x00, 0xff, 0x1a]);
        assert!(hex("").is_empty());
    }
}
