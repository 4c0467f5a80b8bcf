// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Test-only data.
//!
//! Known-answer vectors produced outside of this crate, so that the verifier
//! is not only ever checked against its own signer.

/// An `LMS_SHA256_M24_H15` / `LMOTS_SHA256_N24_W4` public key (NIST SP 800-208
/// parameter sets), as carried in Caliptra's LMS driver tests.
pub const M24_H15_PUB: &[u8] = include_bytes!("m24_h15.pub");

/// A signature by [`M24_H15_PUB`] over [`M24_H15_MSG`], using leaf 0.
pub const M24_H15_SIG: &[u8] = include_bytes!("m24_h15.sig");

/// The message signed by [`M24_H15_SIG`].
pub const M24_H15_MSG: &[u8] = include_bytes!("m24_h15.msg");

/// A two-level HSS public key. The top tree is
/// `LMS_SHA256_M32_H5` / `LMOTS_SHA256_N32_W8`, with identifier
/// [`HSS_L2_TOP_ID`] and seed [`hss_l2_top_seed()`]; the bottom tree is
/// `LMS_SHA256_M32_H5` / `LMOTS_SHA256_N32_W4`, with identifier
/// [`HSS_L2_BOTTOM_ID`] and seed [`hss_l2_bottom_seed()`].
///
/// Keys are derived as in RFC 8554 appendix A, and the randomizer `C` of
/// leaf `q` is the appendix A value for chain index `0xfffd`. The vector was
/// generated with an independent Python implementation of RFC 8554.
pub const HSS_L2_PUB: &[u8] = include_bytes!("hss_l2.pub");

/// A signature by [`HSS_L2_PUB`] over [`HSS_L2_MSG`]. The top tree signs
/// the bottom tree's public key with leaf [`HSS_L2_TOP_LEAF`], and the bottom
/// tree signs the message with leaf [`HSS_L2_BOTTOM_LEAF`].
pub const HSS_L2_SIG: &[u8] = include_bytes!("hss_l2.sig");

/// The message signed by [`HSS_L2_SIG`].
pub const HSS_L2_MSG: &[u8] = include_bytes!("hss_l2.msg");

pub const HSS_L2_TOP_ID: [u8; 16] = [
    0xd0, 0x8f, 0xab, 0xd4, 0xa2, 0x09, 0x1f, 0xf0, 0xa8, 0xcb, 0x4e, 0xd8,
    0x34, 0xe7, 0x45, 0x34,
];
pub const HSS_L2_TOP_LEAF: u32 = 3;

pub const HSS_L2_BOTTOM_ID: [u8; 16] = [
    0x21, 0x5f, 0x83, 0xb7, 0xcc, 0xb9, 0xac, 0xbc, 0xd0, 0x8d, 0xb9, 0x7b,
    0x0d, 0x04, 0xdc, 0x2b,
];
pub const HSS_L2_BOTTOM_LEAF: u32 = 9;

/// The top tree's seed: the bytes `0x40..0x60`.
pub fn hss_l2_top_seed() -> Vec<u8> {
    (0x40..0x60).collect()
}

/// The bottom tree's seed: the bytes `0xa0..0xc0`.
pub fn hss_l2_bottom_seed() -> Vec<u8> {
    (0xa0..0xc0).collect()
}
