// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable cryptograpy traits, and the algorithms built on top of them.
//!
//! `trustagent` requires a handful of cryptographic primitives to function:
//! message digests, a raw AES block operation, and (for certificates)
//! conventional signature verification. HMAC, HKDF and a CSRNG are also
//! available for integrations that need them. This module provides object-safe
//! traits that abstract over those operations, so that an integration can
//! back them with whatever accelerator its platform offers.
//!
//! On top of those primitives, this module implements the algorithms that
//! the rest of the crate relies on:
//! - [`aead`], the CCM and GCM authenticated encryption modes.
//! - [`lms`], Leighton-Micali hash-based signature verification.
//!
//! It is recommended to not import the traits in this module directly, since
//! a lot of them have the same name. Instead, use imports like
//! `use trustagent::crypto::hash;` and partially-qualified names like
//! `hash::Engine`.
//!
//! Software implementations of the primitive traits are provided under the
//! [`ring` module]. Their presence is controlled by the `ring` feature flag;
//! some operations require `std` as well.
//!
//! [`ring` module]: ring/index.html

pub mod aead;
pub mod block;
pub mod csrng;
pub mod hash;
pub mod lms;
pub mod mac;
pub mod sig;

#[cfg(feature = "ring")]
pub mod ring;

/// Compares two byte strings without branching on their contents.
///
/// The running time depends only on the lengths of `a` and `b`, which are
/// never secret in this crate.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    core::hint::black_box(diff) == 0
}
