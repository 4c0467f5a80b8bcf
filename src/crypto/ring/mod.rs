// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Software implementations of crypto traits.
//!
//! This module provides software implemenations of [`crypto`] traits suitable
//! for host-side tools and tests, and for integrations without cryptographic
//! accelerators. Most are built on the [`ring`] crate; SHA-3 and the raw AES
//! block operation, which `ring` does not expose, come from RustCrypto. Some
//! submodules have dependencies on the `std` feature flag.
//!
//! Types in this module, much like those in [`crypto`], should not be imported
//! directly. Instead, names such as `ring::hash::Engine` should be used
//! instead.
//!
//! The [`ring` warranty disclaimer] applies to this module as well.
//!
//! [`ring` warranty disclaimer]: https://github.com/briansmith/ring/blob/main/README.md

pub mod aes;
#[cfg(feature = "std")]
pub mod csrng;
#[cfg(feature = "std")]
pub mod ecdsa;
pub mod hash;
pub mod mac;
#[cfg(feature = "std")]
pub mod sig;

#[cfg(doc)]
use crate::crypto;
