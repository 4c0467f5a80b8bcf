// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `trustagent` is the device-side half of a verified firmware update
//! pipeline, together with the small cryptographic layer it is built on.
//!
//! The crate is organized leaves-first:
//! - [`crypto`] provides pluggable primitive traits (hashing, AES block
//!   encryption, signature verification), the CCM/GCM authenticated
//!   [`crypto::aead`] engine, and the [`crypto::lms`] hash-based signature
//!   verifier.
//! - [`cert`] decodes DER-encoded X.509 certificates and validates chains
//!   against an explicit set of trust anchors.
//! - [`fota`] is the trusted agent itself: it queries the platform for
//!   updatable components, verifies signed images and drives installation
//!   through a storage interface.
//!
//! Every operation is synchronous and allocation-free unless the `std`
//! feature is explicitly relied upon; all state is owned by the caller and
//! passed in explicitly.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![deny(warnings)]
#![deny(unused)]
#![deny(unsafe_code)]

#[macro_use]
mod debug;

pub mod cert;
pub mod crypto;
pub mod fota;
pub mod hardware;
pub mod io;
