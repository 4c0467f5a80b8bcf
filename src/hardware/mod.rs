// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable hardware functionality
//!
//! This module provides traits for plugging in device-specific storage.
//! `trustagent` uses this functionality to stage and commit firmware images.

pub mod flash;
