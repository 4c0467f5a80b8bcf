// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Implementations of [`crypto::sig`] based on [`ring`].
//!
//! Requires the `std` feature flag to be enabled.

use crate::crypto::lms;
use crate::crypto::ring::ecdsa;
use crate::crypto::ring::hash;
use crate::crypto::sig;
use crate::crypto::sig::Algo;
use crate::crypto::sig::PublicKeyParams;

#[cfg(doc)]
use crate::crypto;

/// A [`sig::Ciphers`] built on top of `ring`.
///
/// HSS/LMS keys are verified with [`lms::Verifier`], under the policy this
/// value was created with.
#[derive(Default)]
pub struct Ciphers {
    lms_policy: lms::Policy,
    verifier: Option<Box<dyn sig::Verify>>,
}

impl Ciphers {
    /// Returns a new `Ciphers` using the default LMS policy.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns a new `Ciphers` that accepts the LMS parameter sets in
    /// `policy`.
    pub fn with_lms_policy(policy: lms::Policy) -> Self {
        Self {
            lms_policy: policy,
            verifier: None,
        }
    }
}

impl sig::Ciphers for Ciphers {
    fn verifier<'a>(
        &'a mut self,
        algo: sig::Algo,
        key: &sig::PublicKeyParams,
    ) -> Option<&'a mut dyn sig::Verify> {
        self.verifier = match (algo, key) {
            (Algo::EcdsaP256Sha256, PublicKeyParams::EcdsaP256 { point }) => {
                Some(Box::new(ecdsa::VerifyP256::from_point(point)?))
            }
            (Algo::HssLms, PublicKeyParams::Hss { key }) => {
                let verifier =
                    lms::Verifier::new(hash::Engine::new(), self.lms_policy, key)
                        .ok()?;
                Some(Box::new(verifier))
            }
            _ => None,
        };

        self.verifier.as_mut().map(|x| &mut **x as _)
    }
}
