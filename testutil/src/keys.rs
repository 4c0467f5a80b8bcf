// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Signing keys for tests.

use ring::rand::SystemRandom;
use ring::signature::EcdsaKeyPair;
use ring::signature::KeyPair as _;
use ring::signature::ECDSA_P256_SHA256_ASN1_SIGNING;

/// A freshly generated ECDSA P-256 key pair, producing ASN.1 signatures.
pub struct EcdsaKey {
    keypair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl EcdsaKey {
    /// Generates a new random key.
    pub fn generate() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 =
            EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
                .expect("could not generate P-256 key");
        let keypair = EcdsaKeyPair::from_pkcs8(
            &ECDSA_P256_SHA256_ASN1_SIGNING,
            pkcs8.as_ref(),
        )
        .expect("could not load P-256 key");
        Self { keypair, rng }
    }

    /// Returns the uncompressed public point, `0x04 || x || y`.
    pub fn public_point(&self) -> &[u8] {
        self.keypair.public_key().as_ref()
    }

    /// Signs `message`, returning a DER-encoded `Ecdsa-Sig-Value`.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.keypair
            .sign(&self.rng, message)
            .expect("could not sign")
            .as_ref()
            .to_vec()
    }

    /// Returns a `SubjectPublicKeyInfo` for this key.
    pub fn spki(&self) -> Vec<u8> {
        crate::x509::ecdsa_spki(self.public_point())
    }
}
