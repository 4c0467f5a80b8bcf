// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! A throwaway image-signing hierarchy.
//!
//! An ECDSA root certifies an ECDSA firmware CA, which certifies the HSS key
//! that actually signs images.

use testutil::x509;
use testutil::x509::usage;
use testutil::x509::CertBuilder;
use testutil::EcdsaKey;

use trustagent::crypto::lms::sign::PrivateKey;
use trustagent::crypto::lms::LmsType;
use trustagent::crypto::lms::OtsType;
use trustagent::crypto::ring;
use trustagent::fota::image::Builder;

pub struct Pki {
    /// The root certificate, to be used as a trust anchor.
    pub root: Vec<u8>,
    pub intermediate: Vec<u8>,
    pub leaf: Vec<u8>,
    key: PrivateKey,
    hashes: ring::hash::Engine,
}

impl Pki {
    /// Generates a fresh hierarchy.
    pub fn new() -> Self {
        let mut hashes = ring::hash::Engine::new();

        let root_key = EcdsaKey::generate();
        let root = CertBuilder::new("e2e root", "e2e root", root_key.spki())
            .ca(None)
            .sign(|tbs| root_key.sign(tbs));

        let ca_key = EcdsaKey::generate();
        let intermediate =
            CertBuilder::new("e2e root", "e2e firmware ca", ca_key.spki())
                .ca(Some(0))
                .sign(|tbs| root_key.sign(tbs));

        let mut key = PrivateKey::new(
            LmsType::Sha256M32H5,
            OtsType::Sha256N32W8,
            *b"e2e-signing-key!",
            &[0x5a; 32],
        )
        .unwrap();
        let pk = key.hss_public_key(&mut hashes).unwrap().to_bytes();
        let leaf = CertBuilder::new(
            "e2e firmware ca",
            "e2e firmware signer",
            x509::hss_spki(&pk),
        )
        .key_usage(usage::DIGITAL_SIGNATURE)
        .sign(|tbs| ca_key.sign(tbs));

        Self {
            root,
            intermediate,
            leaf,
            key,
            hashes,
        }
    }

    /// Builds and signs an image carrying the full chain below the root.
    pub fn sign(&mut self, id: u32, version: u32, payload: &[u8]) -> Vec<u8> {
        let builder = Builder::new(
            id,
            version,
            payload,
            &[&self.leaf[..], &self.intermediate[..]],
            self.key.hss_signature_len(),
        )
        .unwrap();
        let sig = self
            .key
            .sign_hss(&mut self.hashes, &[builder.signed_bytes()])
            .unwrap();
        builder.finish(&sig).unwrap()
    }
}
