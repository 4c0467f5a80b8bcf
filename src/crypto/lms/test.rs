// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! LMS and HSS tests, using the software signer to produce fixtures and
//! checking both signer and verifier against known answers.

use enumflags2::BitFlags;
use pretty_assertions::assert_eq;

use crate::crypto::lms;
use crate::crypto::lms::hss;
use crate::crypto::lms::sign::PrivateKey;
use crate::crypto::lms::Error;
use crate::crypto::lms::LmsType;
use crate::crypto::lms::OtsType;
use crate::crypto::lms::Policy;
use crate::crypto::lms::testdata;
use crate::crypto::ring::hash::Engine;
use crate::crypto::sig;
use crate::crypto::sig::Verify as _;

const ID: [u8; 16] = *b"trustagent-test!";

fn small_key(seed: u8) -> PrivateKey {
    PrivateKey::new(LmsType::Sha256M32H5, OtsType::Sha256N32W4, ID, &[seed; 32])
        .unwrap()
}

fn verify(
    key: &lms::PublicKey,
    message: &[u8],
    sig: &[u8],
) -> Result<(), Error> {
    let sig = lms::Signature::parse(sig)?;
    lms::verify(&mut Engine::new(), &Policy::default(), key, &[message], &sig)
}

#[test]
fn sign_then_verify() {
    let mut hashes = Engine::new();
    let mut sk = small_key(1);
    let pk = sk.public_key(&mut hashes).unwrap();

    for (i, msg) in [&b"first"[..], b"second", b""].iter().enumerate() {
        let sig = sk.sign(&mut hashes, &[msg]).unwrap();
        assert_eq!(
            sig.len(),
            lms::Signature::encoded_len(pk.lms_type(), pk.ots_type())
        );
        assert_eq!(lms::Signature::parse(&sig).unwrap().leaf_index(), i as u32);
        verify(&pk, msg, &sig).unwrap();
    }
    assert_eq!(sk.remaining(), 29);
}

#[test]
fn chunked_message() {
    let mut hashes = Engine::new();
    let mut sk = small_key(2);
    let pk = sk.public_key(&mut hashes).unwrap();
    let sig = sk.sign(&mut hashes, &[b"firm", b"ware"]).unwrap();
    verify(&pk, b"firmware", &sig).unwrap();
}

#[test]
fn wrong_message_or_key() {
    let mut hashes = Engine::new();
    let mut sk = small_key(3);
    let pk = sk.public_key(&mut hashes).unwrap();
    let sig = sk.sign(&mut hashes, &[b"payload"]).unwrap();
    assert_eq!(verify(&pk, b"payloae", &sig), Err(Error::VerifyFailed));

    let other = small_key(4).public_key(&mut hashes).unwrap();
    assert_eq!(verify(&other, b"payload", &sig), Err(Error::VerifyFailed));
}

#[test]
fn every_tampered_byte_is_rejected() {
    let mut hashes = Engine::new();
    let mut sk = small_key(5);
    let pk = sk.public_key(&mut hashes).unwrap();
    let sig = sk.sign(&mut hashes, &[b"payload"]).unwrap();

    for i in 0..sig.len() {
        let mut bad = sig.clone();
        bad[i] ^= 0x40;
        assert!(verify(&pk, b"payload", &bad).is_err(), "byte {}", i);
    }
}

#[test]
fn malformed_signatures() {
    let mut hashes = Engine::new();
    let mut sk = small_key(6);
    let sig = sk.sign(&mut hashes, &[b"payload"]).unwrap();

    // Truncated and overlong.
    assert_eq!(
        lms::Signature::parse(&sig[..sig.len() - 1]),
        Err(Error::BadInput)
    );
    let mut long = sig.clone();
    long.push(0);
    assert_eq!(lms::Signature::parse(&long), Err(Error::BadInput));

    // A leaf index past the end of an H5 tree.
    let mut bad_q = sig.clone();
    bad_q[..4].copy_from_slice(&32u32.to_be_bytes());
    assert_eq!(lms::Signature::parse(&bad_q), Err(Error::BadInput));

    // Unknown LM-OTS type.
    let mut bad_ots = sig;
    bad_ots[4..8].copy_from_slice(&0x99u32.to_be_bytes());
    assert_eq!(lms::Signature::parse(&bad_ots), Err(Error::BadInput));
}

#[test]
fn public_key_encoding() {
    let mut hashes = Engine::new();
    let pk = small_key(7).public_key(&mut hashes).unwrap();
    let bytes = pk.to_bytes();
    assert_eq!(bytes.len(), 56);
    assert_eq!(&bytes[..8], &[0u8, 0, 0, 5, 0, 0, 0, 3]);
    assert_eq!(lms::PublicKey::parse(&bytes).unwrap(), pk);

    assert_eq!(lms::PublicKey::parse(&bytes[..55]), Err(Error::BadInput));
    let mut mixed = bytes;
    // An M24 tree with an N32 one-time signature.
    mixed[3] = 0x0a;
    assert_eq!(lms::PublicKey::parse(&mixed), Err(Error::BadInput));
}

#[test]
fn out_of_private_keys() {
    let mut hashes = Engine::new();
    let mut sk = small_key(8);
    for _ in 0..32 {
        sk.sign(&mut hashes, &[b"x"]).unwrap();
    }
    assert_eq!(sk.remaining(), 0);
    assert_eq!(
        sk.sign(&mut hashes, &[b"x"]),
        Err(Error::OutOfPrivateKeys)
    );
}

#[test]
fn policy_selects_parameter_sets() {
    let mut hashes = Engine::new();
    let mut sk = PrivateKey::new(
        LmsType::Sha256M24H5,
        OtsType::Sha256N24W8,
        ID,
        &[9; 24],
    )
    .unwrap();
    let pk = sk.public_key(&mut hashes).unwrap();
    assert_eq!(pk.root().len(), 24);
    let bytes = sk.sign(&mut hashes, &[b"payload"]).unwrap();
    let sig = lms::Signature::parse(&bytes).unwrap();

    // The default policy only accepts the 256-bit sets.
    assert_eq!(
        lms::verify(&mut hashes, &Policy::default(), &pk, &[b"payload"], &sig),
        Err(Error::BadInput)
    );
    lms::verify(&mut hashes, &Policy::all(), &pk, &[b"payload"], &sig)
        .unwrap();

    let no_w8 = Policy {
        ots: Policy::all().ots & !BitFlags::from(OtsType::Sha256N24W8),
        ..Policy::all()
    };
    assert_eq!(
        lms::verify(&mut hashes, &no_w8, &pk, &[b"payload"], &sig),
        Err(Error::BadInput)
    );
}

#[test]
fn single_level_hss_through_sig_verify() {
    let mut hashes = Engine::new();
    let mut sk = small_key(10);
    let pk = sk.hss_public_key(&mut hashes).unwrap().to_bytes();
    let sig = sk.sign_hss(&mut hashes, &[b"image"]).unwrap();

    let mut verifier =
        lms::Verifier::new(Engine::new(), Policy::default(), &pk).unwrap();
    verifier.verify(&[b"ima", b"ge"], &sig).unwrap();
    assert_eq!(
        verifier.verify(&[b"imagf"], &sig),
        Err(sig::Error::BadSignature)
    );
}

#[test]
fn two_level_hss() {
    let mut hashes = Engine::new();
    let mut top = small_key(11);
    let mut bottom = PrivateKey::new(
        LmsType::Sha256M32H5,
        OtsType::Sha256N32W8,
        *b"trustagent-leaf!",
        &[12; 32],
    )
    .unwrap();

    let top_pk = top.public_key(&mut hashes).unwrap();
    let bottom_pk = bottom.public_key(&mut hashes).unwrap().to_bytes();

    let mut sig = 1u32.to_be_bytes().to_vec();
    sig.extend(top.sign(&mut hashes, &[&bottom_pk[..]]).unwrap());
    sig.extend(&bottom_pk);
    sig.extend(bottom.sign(&mut hashes, &[b"image"]).unwrap());

    let key = hss::PublicKey::new(2, top_pk).unwrap();
    let parsed = hss::Signature::parse(&sig).unwrap();
    assert_eq!(parsed.levels(), 2);
    hss::verify(&mut hashes, &Policy::default(), &key, &[b"image"], &parsed)
        .unwrap();

    // The level count is part of the key.
    let one_level = hss::PublicKey::new(1, top_pk).unwrap();
    assert_eq!(
        hss::verify(&mut hashes, &Policy::default(), &one_level, &[b"image"], &parsed),
        Err(Error::BadInput)
    );

    // Swapping the signed key breaks the top-level signature.
    let mut swapped = sig.clone();
    let at = 4 + lms::Signature::encoded_len(top_pk.lms_type(), top_pk.ots_type());
    swapped[at + 8] ^= 1;
    let parsed = hss::Signature::parse(&swapped).unwrap();
    assert_eq!(
        hss::verify(&mut hashes, &Policy::default(), &key, &[b"image"], &parsed),
        Err(Error::VerifyFailed)
    );
}

#[test]
fn hss_level_bounds() {
    let mut hashes = Engine::new();
    let pk = small_key(13).public_key(&mut hashes).unwrap();
    assert_eq!(hss::PublicKey::new(0, pk), Err(Error::BadInput));
    assert_eq!(hss::PublicKey::new(9, pk), Err(Error::BadInput));

    let mut sig = 8u32.to_be_bytes().to_vec();
    sig.resize(64, 0);
    assert_eq!(hss::Signature::parse(&sig), Err(Error::BadInput));
}

#[test]
#[cfg(feature = "serde")]
fn private_key_state_survives_serialization() {
    let mut hashes = Engine::new();
    let mut sk = small_key(14);
    let pk = sk.public_key(&mut hashes).unwrap();
    sk.sign(&mut hashes, &[b"one"]).unwrap();

    let json = serde_json::to_string(&sk).unwrap();
    let mut restored: PrivateKey = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.remaining(), 31);
    let sig = restored.sign(&mut hashes, &[b"two"]).unwrap();
    assert_eq!(lms::Signature::parse(&sig).unwrap().leaf_index(), 1);
    verify(&pk, b"two", &sig).unwrap();
}

#[test]
fn generated_keys_are_distinct() {
    let mut rng = crate::crypto::ring::csrng::Csrng::new();
    let mut hashes = Engine::new();
    let mut a =
        PrivateKey::generate(LmsType::Sha256M32H5, OtsType::Sha256N32W8, &mut rng)
            .unwrap();
    let mut b =
        PrivateKey::generate(LmsType::Sha256M32H5, OtsType::Sha256N32W8, &mut rng)
            .unwrap();
    let a_pub = a.public_key(&mut hashes).unwrap().to_bytes();
    assert_ne!(a_pub, b.public_key(&mut hashes).unwrap().to_bytes());

    let sig = a.sign(&mut hashes, &[b"image"]).unwrap();
    let pk = lms::PublicKey::parse(&a_pub).unwrap();
    let sig = lms::Signature::parse(&sig).unwrap();
    lms::verify(&mut hashes, &Policy::default(), &pk, &[b"image"], &sig).unwrap();

    assert_eq!(
        PrivateKey::generate(LmsType::Sha256M24H5, OtsType::Sha256N32W8, &mut rng)
            .err(),
        Some(Error::BadInput)
    );
}

#[test]
fn known_answer_m24() {
    let pk = lms::PublicKey::parse(testdata::M24_H15_PUB).unwrap();
    assert_eq!(pk.lms_type(), LmsType::Sha256M24H15);
    assert_eq!(pk.ots_type(), OtsType::Sha256N24W4);
    let sig = lms::Signature::parse(testdata::M24_H15_SIG).unwrap();
    assert_eq!(sig.leaf_index(), 0);

    let mut hashes = Engine::new();
    let msg = testdata::M24_H15_MSG;
    lms::verify(&mut hashes, &Policy::all(), &pk, &[msg], &sig).unwrap();
    lms::verify(&mut hashes, &Policy::all(), &pk, &[&msg[..4], &msg[4..]], &sig)
        .unwrap();
    assert_eq!(
        lms::verify(&mut hashes, &Policy::all(), &pk, &[&msg[1..]], &sig),
        Err(Error::VerifyFailed)
    );

    // The default policy only admits the 256-bit parameter sets.
    assert_eq!(
        lms::verify(&mut hashes, &Policy::default(), &pk, &[msg], &sig),
        Err(Error::BadInput)
    );
}

#[test]
fn known_answer_two_level_hss() {
    let mut hashes = Engine::new();
    let key = hss::PublicKey::parse(testdata::HSS_L2_PUB).unwrap();
    assert_eq!(key.levels(), 2);
    let sig = hss::Signature::parse(testdata::HSS_L2_SIG).unwrap();
    assert_eq!(sig.levels(), 2);
    assert_eq!(
        sig.message_signature().leaf_index(),
        testdata::HSS_L2_BOTTOM_LEAF
    );
    hss::verify(
        &mut hashes,
        &Policy::default(),
        &key,
        &[testdata::HSS_L2_MSG],
        &sig,
    )
    .unwrap();

    let mut verifier =
        lms::Verifier::new(Engine::new(), Policy::default(), testdata::HSS_L2_PUB)
            .unwrap();
    verifier
        .verify(&[testdata::HSS_L2_MSG], testdata::HSS_L2_SIG)
        .unwrap();
    let truncated = &testdata::HSS_L2_MSG[..testdata::HSS_L2_MSG.len() - 1];
    assert_eq!(
        verifier.verify(&[truncated], testdata::HSS_L2_SIG),
        Err(sig::Error::BadSignature)
    );
}

#[test]
fn signer_reproduces_known_answers() {
    let mut hashes = Engine::new();
    let mut top = PrivateKey::new(
        LmsType::Sha256M32H5,
        OtsType::Sha256N32W8,
        testdata::HSS_L2_TOP_ID,
        &testdata::hss_l2_top_seed(),
    )
    .unwrap();
    let mut bottom = PrivateKey::new(
        LmsType::Sha256M32H5,
        OtsType::Sha256N32W4,
        testdata::HSS_L2_BOTTOM_ID,
        &testdata::hss_l2_bottom_seed(),
    )
    .unwrap();

    let top_pk = top.public_key(&mut hashes).unwrap().to_bytes();
    assert_eq!(&top_pk[..], &testdata::HSS_L2_PUB[4..]);
    let bottom_pk = bottom.public_key(&mut hashes).unwrap().to_bytes();

    for _ in 0..testdata::HSS_L2_TOP_LEAF {
        top.sign(&mut hashes, &[b"skipped"]).unwrap();
    }
    for _ in 0..testdata::HSS_L2_BOTTOM_LEAF {
        bottom.sign(&mut hashes, &[b"skipped"]).unwrap();
    }

    let mut sig = 1u32.to_be_bytes().to_vec();
    sig.extend(top.sign(&mut hashes, &[&bottom_pk[..]]).unwrap());
    sig.extend(&bottom_pk);
    sig.extend(bottom.sign(&mut hashes, &[testdata::HSS_L2_MSG]).unwrap());
    assert_eq!(&sig[..], testdata::HSS_L2_SIG);
}
