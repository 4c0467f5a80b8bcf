// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Update session tests, against in-memory collaborators.

use std::collections::HashMap;

use pretty_assertions::assert_eq;
use testutil::x509;
use testutil::x509::usage;
use testutil::x509::CertBuilder;
use testutil::EcdsaKey;

use super::*;
use crate::cert::Anchor;
use crate::cert::Cert;
use crate::crypto::lms::sign::PrivateKey;
use crate::crypto::lms::LmsType;
use crate::crypto::lms::OtsType;
use crate::crypto::ring;
use crate::fota::image::Builder;
use crate::fota::storage::Handle;

struct FakePlatform(Option<Vec<Component>>);

impl Platform for FakePlatform {
    fn components(&mut self) -> Result<&[Component], Error> {
        self.0.as_deref().ok_or(Error::Platform)
    }
}

#[derive(Default)]
struct FakeSource(HashMap<u32, Vec<u8>>);

impl ImageSource for FakeSource {
    fn image_len(&mut self, component: &Component) -> Result<u32, Error> {
        let image = self.0.get(&component.id).ok_or(Error::Source)?;
        Ok(image.len() as u32)
    }

    fn read(
        &mut self,
        component: &Component,
        offset: u32,
        out: &mut [u8],
    ) -> Result<(), Error> {
        let image = self.0.get(&component.id).ok_or(Error::Source)?;
        let start = offset as usize;
        let bytes = image.get(start..start + out.len()).ok_or(Error::Source)?;
        out.copy_from_slice(bytes);
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Op {
    Open(u32),
    Write(u32, usize),
    Commit,
    Abort,
}

/// Records every operation, and fails the first few writes or commits on
/// request.
#[derive(Default)]
struct FakeStorage {
    ops: Vec<Op>,
    failing_writes: u32,
    failing_commits: u32,
    staged: Option<(Handle, u32, Vec<u8>)>,
    installed: HashMap<u32, Vec<u8>>,
    next_handle: u32,
}

impl FakeStorage {
    fn staged(
        &mut self,
        handle: Handle,
    ) -> Result<&mut (Handle, u32, Vec<u8>), storage::Error> {
        match &mut self.staged {
            Some(s) if s.0 == handle => Ok(s),
            _ => Err(storage::Error::BadHandle),
        }
    }
}

impl Storage for FakeStorage {
    fn open(
        &mut self,
        header: &image::Header,
        _: Duration,
    ) -> Result<Handle, storage::Error> {
        self.ops.push(Op::Open(header.component_id));
        assert!(self.staged.is_none(), "handle left open");
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        self.staged = Some((
            handle,
            header.component_id,
            vec![0; header.payload_len as usize],
        ));
        Ok(handle)
    }

    fn write(
        &mut self,
        handle: Handle,
        offset: u32,
        bytes: &[u8],
        _: Duration,
    ) -> Result<(), storage::Error> {
        self.ops.push(Op::Write(offset, bytes.len()));
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(storage::Error::Timeout);
        }
        let (_, _, data) = self.staged(handle)?;
        let start = offset as usize;
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(
        &mut self,
        handle: Handle,
        _: Duration,
    ) -> Result<(), storage::Error> {
        self.ops.push(Op::Commit);
        self.staged(handle)?;
        let (_, id, data) = self.staged.take().unwrap();
        if self.failing_commits > 0 {
            self.failing_commits -= 1;
            return Err(storage::Error::Timeout);
        }
        self.installed.insert(id, data);
        Ok(())
    }

    fn abort(&mut self, handle: Handle) -> Result<(), storage::Error> {
        self.ops.push(Op::Abort);
        if self.staged(handle).is_ok() {
            self.staged = None;
        }
        Ok(())
    }
}

/// An image-signing hierarchy: an ECDSA root certifying an HSS signing key.
struct Signer {
    root_key: EcdsaKey,
    root: Vec<u8>,
    cert: Vec<u8>,
    sk: PrivateKey,
    hashes: ring::hash::Engine,
}

impl Signer {
    fn new() -> Self {
        let mut hashes = ring::hash::Engine::new();
        let mut sk = PrivateKey::new(
            LmsType::Sha256M32H5,
            OtsType::Sha256N32W4,
            *b"fota-test-key-id",
            &[9; 32],
        )
        .unwrap();
        let pk = sk.hss_public_key(&mut hashes).unwrap().to_bytes();

        let root_key = EcdsaKey::generate();
        let root = CertBuilder::new("root", "root", root_key.spki())
            .ca(None)
            .sign(|tbs| root_key.sign(tbs));
        let cert = CertBuilder::new("root", "signer", x509::hss_spki(&pk))
            .key_usage(usage::DIGITAL_SIGNATURE)
            .sign(|tbs| root_key.sign(tbs));

        Self {
            root_key,
            root,
            cert,
            sk,
            hashes,
        }
    }

    fn image(&mut self, id: u32, version: u32, payload: &[u8]) -> Vec<u8> {
        let cert = self.cert.clone();
        self.image_with_chain(id, version, payload, &[&cert[..]])
    }

    fn image_with_chain(
        &mut self,
        id: u32,
        version: u32,
        payload: &[u8],
        chain: &[&[u8]],
    ) -> Vec<u8> {
        let builder = Builder::new(
            id,
            version,
            payload,
            chain,
            self.sk.hss_signature_len(),
        )
        .unwrap();
        let sig = self
            .sk
            .sign_hss(&mut self.hashes, &[builder.signed_bytes()])
            .unwrap();
        builder.finish(&sig).unwrap()
    }
}

fn component(id: u32, version: u32, target: u32) -> Component {
    Component {
        id,
        version,
        target: Some(Target {
            version: target,
            max_size: 8192,
        }),
    }
}

/// Runs a single session to completion, returning the error (if any) and
/// the state the session ended in.
fn run(
    options: Options,
    component: Component,
    image: Vec<u8>,
    storage: &mut FakeStorage,
) -> (Result<(), Error>, State) {
    let mut agent = Agent::new(options);
    let mut platform = FakePlatform(Some(vec![component]));
    agent.query_components(&mut platform).unwrap();

    let mut source = FakeSource::default();
    source.0.insert(component.id, image);

    let mut buf = vec![0; 8192];
    let mut session = agent.session(&component).unwrap();
    let result = session
        .fetch(&mut source, &mut buf)
        .and_then(|_| {
            session.verify(
                &mut ring::sig::Ciphers::new(),
                &mut ring::hash::Engine::new(),
            )
        })
        .and_then(|_| session.install(storage));
    (result, session.state())
}

#[test]
#[cfg_attr(miri, ignore)]
fn session_walks_every_state() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let options = Options::new(TrustAnchors::new(&anchors));

    let mut agent = Agent::new(options);
    assert_eq!(agent.state(), State::Idle);
    let c = component(1, 1, 2);
    assert_eq!(
        agent.session(&c).map(|s| s.state()),
        Err(Error::BadState)
    );

    let mut platform = FakePlatform(Some(vec![c]));
    assert_eq!(agent.query_components(&mut platform), Ok(&[c][..]));
    assert_eq!(agent.state(), State::ComponentsQueried);

    let mut source = FakeSource::default();
    source.0.insert(1, signer.image(1, 2, b"new firmware"));
    let mut storage = FakeStorage::default();
    let mut ciphers = ring::sig::Ciphers::new();
    let mut hashes = ring::hash::Engine::new();
    let mut buf = [0; 8192];

    let mut session = agent.session(&c).unwrap();
    assert_eq!(session.state(), State::ComponentsQueried);
    // Out of order.
    assert_eq!(session.install(&mut storage), Err(Error::BadState));
    assert_eq!(session.state(), State::ComponentsQueried);

    session.fetch(&mut source, &mut buf).unwrap();
    assert_eq!(session.state(), State::ImageFetched);
    session.verify(&mut ciphers, &mut hashes).unwrap();
    assert_eq!(session.state(), State::SignatureVerified);
    assert_eq!(
        session.image().map(|i| i.payload()),
        Some(&b"new firmware"[..])
    );
    session.install(&mut storage).unwrap();
    assert_eq!(session.state(), State::Installed);
    assert_eq!(session.cancel(), State::Installed);

    assert_eq!(storage.installed[&1], b"new firmware");
    assert_eq!(storage.ops, vec![Op::Open(1), Op::Write(0, 12), Op::Commit]);
}

#[test]
#[cfg_attr(miri, ignore)]
fn chunked_writes() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let mut options = Options::new(TrustAnchors::new(&anchors));
    options.write_chunk = 4;

    let mut storage = FakeStorage::default();
    let image = signer.image(1, 2, b"0123456789");
    let (result, state) = run(options, component(1, 1, 2), image, &mut storage);
    assert_eq!(result, Ok(()));
    assert_eq!(state, State::Installed);
    assert_eq!(
        storage.ops,
        vec![
            Op::Open(1),
            Op::Write(0, 4),
            Op::Write(4, 4),
            Op::Write(8, 2),
            Op::Commit
        ]
    );
    assert_eq!(storage.installed[&1], b"0123456789");
}

#[test]
#[cfg_attr(miri, ignore)]
fn tampered_images_never_reach_storage() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let options = Options::new(TrustAnchors::new(&anchors));
    let c = component(1, 1, 2);

    let good = signer.image(1, 2, b"payload");
    let payload_at = image::HEADER_LEN;
    let sig_at = good.len() - signer.sk.hss_signature_len();

    let mut bad_payload = good.clone();
    bad_payload[payload_at] ^= 1;
    let mut bad_sig = good.clone();
    bad_sig[sig_at + 40] ^= 1;
    let mut bad_header = good.clone();
    bad_header[0] ^= 1;
    let mut truncated = good.clone();
    truncated.pop();

    let cases = [
        (bad_payload, Error::Signature(lms::Error::VerifyFailed)),
        (bad_sig, Error::Signature(lms::Error::VerifyFailed)),
        (bad_header, Error::BadImage),
        (truncated, Error::BadImage),
    ];
    for (image, error) in cases.iter().cloned() {
        let mut storage = FakeStorage::default();
        let (result, state) = run(options, c, image, &mut storage);
        assert_eq!(result, Err(error));
        assert_eq!(state, State::Failed);
        assert!(storage.ops.is_empty());
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn header_must_match_component() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let options = Options::new(TrustAnchors::new(&anchors));
    let c = component(1, 1, 2);

    for (id, version) in [(2, 2), (1, 3)].iter().copied() {
        let image = signer.image(id, version, b"payload");
        let mut storage = FakeStorage::default();
        let (result, state) = run(options, c, image, &mut storage);
        assert_eq!(result, Err(Error::BadImage));
        assert_eq!(state, State::Failed);
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn chain_must_reach_an_anchor() {
    let mut signer = Signer::new();
    let c = component(1, 1, 2);
    let image = signer.image(1, 2, b"payload");

    let (result, _) = run(
        Options::new(TrustAnchors::new(&[])),
        c,
        image.clone(),
        &mut FakeStorage::default(),
    );
    assert_eq!(result, Err(Error::Cert(cert::Error::NoTrustAnchor)));

    let other = EcdsaKey::generate();
    let impostor = CertBuilder::new("root", "root", other.spki())
        .ca(None)
        .sign(|tbs| other.sign(tbs));
    let impostor = Cert::parse(&impostor).unwrap();
    let anchors = [Anchor::from_cert(&impostor)];
    let (result, _) = run(
        Options::new(TrustAnchors::new(&anchors)),
        c,
        image,
        &mut FakeStorage::default(),
    );
    assert_eq!(result, Err(Error::Cert(cert::Error::BadSignature)));

    // A chain with no certificates at all.
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let image = signer.image_with_chain(1, 2, b"payload", &[]);
    let (result, _) = run(
        Options::new(TrustAnchors::new(&anchors)),
        c,
        image,
        &mut FakeStorage::default(),
    );
    assert_eq!(result, Err(Error::BadImage));
}

#[test]
#[cfg_attr(miri, ignore)]
fn intermediates_are_followed() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let options = Options::new(TrustAnchors::new(&anchors));

    let ca_key = EcdsaKey::generate();
    let ca = CertBuilder::new("root", "ca", ca_key.spki())
        .ca(None)
        .sign(|tbs| signer.root_key.sign(tbs));
    let pk = signer
        .sk
        .hss_public_key(&mut signer.hashes)
        .unwrap()
        .to_bytes();
    let leaf = CertBuilder::new("ca", "signer", x509::hss_spki(&pk))
        .key_usage(usage::DIGITAL_SIGNATURE)
        .sign(|tbs| ca_key.sign(tbs));

    let image = signer.image_with_chain(1, 2, b"payload", &[&leaf[..], &ca[..]]);
    let (result, state) =
        run(options, component(1, 1, 2), image, &mut FakeStorage::default());
    assert_eq!(result, Ok(()));
    assert_eq!(state, State::Installed);
}

#[test]
#[cfg_attr(miri, ignore)]
fn leaf_must_be_allowed_to_sign() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let options = Options::new(TrustAnchors::new(&anchors));
    let pk = signer
        .sk
        .hss_public_key(&mut signer.hashes)
        .unwrap()
        .to_bytes();

    // No key usage at all.
    let no_usage = CertBuilder::new("root", "signer", x509::hss_spki(&pk))
        .sign(|tbs| signer.root_key.sign(tbs));
    // An ECDSA key, which cannot have produced an HSS signature.
    let ecdsa = EcdsaKey::generate();
    let ecdsa_leaf = CertBuilder::new("root", "signer", ecdsa.spki())
        .key_usage(usage::DIGITAL_SIGNATURE)
        .sign(|tbs| signer.root_key.sign(tbs));

    for leaf in [no_usage, ecdsa_leaf].iter() {
        let image = signer.image_with_chain(1, 2, b"payload", &[&leaf[..]]);
        let mut storage = FakeStorage::default();
        let (result, _) = run(options, component(1, 1, 2), image, &mut storage);
        assert_eq!(result, Err(Error::UntrustedKey));
        assert!(storage.ops.is_empty());
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn lms_policy_is_enforced() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let mut options = Options::new(TrustAnchors::new(&anchors));
    options.lms_policy.ots = OtsType::Sha256N32W8.into();

    let image = signer.image(1, 2, b"payload");
    let (result, _) =
        run(options, component(1, 1, 2), image, &mut FakeStorage::default());
    assert_eq!(result, Err(Error::Signature(lms::Error::BadInput)));
}

#[test]
#[cfg_attr(miri, ignore)]
fn size_limits() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let options = Options::new(TrustAnchors::new(&anchors));
    let image = signer.image(1, 2, b"payload");

    let mut c = component(1, 1, 2);
    c.target = Some(Target {
        version: 2,
        max_size: image.len() as u32 - 1,
    });
    let (result, state) = run(options, c, image.clone(), &mut FakeStorage::default());
    assert_eq!(result, Err(Error::TooLarge));
    assert_eq!(state, State::Failed);

    // The caller's buffer is too small.
    let c = component(1, 1, 2);
    let mut agent = Agent::new(options);
    agent
        .query_components(&mut FakePlatform(Some(vec![c])))
        .unwrap();
    let mut source = FakeSource::default();
    source.0.insert(1, image.clone());
    let mut buf = vec![0; image.len() - 1];
    let mut session = agent.session(&c).unwrap();
    assert_eq!(session.fetch(&mut source, &mut buf), Err(Error::TooLarge));
    assert_eq!(session.state(), State::Failed);
}

#[test]
#[cfg_attr(miri, ignore)]
fn storage_failures_are_retried() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let mut options = Options::new(TrustAnchors::new(&anchors));
    options.storage_retries = 2;
    let c = component(1, 1, 2);
    let image = signer.image(1, 2, b"payload");

    let mut storage = FakeStorage {
        failing_writes: 1,
        failing_commits: 1,
        ..FakeStorage::default()
    };
    let (result, state) = run(options, c, image.clone(), &mut storage);
    assert_eq!(result, Ok(()));
    assert_eq!(state, State::Installed);
    assert_eq!(
        storage.ops,
        vec![
            Op::Open(1),
            Op::Write(0, 7),
            Op::Abort,
            Op::Open(1),
            Op::Write(0, 7),
            Op::Commit,
            Op::Abort,
            Op::Open(1),
            Op::Write(0, 7),
            Op::Commit,
        ]
    );
    assert_eq!(storage.installed[&1], b"payload");

    let mut storage = FakeStorage {
        failing_writes: 3,
        ..FakeStorage::default()
    };
    let (result, state) = run(options, c, image, &mut storage);
    assert_eq!(result, Err(Error::Storage(storage::Error::Timeout)));
    assert_eq!(state, State::Failed);
    assert_eq!(storage.ops.iter().filter(|&&op| op == Op::Abort).count(), 3);
    assert!(storage.installed.is_empty());
}

#[test]
#[cfg_attr(miri, ignore)]
fn update_all_reports_each_component() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let options = Options::new(TrustAnchors::new(&anchors));

    let no_target = Component {
        id: 2,
        version: 1,
        target: None,
    };
    let mut platform = FakePlatform(Some(vec![
        component(1, 1, 2),
        no_target,
        component(3, 5, 5),
        component(4, 1, 2),
        component(5, 1, 4),
    ]));

    let mut source = FakeSource::default();
    source.0.insert(1, signer.image(1, 2, b"one"));
    let mut corrupt = signer.image(4, 2, b"four");
    corrupt[image::HEADER_LEN] ^= 1;
    source.0.insert(4, corrupt);
    source.0.insert(5, signer.image(5, 4, b"five"));

    let mut storage = FakeStorage::default();
    let mut agent = Agent::new(options);
    let mut buf = [0; 8192];
    let report = agent
        .update_all(
            &mut platform,
            &mut source,
            &mut storage,
            &mut ring::sig::Ciphers::new(),
            &mut ring::hash::Engine::new(),
            &mut buf,
        )
        .unwrap();

    assert_eq!(
        report.outcomes(),
        &[
            (1, Outcome::Installed { version: 2 }),
            (2, Outcome::Skipped(Error::NoTarget)),
            (3, Outcome::Skipped(Error::Downgrade)),
            (
                4,
                Outcome::Failed(Error::Signature(lms::Error::VerifyFailed))
            ),
            (5, Outcome::Installed { version: 4 }),
        ][..]
    );
    assert_eq!(report.installed(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.outcome(2), Some(Outcome::Skipped(Error::NoTarget)));
    assert_eq!(report.outcome(6), None);
    assert_eq!(storage.installed.len(), 2);
    assert_eq!(storage.installed[&5], b"five");
}

#[test]
#[cfg_attr(miri, ignore)]
fn downgrades() {
    let mut signer = Signer::new();
    let root_der = signer.root.clone();
    let root = Cert::parse(&root_der).unwrap();
    let anchors = [Anchor::from_cert(&root)];
    let mut options = Options::new(TrustAnchors::new(&anchors));

    let old = component(1, 5, 3);
    let mut agent = Agent::new(options);
    agent
        .query_components(&mut FakePlatform(Some(vec![old])))
        .unwrap();
    assert_eq!(agent.session(&old).map(|_| ()), Err(Error::Downgrade));

    options.allow_downgrade = true;
    let image = signer.image(1, 3, b"older");
    let (result, state) = run(options, old, image, &mut FakeStorage::default());
    assert_eq!(result, Ok(()));
    assert_eq!(state, State::Installed);
}

#[test]
fn components_without_a_target_are_not_updated() {
    let options = Options::new(TrustAnchors::new(&[]));
    let mut agent = Agent::new(options);
    let current = Component {
        id: 7,
        version: 3,
        target: None,
    };
    agent
        .query_components(&mut FakePlatform(Some(vec![current])))
        .unwrap();
    assert_eq!(agent.session(&current).map(|_| ()), Err(Error::NoTarget));
    assert_eq!(agent.state(), State::ComponentsQueried);
}

#[test]
fn platform_errors() {
    let options = Options::new(TrustAnchors::new(&[]));
    let mut agent = Agent::new(options);
    assert_eq!(
        agent.query_components(&mut FakePlatform(None)),
        Err(Error::Platform)
    );
    assert_eq!(agent.state(), State::Idle);

    let many = (0..=MAX_COMPONENTS as u32)
        .map(|i| component(i, 1, 2))
        .collect::<Vec<_>>();
    assert_eq!(
        agent.query_components(&mut FakePlatform(Some(many))),
        Err(Error::TooManyComponents)
    );

    let known = component(1, 1, 2);
    agent
        .query_components(&mut FakePlatform(Some(vec![known])))
        .unwrap();
    assert_eq!(
        agent.session(&component(2, 1, 2)).map(|_| ()),
        Err(Error::UnknownComponent)
    );

    let mut session = agent.session(&known).unwrap();
    let mut source = FakeSource::default();
    let mut buf = [0; 16];
    assert_eq!(session.fetch(&mut source, &mut buf), Err(Error::Source));
    assert_eq!(session.cancel(), State::Failed);
}
