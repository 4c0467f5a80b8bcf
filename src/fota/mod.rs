// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Verified firmware-over-the-air updates.
//!
//! The [`Agent`] asks a [`Platform`] which components exist, then walks each
//! component with a pending target through a [`Session`]:
//!
//! ```text
//! Idle -> ComponentsQueried -> ImageFetched -> SignatureVerified
//!      -> Installing -> Installed | Failed
//! ```
//!
//! A session only moves forward. Any failure moves it straight to
//! [`State::Failed`]; in particular, nothing is ever written to [`Storage`]
//! unless the image's certificate chain and signature both verified.
//!
//! Images are fetched from an [`ImageSource`] into a buffer owned by the
//! caller; see [`image`] for their format.

use core::time::Duration;

use arrayvec::ArrayVec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cert;
use crate::cert::chain;
use crate::cert::KeyUsage;
use crate::cert::TrustAnchors;
use crate::crypto::hash;
use crate::crypto::lms;
use crate::crypto::lms::hss;
use crate::crypto::sig;

pub mod image;
pub mod storage;

use image::Image;
pub use storage::Storage;

#[cfg(test)]
mod test;

/// The largest number of components an [`Agent`] will track.
pub const MAX_COMPONENTS: usize = 16;

/// The largest number of certificates in an image's chain, including the
/// leaf.
pub const MAX_CHAIN_CERTS: usize = 8;

/// An updatable component, as reported by the [`Platform`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Component {
    /// The component's identifier.
    pub id: u32,
    /// The version currently installed.
    pub version: u32,
    /// The image the component should be updated to, if any.
    pub target: Option<Target>,
}

/// A pending update for a [`Component`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Target {
    /// The version of the new image.
    pub version: u32,
    /// The largest acceptable image, in bytes, including its header, chain
    /// and signature.
    pub max_size: u32,
}

/// The state of a [`Session`] (or of an [`Agent`], which only ever
/// reaches [`State::ComponentsQueried`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum State {
    /// Nothing has happened yet.
    Idle,
    /// The platform's components are known.
    ComponentsQueried,
    /// An image has been downloaded but not checked.
    ImageFetched,
    /// The image's chain and signature verified.
    SignatureVerified,
    /// The image is being written to storage.
    Installing,
    /// The image was committed to storage.
    Installed,
    /// Something went wrong; the session cannot proceed.
    Failed,
}

/// An update error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The platform could not report its components.
    Platform,
    /// The platform reported more than [`MAX_COMPONENTS`] components.
    TooManyComponents,
    /// The component was not reported by the platform.
    UnknownComponent,
    /// The component has no pending update.
    NoTarget,
    /// The target version is not newer than the installed one.
    Downgrade,
    /// The operation is not valid in the current [`State`].
    BadState,
    /// The image source failed.
    Source,
    /// The image exceeds the target's maximum size, or the buffer provided
    /// to hold it.
    TooLarge,
    /// The image was malformed, or is for a different component or version.
    BadImage,
    /// The certificate chain was malformed or did not verify.
    Cert(cert::Error),
    /// The leaf certificate may not sign images.
    UntrustedKey,
    /// The image signature was malformed or did not verify.
    Signature(lms::Error),
    /// Storage failed, after all retries.
    Storage(storage::Error),
}

impl From<image::Error> for Error {
    fn from(_: image::Error) -> Self {
        Self::BadImage
    }
}

impl From<cert::Error> for Error {
    fn from(e: cert::Error) -> Self {
        Self::Cert(e)
    }
}

impl From<lms::Error> for Error {
    fn from(e: lms::Error) -> Self {
        Self::Signature(e)
    }
}

impl From<storage::Error> for Error {
    fn from(e: storage::Error) -> Self {
        Self::Storage(e)
    }
}

/// Reports which components are present on the device.
pub trait Platform {
    /// Returns every component, in the order they should be updated.
    ///
    /// Failures should be reported as [`Error::Platform`].
    fn components(&mut self) -> Result<&[Component], Error>;
}
impl dyn Platform {} // Ensure object-safe.

/// Provides signed images.
pub trait ImageSource {
    /// Returns the length of the image for `component`'s target.
    ///
    /// Failures should be reported as [`Error::Source`].
    fn image_len(&mut self, component: &Component) -> Result<u32, Error>;

    /// Reads `out.len()` bytes of the image for `component`'s target,
    /// starting at `offset`.
    ///
    /// Failures should be reported as [`Error::Source`].
    fn read(
        &mut self,
        component: &Component,
        offset: u32,
        out: &mut [u8],
    ) -> Result<(), Error>;
}
impl dyn ImageSource {} // Ensure object-safe.

/// Configuration for an [`Agent`].
#[derive(Copy, Clone, Debug)]
pub struct Options<'a> {
    /// The anchors image-signing chains must end in.
    pub anchors: TrustAnchors<'a>,
    /// Options for verifying image-signing chains.
    pub chain: chain::Options,
    /// The LMS parameter sets image signatures may use.
    pub lms_policy: lms::Policy,
    /// The timeout passed to every storage operation.
    pub storage_timeout: Duration,
    /// How many times a failed installation is retried.
    pub storage_retries: u32,
    /// The largest write passed to [`Storage::write()`].
    pub write_chunk: usize,
    /// Whether an image may replace a newer (or the same) version.
    pub allow_downgrade: bool,
}

impl<'a> Options<'a> {
    /// Creates options with reasonable defaults, trusting `anchors`.
    pub fn new(anchors: TrustAnchors<'a>) -> Self {
        Self {
            anchors,
            chain: chain::Options::default(),
            lms_policy: lms::Policy::default(),
            storage_timeout: Duration::from_secs(5),
            storage_retries: 2,
            write_chunk: 4096,
            allow_downgrade: false,
        }
    }
}

/// The result of trying to update one component.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The new image was installed.
    Installed {
        /// The version that was installed.
        version: u32,
    },
    /// The component was left alone; the error says why.
    Skipped(Error),
    /// The update failed.
    Failed(Error),
}

/// The outcome of [`Agent::update_all()`], in component order.
#[derive(Clone, Debug, Default)]
pub struct Report {
    outcomes: ArrayVec<(u32, Outcome), MAX_COMPONENTS>,
}

impl Report {
    /// Returns each component's id and outcome.
    pub fn outcomes(&self) -> &[(u32, Outcome)] {
        &self.outcomes
    }

    /// Returns the outcome for the component `id`.
    pub fn outcome(&self, id: u32) -> Option<Outcome> {
        self.outcomes
            .iter()
            .find(|(i, _)| *i == id)
            .map(|&(_, outcome)| outcome)
    }

    /// Returns the number of components that were updated.
    pub fn installed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Installed { .. }))
    }

    /// Returns the number of components whose update failed.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    fn count(&self, f: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }
}

/// The trusted agent: tracks the platform's components and hands out update
/// [`Session`]s for them.
pub struct Agent<'a> {
    options: Options<'a>,
    state: State,
    components: ArrayVec<Component, MAX_COMPONENTS>,
}

impl<'a> Agent<'a> {
    /// Creates a new agent.
    pub fn new(options: Options<'a>) -> Self {
        Self {
            options,
            state: State::Idle,
            components: ArrayVec::new(),
        }
    }

    /// Returns the agent's state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the components found by the last query.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Queries `platform` for its components, replacing any previous
    /// result.
    pub fn query_components(
        &mut self,
        platform: &mut (impl Platform + ?Sized),
    ) -> Result<&[Component], Error> {
        let components = platform.components()?;
        self.components.clear();
        self.components
            .try_extend_from_slice(components)
            .map_err(|_| fail!(Error::TooManyComponents))?;

        info!(
            "fota: {:?} -> {:?}, {} components",
            self.state,
            State::ComponentsQueried,
            self.components.len()
        );
        self.state = State::ComponentsQueried;
        Ok(&self.components)
    }

    /// Starts an update session for `component`.
    ///
    /// Fails with [`Error::NoTarget`] if there is nothing to install, and
    /// with [`Error::Downgrade`] if the target is not newer than the current
    /// version (unless [`Options::allow_downgrade`] is set).
    pub fn session<'b>(
        &self,
        component: &Component,
    ) -> Result<Session<'a, 'b>, Error> {
        check!(self.state == State::ComponentsQueried, Error::BadState);
        check!(self.components.contains(component), Error::UnknownComponent);

        let target = component.target.ok_or_else(|| fail!(Error::NoTarget))?;
        check!(
            self.options.allow_downgrade || target.version > component.version,
            Error::Downgrade
        );

        Ok(Session {
            options: self.options,
            component: *component,
            target,
            state: State::ComponentsQueried,
            fetched: &[],
            image: None,
        })
    }

    /// Updates every component the platform reports.
    ///
    /// Components are handled one after another; a failure only affects the
    /// component it occurred on. `buf` holds each image while it is
    /// verified and installed.
    ///
    /// Only a failure to query the platform is returned as an error.
    pub fn update_all<H: hash::Engine + ?Sized>(
        &mut self,
        platform: &mut (impl Platform + ?Sized),
        source: &mut (impl ImageSource + ?Sized),
        storage: &mut (impl Storage + ?Sized),
        ciphers: &mut impl sig::Ciphers,
        hashes: &mut H,
        buf: &mut [u8],
    ) -> Result<Report, Error> {
        self.query_components(platform)?;

        let mut report = Report::default();
        for component in self.components.clone() {
            let outcome = self.update_one(
                &component, source, storage, ciphers, hashes, buf,
            );
            report.outcomes.push((component.id, outcome));
        }
        info!(
            "fota: {} installed, {} failed",
            report.installed(),
            report.failed()
        );
        Ok(report)
    }

    fn update_one<H: hash::Engine + ?Sized>(
        &self,
        component: &Component,
        source: &mut (impl ImageSource + ?Sized),
        storage: &mut (impl Storage + ?Sized),
        ciphers: &mut impl sig::Ciphers,
        hashes: &mut H,
        buf: &mut [u8],
    ) -> Outcome {
        let mut session = match self.session(component) {
            Ok(session) => session,
            Err(e @ Error::NoTarget) | Err(e @ Error::Downgrade) => {
                return Outcome::Skipped(e)
            }
            Err(e) => return Outcome::Failed(e),
        };

        let result = session
            .fetch(source, buf)
            .and_then(|_| session.verify(ciphers, hashes))
            .and_then(|_| session.install(storage));
        match result {
            Ok(()) => Outcome::Installed {
                version: session.target.version,
            },
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// An update of a single component.
///
/// `'b` is the lifetime of the buffer the image is fetched into.
pub struct Session<'a, 'b> {
    options: Options<'a>,
    component: Component,
    target: Target,
    state: State,
    fetched: &'b [u8],
    image: Option<Image<'b>>,
}

impl<'a, 'b> Session<'a, 'b> {
    /// Returns the session's state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the component being updated.
    pub fn component(&self) -> &Component {
        &self.component
    }

    /// Returns the verified image, once [`Session::verify()`] succeeds.
    pub fn image(&self) -> Option<&Image<'b>> {
        self.image.as_ref()
    }

    /// Fetches the target image from `source` into `buf`.
    pub fn fetch(
        &mut self,
        source: &mut (impl ImageSource + ?Sized),
        buf: &'b mut [u8],
    ) -> Result<(), Error> {
        self.expect(State::ComponentsQueried)?;
        match fetch_image(&self.component, &self.target, source, buf) {
            Ok(bytes) => {
                self.fetched = bytes;
                self.transition(State::ImageFetched);
                Ok(())
            }
            Err(e) => Err(self.failed(e)),
        }
    }

    /// Verifies the fetched image's certificate chain and signature.
    pub fn verify<H: hash::Engine + ?Sized>(
        &mut self,
        ciphers: &mut impl sig::Ciphers,
        hashes: &mut H,
    ) -> Result<(), Error> {
        self.expect(State::ImageFetched)?;
        let result = verify_image(
            &self.options,
            &self.component,
            &self.target,
            self.fetched,
            ciphers,
            hashes,
        );
        match result {
            Ok(image) => {
                self.image = Some(image);
                self.transition(State::SignatureVerified);
                Ok(())
            }
            Err(e) => Err(self.failed(e)),
        }
    }

    /// Writes the verified payload to `storage`.
    ///
    /// If any storage operation fails, the open handle is aborted and the
    /// whole installation starts over, up to [`Options::storage_retries`]
    /// more times.
    pub fn install(
        &mut self,
        storage: &mut (impl Storage + ?Sized),
    ) -> Result<(), Error> {
        self.expect(State::SignatureVerified)?;
        let image = match self.image {
            Some(image) => image,
            None => return Err(fail!(Error::BadState)),
        };
        self.transition(State::Installing);

        let mut attempt = 0;
        loop {
            match install_image(&self.options, &image, storage) {
                Ok(()) => {
                    self.transition(State::Installed);
                    return Ok(());
                }
                Err(e) if attempt >= self.options.storage_retries => {
                    return Err(self.failed(e.into()));
                }
                Err(e) => {
                    attempt += 1;
                    warn!(
                        "fota: component {}: storage failed with {:?}; retry {} of {}",
                        self.component.id,
                        e,
                        attempt,
                        self.options.storage_retries
                    );
                }
            }
        }
    }

    /// Abandons this session, returning the state it ended in.
    ///
    /// [`Session::install()`] never leaves a storage handle open, so this
    /// has no side effects.
    pub fn cancel(self) -> State {
        info!(
            "fota: component {}: cancelled in {:?}",
            self.component.id, self.state
        );
        self.state
    }

    fn expect(&self, state: State) -> Result<(), Error> {
        check!(self.state == state, Error::BadState);
        Ok(())
    }

    fn transition(&mut self, to: State) {
        info!(
            "fota: component {}: {:?} -> {:?}",
            self.component.id, self.state, to
        );
        self.state = to;
    }

    fn failed(&mut self, e: Error) -> Error {
        self.transition(State::Failed);
        e
    }
}

fn fetch_image<'b>(
    component: &Component,
    target: &Target,
    source: &mut (impl ImageSource + ?Sized),
    buf: &'b mut [u8],
) -> Result<&'b [u8], Error> {
    let len = source.image_len(component)?;
    check!(len <= target.max_size, Error::TooLarge);
    let out = buf
        .get_mut(..len as usize)
        .ok_or_else(|| fail!(Error::TooLarge))?;
    source.read(component, 0, out)?;
    Ok(&*out)
}

fn verify_image<'b, H: hash::Engine + ?Sized>(
    options: &Options,
    component: &Component,
    target: &Target,
    bytes: &'b [u8],
    ciphers: &mut impl sig::Ciphers,
    hashes: &mut H,
) -> Result<Image<'b>, Error> {
    let image = Image::parse(bytes)?;
    let header = image.header();
    check!(header.component_id == component.id, Error::BadImage);
    check!(header.image_version == target.version, Error::BadImage);

    let certs = image.certs::<MAX_CHAIN_CERTS>()?;
    let (leaf, intermediates) = match certs.split_first() {
        Some(split) => split,
        None => return Err(fail!(Error::BadImage)),
    };
    chain::verify(
        leaf,
        intermediates,
        &options.anchors,
        &options.chain,
        ciphers,
    )?;

    // The leaf must be explicitly allowed to sign.
    let key = match leaf.subject_key() {
        sig::PublicKeyParams::Hss { key } => *key,
        _ => return Err(fail!(Error::UntrustedKey)),
    };
    check!(
        leaf.key_usage()
            .map_or(false, |u| u.contains(KeyUsage::DigitalSignature)),
        Error::UntrustedKey
    );

    let key = hss::PublicKey::parse(key)?;
    let sig = hss::Signature::parse(image.signature())?;
    hss::verify(
        hashes,
        &options.lms_policy,
        &key,
        &[image.signed_bytes()],
        &sig,
    )?;
    Ok(image)
}

fn install_image(
    options: &Options,
    image: &Image,
    storage: &mut (impl Storage + ?Sized),
) -> Result<(), storage::Error> {
    let timeout = options.storage_timeout;
    let handle = storage.open(image.header(), timeout)?;
    let result = write_payload(options, image.payload(), storage, handle)
        .and_then(|_| storage.commit(handle, timeout));
    if result.is_err() && storage.abort(handle).is_err() {
        warn!("fota: could not abort {:?}", handle);
    }
    result
}

fn write_payload(
    options: &Options,
    payload: &[u8],
    storage: &mut (impl Storage + ?Sized),
    handle: storage::Handle,
) -> Result<(), storage::Error> {
    let chunk = options.write_chunk.max(1);
    for (i, bytes) in payload.chunks(chunk).enumerate() {
        let offset = (i * chunk) as u32;
        storage.write(handle, offset, bytes, options.storage_timeout)?;
    }
    Ok(())
}
