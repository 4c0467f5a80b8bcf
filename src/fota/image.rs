// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Signed firmware images.
//!
//! An image is a fixed header followed by three variable-length sections.
//! All integers are big-endian.
//!
//! ```text
//! offset size field
//! 0      4    magic            "TAFW"
//! 4      2    header_version   1
//! 6      2    flags            0 (reserved)
//! 8      4    component_id
//! 12     4    image_version
//! 16     4    payload_len
//! 20     4    chain_len
//! 24     4    signature_len
//! 28     ..   payload | chain | signature
//! ```
//!
//! The chain is a concatenation of DER certificates, leaf first. The
//! signature is an HSS signature over the header and the payload, i.e., the
//! first `28 + payload_len` bytes of the image.

use core::mem;

use arrayvec::ArrayVec;
use static_assertions::const_assert_eq;
use zerocopy::AsBytes;
use zerocopy::FromBytes;
use zerocopy::LayoutVerified;
use zerocopy::Unaligned;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cert;
use crate::cert::der;
use crate::cert::Cert;

/// The magic number at the start of every image.
pub const MAGIC: [u8; 4] = *b"TAFW";

/// The only supported header version.
pub const HEADER_VERSION: u16 = 1;

/// The length of the fixed header.
pub const HEADER_LEN: usize = 28;

/// The on-the-wire header.
#[derive(Clone, Copy, Debug, FromBytes, AsBytes, Unaligned)]
#[repr(C)]
struct RawHeader {
    magic: [u8; 4],
    header_version: [u8; 2],
    flags: [u8; 2],
    component_id: [u8; 4],
    image_version: [u8; 4],
    payload_len: [u8; 4],
    chain_len: [u8; 4],
    signature_len: [u8; 4],
}
const_assert_eq!(mem::size_of::<RawHeader>(), HEADER_LEN);

/// An image parsing error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The buffer was too short to hold a header.
    Truncated,
    /// The magic number was wrong.
    BadMagic,
    /// The header version is not [`HEADER_VERSION`].
    UnsupportedVersion,
    /// Reserved flag bits were set.
    ReservedFlags,
    /// The image length did not match the lengths in the header.
    LengthMismatch,
    /// A section was too large to be described by the header.
    TooLarge,
}

/// A decoded image header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Header {
    /// The component this image is for.
    pub component_id: u32,
    /// The version of the image.
    pub image_version: u32,
    /// The length of the payload, in bytes.
    pub payload_len: u32,
    /// The length of the certificate chain, in bytes.
    pub chain_len: u32,
    /// The length of the signature, in bytes.
    pub signature_len: u32,
}

impl Header {
    /// Parses a header from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let (raw, _) =
            LayoutVerified::<_, RawHeader>::new_unaligned_from_prefix(bytes)
                .ok_or_else(|| fail!(Error::Truncated))?;
        let raw = raw.into_ref();
        check!(raw.magic == MAGIC, Error::BadMagic);
        check!(
            u16::from_be_bytes(raw.header_version) == HEADER_VERSION,
            Error::UnsupportedVersion
        );
        check!(raw.flags == [0; 2], Error::ReservedFlags);

        Ok(Self {
            component_id: u32::from_be_bytes(raw.component_id),
            image_version: u32::from_be_bytes(raw.image_version),
            payload_len: u32::from_be_bytes(raw.payload_len),
            chain_len: u32::from_be_bytes(raw.chain_len),
            signature_len: u32::from_be_bytes(raw.signature_len),
        })
    }

    /// Returns the total length of the image this header describes.
    pub fn image_len(&self) -> u64 {
        HEADER_LEN as u64
            + self.payload_len as u64
            + self.chain_len as u64
            + self.signature_len as u64
    }

    /// Encodes this header.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let raw = RawHeader {
            magic: MAGIC,
            header_version: HEADER_VERSION.to_be_bytes(),
            flags: [0; 2],
            component_id: self.component_id.to_be_bytes(),
            image_version: self.image_version.to_be_bytes(),
            payload_len: self.payload_len.to_be_bytes(),
            chain_len: self.chain_len.to_be_bytes(),
            signature_len: self.signature_len.to_be_bytes(),
        };
        let mut out = [0; HEADER_LEN];
        out.copy_from_slice(raw.as_bytes());
        out
    }
}

/// A parsed image, borrowing from its encoding.
#[derive(Copy, Clone, Debug)]
pub struct Image<'a> {
    header: Header,
    signed: &'a [u8],
    chain: &'a [u8],
    signature: &'a [u8],
}

impl<'a> Image<'a> {
    /// Parses an image, which must span all of `bytes`.
    ///
    /// Neither the chain nor the signature are inspected.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let header = Header::parse(bytes)?;
        check!(
            bytes.len() as u64 == header.image_len(),
            Error::LengthMismatch
        );

        let (signed, rest) =
            bytes.split_at(HEADER_LEN + header.payload_len as usize);
        let (chain, signature) = rest.split_at(header.chain_len as usize);
        Ok(Self {
            header,
            signed,
            chain,
            signature,
        })
    }

    /// Returns the header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the bytes covered by the signature.
    pub fn signed_bytes(&self) -> &'a [u8] {
        self.signed
    }

    /// Returns the payload.
    pub fn payload(&self) -> &'a [u8] {
        &self.signed[HEADER_LEN..]
    }

    /// Returns the raw certificate chain.
    pub fn chain(&self) -> &'a [u8] {
        self.chain
    }

    /// Returns the raw signature.
    pub fn signature(&self) -> &'a [u8] {
        self.signature
    }

    /// Parses the certificate chain, leaf first.
    ///
    /// At most `N` certificates are accepted; any more is
    /// [`cert::Error::ChainTooLong`].
    pub fn certs<const N: usize>(
        &self,
    ) -> Result<ArrayVec<Cert<'a>, N>, cert::Error> {
        let mut certs = ArrayVec::new();
        let mut buf = untrusted::Reader::new(untrusted::Input::from(self.chain));
        while !buf.at_end() {
            let mark = buf.mark();
            der::any(&mut buf)?;
            let der = buf.get_input_between_marks(mark, buf.mark())?;
            let cert = Cert::parse(der.as_slice_less_safe())?;
            certs
                .try_push(cert)
                .map_err(|_| fail!(cert::Error::ChainTooLong))?;
        }
        Ok(certs)
    }
}

/// Assembles an image around a signature computed by the caller.
///
/// Because the header records the signature length, that length must be
/// known before signing.
#[cfg(feature = "std")]
pub struct Builder {
    signed: Vec<u8>,
    chain: Vec<u8>,
    signature_len: usize,
}

#[cfg(feature = "std")]
impl Builder {
    /// Lays out the header, payload and chain of a new image.
    pub fn new(
        component_id: u32,
        image_version: u32,
        payload: &[u8],
        chain: &[&[u8]],
        signature_len: usize,
    ) -> Result<Self, Error> {
        use core::convert::TryFrom as _;

        let chain = chain.concat();
        let len = |n: usize| u32::try_from(n).map_err(|_| fail!(Error::TooLarge));
        let header = Header {
            component_id,
            image_version,
            payload_len: len(payload.len())?,
            chain_len: len(chain.len())?,
            signature_len: len(signature_len)?,
        };

        let mut signed = Vec::with_capacity(HEADER_LEN + payload.len());
        signed.extend_from_slice(&header.to_bytes());
        signed.extend_from_slice(payload);
        Ok(Self {
            signed,
            chain,
            signature_len,
        })
    }

    /// Returns the bytes the signature must cover.
    pub fn signed_bytes(&self) -> &[u8] {
        &self.signed
    }

    /// Appends `signature`, which must have the length given to
    /// [`Builder::new()`], and returns the finished image.
    pub fn finish(self, signature: &[u8]) -> Result<Vec<u8>, Error> {
        check!(signature.len() == self.signature_len, Error::LengthMismatch);
        let mut image = self.signed;
        image.extend_from_slice(&self.chain);
        image.extend_from_slice(signature);
        Ok(image)
    }
}
