// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Firmware image commands.

use std::convert::TryFrom as _;
use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use serde_json::json;

use trustagent::cert::Anchor;
use trustagent::cert::Cert;
use trustagent::cert::Time;
use trustagent::cert::TrustAnchors;
use trustagent::crypto::lms::hss;
use trustagent::crypto::ring;
use trustagent::fota;
use trustagent::fota::image;
use trustagent::fota::Component;
use trustagent::fota::Target;

use crate::lms;
use crate::util;

/// Commands for signing and checking firmware images.
#[derive(structopt::StructOpt)]
#[structopt(author)]
pub enum Image {
    /// Wrap a payload in a signed image.
    ///
    /// The key file is updated before the image is written.
    SignImage {
        /// The LMS private key to sign with.
        #[structopt(long, parse(from_os_str))]
        key: PathBuf,

        /// The component the image is for.
        #[structopt(long, parse(try_from_str = util::parse_u32))]
        component: u32,

        /// The version of the image.
        #[structopt(long, parse(try_from_str = util::parse_u32))]
        version: u32,

        /// DER certificates to embed, leaf first. The leaf must certify the
        /// public key of `--key`.
        #[structopt(long, parse(from_os_str))]
        chain: Vec<PathBuf>,

        /// Input payload, defaults to stdin.
        #[structopt(short = "i", long, parse(from_os_str))]
        input: Option<PathBuf>,

        /// Output file, defaults to stdout.
        #[structopt(short = "o", long, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    /// Describe an image as JSON, without verifying it.
    ShowImage {
        /// Whether to pretty-print the resulting JSON.
        #[structopt(long)]
        pretty: bool,

        /// Input file, defaults to stdin.
        #[structopt(short = "i", long, parse(from_os_str))]
        input: Option<PathBuf>,

        /// Output file, defaults to stdout.
        #[structopt(short = "o", long, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    /// Verify an image exactly as the update agent would.
    VerifyImage {
        /// DER certificates to trust; may be repeated.
        #[structopt(long, parse(from_os_str))]
        anchor: Vec<PathBuf>,

        /// The current time, in seconds since the Unix epoch; validity
        /// periods are ignored if omitted.
        #[structopt(long)]
        now: Option<u64>,

        /// Input file, defaults to stdin.
        #[structopt(short = "i", long, parse(from_os_str))]
        input: Option<PathBuf>,
    },
}

impl Image {
    pub fn run(self) {
        match self {
            Self::SignImage {
                key: key_path,
                component,
                version,
                chain,
                input,
                output,
            } => {
                let (r, mut w) =
                    util::stdio(input.as_deref(), output.as_deref());
                let payload = util::read_all(r);
                let chain = chain
                    .iter()
                    .map(|path| {
                        check!(fs::read(path), "failed to open {}", path.display())
                    })
                    .collect::<Vec<_>>();
                let chain = chain.iter().map(Vec::as_slice).collect::<Vec<_>>();

                let mut key = lms::load_key(&key_path);
                let builder = check!(
                    image::Builder::new(
                        component,
                        version,
                        &payload,
                        &chain,
                        key.hss_signature_len(),
                    ),
                    "failed to lay out image"
                );

                let mut hashes = ring::hash::Engine::new();
                let sig = check!(
                    key.sign_hss(&mut hashes, &[builder.signed_bytes()]),
                    "failed to sign image"
                );
                lms::store_key(&key_path, &key);

                let image = check!(builder.finish(&sig), "failed to finish image");
                check!(w.write_all(&image), "failed to write image");
            }

            Self::ShowImage {
                pretty,
                input,
                output,
            } => {
                let (r, w) = util::stdio(input.as_deref(), output.as_deref());
                let bytes = util::read_all(r);
                let image =
                    check!(image::Image::parse(&bytes), "failed to parse image");
                let certs = check!(
                    image.certs::<{ fota::MAX_CHAIN_CERTS }>(),
                    "failed to parse chain"
                );
                let sig = check!(
                    hss::Signature::parse(image.signature()),
                    "failed to parse signature"
                );

                let desc = json!({
                    "header": image.header(),
                    "chain": certs.iter().map(describe_cert).collect::<Vec<_>>(),
                    "signature": {
                        "levels": sig.levels(),
                        "leaf_index": sig.message_signature().leaf_index(),
                        "lms_type": sig.message_signature().lms_type(),
                        "ots_type": sig.message_signature().ots_type(),
                    },
                });
                let r = match pretty {
                    true => serde_json::to_writer_pretty(w, &desc),
                    false => serde_json::to_writer(w, &desc),
                };
                check!(r, "failed to serialize image");
            }

            Self::VerifyImage { anchor, now, input } => {
                let ders = anchor
                    .iter()
                    .map(|path| {
                        check!(fs::read(path), "failed to open {}", path.display())
                    })
                    .collect::<Vec<_>>();
                let anchors = ders
                    .iter()
                    .map(|der| {
                        let cert = check!(Cert::parse(der), "bad anchor");
                        Anchor::from_cert(&cert)
                    })
                    .collect::<Vec<_>>();

                let mut options = fota::Options::new(TrustAnchors::new(&anchors));
                options.allow_downgrade = true;
                options.chain.now = now.map(|secs| {
                    check!(
                        Time::from_unix_secs(secs).ok_or("out of range"),
                        "bad time"
                    )
                });

                let (r, _) = util::stdio(input.as_deref(), None::<PathBuf>);
                let bytes = util::read_all(r);
                let header = check!(
                    image::Header::parse(&bytes),
                    "failed to parse image header"
                );
                let mut single = Single {
                    components: [Component {
                        id: header.component_id,
                        version: 0,
                        target: Some(Target {
                            version: header.image_version,
                            max_size: check!(
                                u32::try_from(bytes.len()),
                                "image too large"
                            ),
                        }),
                    }],
                    image: bytes,
                };

                let mut agent = fota::Agent::new(options);
                check!(agent.query_components(&mut single), "no components");
                let component = single.components[0];
                let mut buf = vec![0; single.image.len()];
                let mut session =
                    check!(agent.session(&component), "cannot start session");
                check!(session.fetch(&mut single, &mut buf), "fetch failed");
                check!(
                    session.verify(
                        &mut ring::sig::Ciphers::new(),
                        &mut ring::hash::Engine::new()
                    ),
                    "verification failed"
                );
                eprintln!(
                    "ok: component {} version {}",
                    header.component_id, header.image_version
                );
            }
        }
    }
}

fn describe_cert(cert: &Cert) -> serde_json::Value {
    json!({
        "serial": hex(cert.serial()),
        "issuer": hex(cert.issuer().as_bytes()),
        "subject": hex(cert.subject().as_bytes()),
        "sig_algo": cert.sig_algo(),
        "not_before": cert.not_before(),
        "not_after": cert.not_after(),
        "is_ca": cert.is_ca_cert(),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A platform with one component, whose image is already in memory.
struct Single {
    components: [Component; 1],
    image: Vec<u8>,
}

impl fota::Platform for Single {
    fn components(&mut self) -> Result<&[Component], fota::Error> {
        Ok(&self.components)
    }
}

impl fota::ImageSource for Single {
    fn image_len(&mut self, _: &Component) -> Result<u32, fota::Error> {
        u32::try_from(self.image.len()).map_err(|_| fota::Error::Source)
    }

    fn read(
        &mut self,
        _: &Component,
        offset: u32,
        out: &mut [u8],
    ) -> Result<(), fota::Error> {
        let start = offset as usize;
        let bytes = self
            .image
            .get(start..start + out.len())
            .ok_or(fota::Error::Source)?;
        out.copy_from_slice(bytes);
        Ok(())
    }
}
