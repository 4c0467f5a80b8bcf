// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! LMS key management commands.

use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use trustagent::crypto::lms::sign::PrivateKey;
use trustagent::crypto::lms::LmsType;
use trustagent::crypto::lms::OtsType;
use trustagent::crypto::lms::ID_LEN;
use trustagent::crypto::csrng::Csrng as _;
use trustagent::crypto::ring::csrng;
use trustagent::crypto::ring::hash;

use crate::util;

/// Commands for creating and using LMS signing keys.
///
/// Keys are stored as JSON. A key file is rewritten every time it signs
/// something; never sign with a stale copy of it.
#[derive(structopt::StructOpt)]
#[structopt(author)]
pub enum Lms {
    /// Generate a new LMS private key.
    LmsKeygen {
        /// The LMS parameter set, e.g. `Sha256M32H10`.
        #[structopt(long, parse(try_from_str = util::parse_variant))]
        lms_type: LmsType,

        /// The LM-OTS parameter set, e.g. `Sha256N32W4`.
        #[structopt(long, parse(try_from_str = util::parse_variant))]
        ots_type: OtsType,

        /// The secret seed, as hex; random if omitted.
        #[structopt(long)]
        seed: Option<String>,

        /// The 16-byte key identifier, as hex; random if omitted.
        #[structopt(long)]
        id: Option<String>,

        /// Output file, defaults to stdout.
        #[structopt(short = "o", long, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    /// Write out the single-level HSS public key of an LMS private key.
    ExportLmsPublic {
        /// The private key file.
        #[structopt(long, parse(from_os_str))]
        key: PathBuf,

        /// Output file, defaults to stdout.
        #[structopt(short = "o", long, parse(from_os_str))]
        output: Option<PathBuf>,
    },
}

impl Lms {
    pub fn run(self) {
        match self {
            Self::LmsKeygen {
                lms_type,
                ots_type,
                seed,
                id,
                output,
            } => {
                let mut rng = csrng::Csrng::new();
                let seed = seed.map(|s| check!(util::parse_hex(&s), "bad seed"));
                let id = id.map(|s| check!(util::parse_hex(&s), "bad key id"));
                let key = match (seed, id) {
                    (None, None) => check!(
                        PrivateKey::generate(lms_type, ots_type, &mut rng),
                        "failed to generate key"
                    ),
                    (seed, id) => {
                        let seed = seed.unwrap_or_else(|| {
                            let mut seed = vec![0; ots_type.n()];
                            check!(rng.fill(&mut seed), "failed to generate seed");
                            seed
                        });
                        let mut key_id = [0; ID_LEN];
                        match id {
                            Some(id) if id.len() == ID_LEN => {
                                key_id.copy_from_slice(&id)
                            }
                            Some(id) => check!(
                                Err(format!(
                                    "expected {} bytes, got {}",
                                    ID_LEN,
                                    id.len()
                                )),
                                "bad key id"
                            ),
                            None => check!(
                                rng.fill(&mut key_id),
                                "failed to generate id"
                            ),
                        }
                        check!(
                            PrivateKey::new(lms_type, ots_type, key_id, &seed),
                            "incompatible key parameters"
                        )
                    }
                };

                let (_, mut w) = util::stdio(None::<&Path>, output.as_deref());
                let json = check!(
                    serde_json::to_vec_pretty(&key),
                    "failed to serialize key"
                );
                check!(w.write_all(&json), "failed to write key");
            }

            Self::ExportLmsPublic { key, output } => {
                let mut key = load_key(&key);
                let mut hashes = hash::Engine::new();
                let public = check!(
                    key.hss_public_key(&mut hashes),
                    "failed to compute public key"
                );

                let (_, mut w) = util::stdio(None::<&Path>, output.as_deref());
                check!(w.write_all(&public.to_bytes()), "failed to write key");
            }
        }
    }
}

/// Loads a private key written by `lms-keygen`.
pub fn load_key(path: &Path) -> PrivateKey {
    let json = check!(fs::read(path), "failed to open {}", path.display());
    check!(serde_json::from_slice(&json), "failed to parse key")
}

/// Writes `key` back to `path`, replacing the old file only once the new
/// one is complete.
pub fn store_key(path: &Path, key: &PrivateKey) {
    let json = check!(serde_json::to_vec_pretty(key), "failed to serialize key");
    let tmp = path.with_extension("tmp");
    check!(fs::write(&tmp, &json), "failed to write {}", tmp.display());
    check!(fs::rename(&tmp, path), "failed to replace {}", path.display());
}
