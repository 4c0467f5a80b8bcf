// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! LM-OTS, the one-time signatures at the leaves of an LMS tree.

use crate::crypto::hash;
use crate::crypto::hash::EngineExt as _;
use crate::crypto::lms::sha256;
use crate::crypto::lms::Error;
use crate::crypto::lms::Node;
use crate::crypto::lms::OtsType;
use crate::crypto::lms::D_MESG;
use crate::crypto::lms::D_PBLC;
use crate::crypto::lms::ID_LEN;
use crate::crypto::lms::MAX_HASH_LEN;
use crate::crypto::lms::MAX_P;

/// A message digest followed by its two-byte checksum.
pub(super) type Digest = [u8; MAX_HASH_LEN + 2];

/// Extracts the `i`th `w`-bit digit of `s`, most significant first.
fn coef(s: &[u8], i: usize, w: u8) -> u8 {
    let w = w as usize;
    let digits_per_byte = 8 / w;
    let byte = s[i / digits_per_byte];
    let shift = 8 - w * (i % digits_per_byte + 1);
    let mask = ((1u16 << w) - 1) as u8;
    (byte >> shift) & mask
}

/// Computes `Q || Cksm(Q)`, where `Q` is the randomized digest of
/// `message`. Only the first `n + 2` bytes of the result are meaningful.
///
/// The digits of this value select how far along each hash chain the
/// signature sits.
pub(super) fn message_digest<H: hash::Engine + ?Sized>(
    hashes: &mut H,
    ots: OtsType,
    id: &[u8; ID_LEN],
    q: u32,
    c: &[u8],
    message: &[&[u8]],
) -> Result<Digest, Error> {
    let params = ots.params();
    let mut q_hash = [0; MAX_HASH_LEN];
    let mut h = hashes.new_hash(hash::Algo::Sha256)?;
    h.write_all(&[id, &q.to_be_bytes(), &D_MESG.to_be_bytes(), c])?;
    h.write_all(message)?;
    h.finish(&mut q_hash)?;

    let n = params.n;
    let max = (1u16 << params.w) - 1;
    let u = 8 * n / params.w as usize;
    let sum = (0..u)
        .map(|i| max - coef(&q_hash[..n], i, params.w) as u16)
        .sum::<u16>();

    let mut digest = [0; MAX_HASH_LEN + 2];
    digest[..n].copy_from_slice(&q_hash[..n]);
    digest[n..n + 2].copy_from_slice(&(sum << params.ls).to_be_bytes());
    Ok(digest)
}

/// Returns the `i`th digit of a digest produced by [`message_digest()`].
pub(super) fn digit(digest: &Digest, ots: OtsType, i: usize) -> u8 {
    coef(&digest[..ots.n() + 2], i, ots.w())
}

/// Advances the `i`th hash chain from step `from` up to (not including)
/// step `to`, starting from `start`.
#[allow(clippy::too_many_arguments)]
pub(super) fn chain<H: hash::Engine + ?Sized>(
    hashes: &mut H,
    n: usize,
    id: &[u8; ID_LEN],
    q: u32,
    i: u16,
    from: u8,
    to: u8,
    start: &[u8],
) -> Result<Node, Error> {
    let mut tmp = [0; MAX_HASH_LEN];
    tmp[..n].copy_from_slice(&start[..n]);
    let q = q.to_be_bytes();
    let i = i.to_be_bytes();
    for j in from..to {
        tmp = sha256(hashes, &[id, &q, &i, &[j], &tmp[..n]])?;
    }
    Ok(tmp)
}

/// Hashes the chain ends `z` into an LM-OTS public key.
pub(super) fn public_key<H: hash::Engine + ?Sized>(
    hashes: &mut H,
    n: usize,
    id: &[u8; ID_LEN],
    q: u32,
    z: &[Node],
) -> Result<Node, Error> {
    let mut out = [0; MAX_HASH_LEN];
    let mut h = hashes.new_hash(hash::Algo::Sha256)?;
    h.write_all(&[id, &q.to_be_bytes(), &D_PBLC.to_be_bytes()])?;
    for node in z {
        h.write(&node[..n])?;
    }
    h.finish(&mut out)?;
    Ok(out)
}

/// Computes the candidate LM-OTS public key `Kc` from a signature
/// `(c, y)` over `message` (RFC 8554 algorithm 4b).
///
/// `y` must consist of exactly `p` values of `n` bytes each.
pub(super) fn candidate_key<H: hash::Engine + ?Sized>(
    hashes: &mut H,
    ots: OtsType,
    id: &[u8; ID_LEN],
    q: u32,
    message: &[&[u8]],
    c: &[u8],
    y: &[u8],
) -> Result<Node, Error> {
    let params = ots.params();
    let n = params.n;
    check!(y.len() == n * params.p, Error::BadInput);

    let digest = message_digest(hashes, ots, id, q, c, message)?;
    let end = ((1u16 << params.w) - 1) as u8;

    // The engine can only hold one hash at a time, so the chain ends are
    // collected before the final hash.
    let mut z = [[0; MAX_HASH_LEN]; MAX_P];
    for (i, (y_i, z_i)) in y.chunks_exact(n).zip(z.iter_mut()).enumerate() {
        let a = digit(&digest, ots, i);
        *z_i = chain(hashes, n, id, q, i as u16, a, end, y_i)?;
    }
    public_key(hashes, n, id, q, &z[..params.p])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::ring::hash::Engine;

    #[test]
    fn coefficients() {
        // RFC 8554 section 3.1.3.
        let s = [0x12, 0x34];
        assert_eq!(coef(&s, 7, 1), 0);
        assert_eq!(coef(&s, 0, 4), 1);
        assert_eq!(coef(&s, 3, 4), 4);
        assert_eq!(coef(&s, 1, 2), 1);
        assert_eq!(coef(&s, 1, 8), 0x34);
    }

    #[test]
    fn message_digest_m24() {
        let mut id = [0; ID_LEN];
        id.copy_from_slice(&testutil::hex("6628e95a7ea6a1496b39721c79391c7b"));
        let c = testutil::hex("6cc9a95d82ced6addf8ab296c056738b9dd5b637c416d4d8");

        let digest = message_digest(
            &mut Engine::new(),
            OtsType::Sha256N24W4,
            &id,
            0,
            &c,
            &[b"this is the message I want signed"],
        )
        .unwrap();
        assert_eq!(
            &digest[..24],
            &testutil::hex("afa009471d1a3d145ad98e98704433119abf4a96a1ee66a1")[..]
        );
    }
}
