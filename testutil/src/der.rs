// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! A tiny DER writer, for building test inputs by hand.
//!
//! Nothing here validates its input; callers can and do build invalid DER on
//! purpose.

/// Encodes a tag-length-value triple with a minimal length.
pub fn tlv(tag: u8, contents: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = contents.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = (len as u32).to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (4 - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(contents);
    out
}

/// Encodes a `SEQUENCE` of already-encoded elements.
pub fn seq(parts: &[&[u8]]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

/// Encodes a `SET` of already-encoded elements.
pub fn set(parts: &[&[u8]]) -> Vec<u8> {
    tlv(0x31, &parts.concat())
}

/// Encodes an explicitly-tagged, context-specific element.
pub fn explicit(number: u8, contents: &[u8]) -> Vec<u8> {
    tlv(0xa0 | number, contents)
}

/// Encodes a non-negative `INTEGER`.
pub fn uint(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    uint_bytes(&bytes[skip..])
}

/// Encodes a non-negative `INTEGER` from big-endian bytes, adding a leading
/// zero if needed.
pub fn uint_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.first().map_or(false, |b| b & 0x80 != 0) {
        tlv(0x02, &[&[0][..], bytes].concat())
    } else {
        tlv(0x02, bytes)
    }
}

/// Encodes a `BOOLEAN`.
pub fn boolean(value: bool) -> Vec<u8> {
    tlv(0x01, &[if value { 0xff } else { 0x00 }])
}

/// Encodes a `NULL`.
pub fn null() -> Vec<u8> {
    tlv(0x05, &[])
}

/// Encodes an `OCTET STRING`.
pub fn octets(bytes: &[u8]) -> Vec<u8> {
    tlv(0x04, bytes)
}

/// Encodes a `BIT STRING` with no unused bits.
pub fn bits(bytes: &[u8]) -> Vec<u8> {
    bits_with_unused(0, bytes)
}

/// Encodes a `BIT STRING` with `unused` trailing padding bits.
pub fn bits_with_unused(unused: u8, bytes: &[u8]) -> Vec<u8> {
    tlv(0x03, &[&[unused][..], bytes].concat())
}

/// Encodes an `OBJECT IDENTIFIER`.
pub fn oid(components: &[u32]) -> Vec<u8> {
    let mut body = vec![(components[0] * 40 + components[1]) as u8];
    for &c in &components[2..] {
        let mut enc = vec![(c & 0x7f) as u8];
        let mut c = c >> 7;
        while c != 0 {
            enc.push((c & 0x7f) as u8 | 0x80);
            c >>= 7;
        }
        enc.reverse();
        body.extend(enc);
    }
    tlv(0x06, &body)
}

/// Encodes a `UTCTime`, e.g. `"250101000000Z"`.
pub fn utc_time(time: &str) -> Vec<u8> {
    tlv(0x17, time.as_bytes())
}

/// Encodes a `GeneralizedTime`, e.g. `"20500101000000Z"`.
pub fn generalized_time(time: &str) -> Vec<u8> {
    tlv(0x18, time.as_bytes())
}

/// Encodes an X.501 `Name` with a single common name.
pub fn name(common_name: &str) -> Vec<u8> {
    let cn = seq(&[&oid(&[2, 5, 4, 3]), &tlv(0x0c, common_name.as_bytes())]);
    seq(&[&set(&[&cn])])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn long_lengths() {
        assert_eq!(tlv(0x04, &[0; 0x80])[..3], [0x04, 0x81, 0x80]);
        assert_eq!(tlv(0x04, &[0; 0x100])[..4], [0x04, 0x82, 0x01, 0x00]);
    }

    #[test]
    fn integers() {
        assert_eq!(uint(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(uint(0x80), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(uint(0x1234), vec![0x02, 0x02, 0x12, 0x34]);
    }

    #[test]
    fn oids() {
        assert_eq!(
            oid(&[1, 2, 840, 10045, 4, 3, 2]),
            vec![0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02]
        );
    }
}
