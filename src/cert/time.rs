// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Certificate validity times.

use core::convert::TryFrom as _;

use crate::cert::der;
use crate::cert::der::Tag;
use crate::cert::Error;

/// A UTC calendar time, with one-second resolution.
///
/// `Time`s are totally ordered chronologically.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Time {
    // Field order matters for the derived `Ord`.
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

fn is_leap(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap(year) => 29,
        2 => 28,
        _ => 31,
    }
}

impl Time {
    /// Creates a new time, returning `None` if any field is out of range.
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Option<Self> {
        if !(1..=12).contains(&month)
            || day == 0
            || day > days_in_month(year, month)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Converts seconds since the Unix epoch into a calendar time.
    ///
    /// Returns `None` past the year 65535.
    pub fn from_unix_secs(secs: u64) -> Option<Self> {
        let days = secs / 86400;
        let rem = secs % 86400;

        // Howard Hinnant's `civil_from_days`, restricted to non-negative
        // inputs.
        let z = days + 719468;
        let era = z / 146097;
        let doe = z % 146097;
        let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
        let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
        let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };

        Self::new(
            u16::try_from(year).ok()?,
            month,
            day,
            (rem / 3600) as u8,
            (rem / 60 % 60) as u8,
            (rem % 60) as u8,
        )
    }

    /// Returns the year.
    pub fn year(&self) -> u16 {
        self.year
    }

    /// Parses an X.509 `Time`: either a `UTCTime` or a `GeneralizedTime`,
    /// both of which must be in UTC and carry seconds.
    pub(crate) fn parse(buf: &mut untrusted::Reader) -> Result<Self, Error> {
        if let Some(utc) = der::opt(Tag::UTC_TIME, buf)? {
            return utc.read_all(Error::LengthMismatch, |buf| {
                let yy = digits(buf, 2)?;
                // RFC 5280 section 4.1.2.5.1.
                let year = if yy >= 50 { 1900 + yy } else { 2000 + yy };
                parse_rest(year, buf)
            });
        }

        der::tagged(Tag::GENERALIZED_TIME, buf, |buf| {
            let year = digits(buf, 4)?;
            parse_rest(year, buf)
        })
    }
}

/// Parses `count` ASCII decimal digits.
fn digits(buf: &mut untrusted::Reader, count: usize) -> Result<u16, Error> {
    let mut val = 0;
    for _ in 0..count {
        let b = buf.read_byte()?;
        check!(b.is_ascii_digit(), Error::InvalidData);
        val = val * 10 + (b - b'0') as u16;
    }
    Ok(val)
}

/// Parses `MMDDHHMMSSZ`.
fn parse_rest(year: u16, buf: &mut untrusted::Reader) -> Result<Time, Error> {
    let month = digits(buf, 2)? as u8;
    let day = digits(buf, 2)? as u8;
    let hour = digits(buf, 2)? as u8;
    let minute = digits(buf, 2)? as u8;
    let second = digits(buf, 2)? as u8;
    check!(buf.read_byte()? == b'Z', Error::InvalidData);
    Time::new(year, month, day, hour, minute, second)
        .ok_or_else(|| fail!(Error::InvalidData))
}
