// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! I/O and argument-parsing utilities.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;

/// Like `?`, but crashes the binary with a nice error message.
macro_rules! check {
    ($result:expr, $fmt:literal $(, $args:expr)* $(,)?) => {
        match $result {
            Ok(x) => x,
            Err(e) => {
                eprintln!("error: {}: {:?}", format_args!($fmt, $($args,)*), e);
                std::process::exit(2)
            }
        }
    }
}

/// Opens the given input and output files.
///
/// If either file is missing, it is replaced with stdin or stdout, respectively.
pub fn stdio(
    input_file: Option<impl AsRef<Path>>,
    output_file: Option<impl AsRef<Path>>,
) -> (Box<dyn Read>, Box<dyn Write>) {
    let input: Box<dyn Read> = match input_file {
        Some(path) => {
            let file = check!(File::open(path), "failed to open input file");
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin()),
    };

    let output: Box<dyn Write> = match output_file {
        Some(path) => {
            let file = check!(File::create(path), "failed to open output file");
            Box::new(file)
        }
        None => Box::new(io::stdout()),
    };

    (input, output)
}

/// Reads all of `r`.
pub fn read_all(mut r: impl Read) -> Vec<u8> {
    let mut buf = Vec::new();
    check!(r.read_to_end(&mut buf), "failed to read input");
    buf
}

/// Parses a unit enum by its serialized variant name, e.g. `Sha256M32H10`.
pub fn parse_variant<T: DeserializeOwned>(
    s: &str,
) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
}

/// Parses a hex string.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err(format!("odd-length hex string: {}", s));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .and_then(|b| u8::from_str_radix(b, 16).ok())
                .ok_or_else(|| format!("bad hex string: {}", s))
        })
        .collect()
}

/// Parses a number, in decimal or `0x`-prefixed hex.
pub fn parse_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
}
