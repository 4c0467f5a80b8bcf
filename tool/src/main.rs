// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `trustagent-tool` is a simple command-line tool for producing and
//! inspecting signed `trustagent` firmware images.

#![deny(missing_docs)]
#![deny(warnings)]
#![deny(unused)]
#![deny(unsafe_code)]

use structopt::StructOpt as _;

#[macro_use]
mod util;

mod image;
mod lms;

/// A command-line tool for working with trustagent images.
#[allow(missing_docs)]
#[derive(structopt::StructOpt)]
#[structopt(author)]
enum CliCommand {
    #[structopt(flatten)]
    Lms(lms::Lms),
    #[structopt(flatten)]
    Image(image::Image),
}

fn main() {
    env_logger::init();
    match CliCommand::from_args() {
        CliCommand::Lms(l) => l.run(),
        CliCommand::Image(i) => i.run(),
    }
}
