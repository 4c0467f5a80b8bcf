// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Logging and error-reporting macros.
//!
//! Without the `log` feature every macro here compiles to nothing, format
//! strings included, so a firmware build carries no trace of rejected
//! certificates or signatures. Code in this crate logs only through these
//! macros, never through [`log`] itself.

#[cfg(doc)]
use __raw_log as log;

/// Returns `Err($error.into())` from the enclosing function, logging the
/// failed condition, unless `$cond` holds.
macro_rules! check {
    ($cond:expr, $error:expr) => {
        if !$cond {
            let error = $error;
            error!(
                "check failure: `{}`; returned {:?}",
                stringify!($cond),
                error,
            );
            return Err(error.into());
        }
    };
}

/// Logs an error value as it is created and evaluates to it.
///
/// Errors are never built bare: `x.ok_or(Error::Foo)` is written
/// `x.ok_or_else(|| fail!(Error::Foo))` so that every rejection leaves a log
/// line.
macro_rules! fail {
    ($error:expr, $($format:tt)+) => {{
        error!($($format)+);
        $error
    }};
    ($error:expr) => {{
        let error = $error;
        error!("generated error: `{:?}`", error);
        error
    }};
}

/// Redactable version of [`log::trace!()`].
macro_rules! trace {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::trace!($($args)*);
    }
}

/// Redactable version of [`log::info!()`].
macro_rules! info {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::info!($($args)*);
    }
}

/// Redactable version of [`log::warn!()`].
macro_rules! warn {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::warn!($($args)*);
    }
}

/// Redactable version of [`log::error!()`].
macro_rules! error {
    ($($args:tt)*) => {
        #[cfg(feature = "log")]
        let _ = __raw_log::error!($($args)*);
    }
}

/// Routes the crate's log output through the test harness, so that only
/// failing tests show it.
#[cfg(test)]
#[ctor::ctor]
fn init_test_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .format(|_, record| {
            eprintln!(
                "[{} {}:{}] {}",
                record.level(),
                record.file().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args(),
            );
            Ok(())
        })
        .try_init();
}
