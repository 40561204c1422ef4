// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable interface types for suitemill.
//!
//! This crate holds the stable pieces of suitemill's output: documented exit codes and the
//! serializable summary printed for `suitemill run --dry-run --message-format json`.

mod exit_codes;
mod selection;

pub use exit_codes::*;
pub use selection::*;
