// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Select, run and summarize grouped test suites in parallel.
//!
//! Units are discovered from a manifest, selected by group, priority and case identifier, and run
//! on a bounded pool of workers. Each unit's outcomes are persisted as a `TEST-<suite>.xml` report,
//! and every run ends with `result_summary.log` and `bottom_line.log` in the results directory.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, StderrStyles};
