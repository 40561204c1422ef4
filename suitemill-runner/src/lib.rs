// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for suitemill.
//!
//! The basic flow of a run is:
//!
//! 1. Units are discovered from a [manifest](manifest::UnitManifest) into a
//!    [`MetadataStore`](unit::MetadataStore).
//! 2. A [`UnitFilter`](test_filter::UnitFilter) selects the units to run.
//! 3. A [`TestRunner`](runner::TestRunner) runs them on a pool of workers through a
//!    [`TestRuntime`](runtime::TestRuntime), recording outcomes into per-suite reports.
//! 4. Reports are read back as a [`ResultSet`](results::ResultSet) to produce a
//!    [`RunSummary`](summary::RunSummary), or [diffed](diff::diff) against a rerun.

pub mod config;
pub mod diff;
pub mod errors;
pub mod manifest;
pub mod ownership;
pub mod reporter;
pub mod results;
pub mod runner;
pub mod runtime;
mod stopwatch;
pub mod summary;
pub mod test_filter;
pub mod unit;
