// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generate and read suitemill per-suite reports.
//!
//! Each report is a single `<testsuite>` document, one per test unit, laid out so that Ant's
//! `junitreport` task and similar tools can consume it. The root element carries the suite name
//! and derived counts; each `<testcase>` carries ownership fields, and failing tests carry a
//! typed `<failure>` or `<error>` block. Raw text is stored in CDATA sections.

mod deserialize;
mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
