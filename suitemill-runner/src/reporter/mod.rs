// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collect test outcomes into suite reports, persist them, and display run progress.
//!
//! Runtimes report outcomes through the [`OutcomeSink`] trait. The main implementation is
//! [`SuiteRecorder`], which builds a [`SuiteReport`] for one unit and persists it through a
//! [`ReportWriter`].

mod displayer;
mod events;
mod recorder;
mod writer;

pub use displayer::*;
pub use events::*;
pub use recorder::*;
pub use writer::*;
