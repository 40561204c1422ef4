// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run summaries: `result_summary.log` and `bottom_line.log`.

use crate::{
    errors::WriteSummaryError,
    ownership::OwnershipMap,
    reporter::{OutcomeStatus, SuiteReport},
    results::ResultSet,
};
use camino::Utf8Path;
use swrite::{SWrite, swriteln};
use tracing::debug;

/// The file name of the detailed run summary.
pub const SUMMARY_FILE_NAME: &str = "result_summary.log";

/// The file name of the one-line run summary.
pub const BOTTOM_LINE_FILE_NAME: &str = "bottom_line.log";

/// Pass, fail and error counts across a run, along with the failing tests.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// The number of tests executed.
    pub total: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,

    /// The number of tests that errored.
    pub errored: usize,

    /// Identifiers (`classname:testname`) of failing tests: errors first, then failures.
    pub failing: Vec<String>,
}

impl RunSummary {
    /// Summarizes results read back from disk.
    pub fn from_results(results: &ResultSet) -> Self {
        let errors = results.identifiers(OutcomeStatus::Error);
        let failures = results.identifiers(OutcomeStatus::Fail);
        Self {
            total: results.total(),
            passed: results.total() - errors.len() - failures.len(),
            failed: failures.len(),
            errored: errors.len(),
            failing: errors.into_iter().chain(failures).collect(),
        }
    }

    /// Summarizes in-memory suite reports.
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a SuiteReport>) -> Self {
        let suites: Vec<_> = reports.into_iter().map(SuiteReport::to_testsuite).collect();
        Self::from_results(&ResultSet::from_suites(&suites))
    }

    /// Returns the number of tests that failed or errored.
    pub fn failing_count(&self) -> usize {
        self.failed + self.errored
    }

    /// Returns the percentage of tests that passed, rounded to two decimal places.
    ///
    /// A run with no tests has a pass percentage of 0.
    pub fn percent_passed(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.passed as f64 / self.total as f64 * 10_000.0).round() / 100.0
    }

    /// Returns the detailed summary.
    pub fn body(&self) -> String {
        let mut body = self.counts();
        if !self.failing.is_empty() {
            body.push_str("\nFailed/Errored Tests:\n");
            for id in &self.failing {
                swriteln!(body, "   {id}");
            }
        }
        body
    }

    /// Returns the detailed summary, with failing tests grouped by owning team.
    pub fn body_by_owner(&self, map: &OwnershipMap) -> String {
        let mut body = self.counts();
        if !self.failing.is_empty() {
            body.push_str("\nFailed/Errored Tests:\n");
            map.bucket(self.failing.iter().map(String::as_str))
                .render_to(&mut body);
        }
        body
    }

    /// Returns the one-line summary: `<failed>/<total> failed`.
    pub fn bottom_line(&self) -> String {
        format!("{}/{} failed", self.failing_count(), self.total)
    }

    /// Writes `result_summary.log` and `bottom_line.log` into the results directory.
    ///
    /// If an ownership map is provided, failing tests in the body are grouped by team.
    pub fn write_to(
        &self,
        results_dir: &Utf8Path,
        ownership: Option<&OwnershipMap>,
    ) -> Result<(), WriteSummaryError> {
        let body = match ownership {
            Some(map) => self.body_by_owner(map),
            None => self.body(),
        };
        write_summary_files(results_dir, &body, &self.bottom_line())
    }

    fn counts(&self) -> String {
        let mut out = String::new();
        swriteln!(out, "Tests Executed: {}", self.total);
        swriteln!(out, "Passed: {}", self.passed);
        swriteln!(out, "Failed: {}", self.failed);
        swriteln!(out, "Error: {}", self.errored);
        swriteln!(out, "{:.2}% Passed", self.percent_passed());
        out
    }
}

/// Writes a summary body and bottom line into the results directory.
pub(crate) fn write_summary_files(
    results_dir: &Utf8Path,
    body: &str,
    bottom_line: &str,
) -> Result<(), WriteSummaryError> {
    for (file_name, contents) in [
        (SUMMARY_FILE_NAME, body),
        (BOTTOM_LINE_FILE_NAME, bottom_line),
    ] {
        let path = results_dir.join(file_name);
        debug!("writing `{path}`");
        std::fs::write(&path, contents).map_err(|error| WriteSummaryError::new(path, error))?;
    }
    Ok(())
}
