// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Querying persisted suite reports.
//!
//! A [`ResultSet`] is built from a results directory (every `TEST-*.xml` file in it) or from a
//! single report file. Tests are identified as `classname:testname`.

use crate::{errors::ReadResultsError, reporter::OutcomeStatus};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::{BTreeMap, BTreeSet};
use suitemill_xml::{NonSuccessKind, Testsuite};
use tracing::debug;

/// Failing test methods in a previous run, keyed by class name.
pub type FailedMethods = BTreeMap<String, BTreeSet<String>>;

/// A single test result read back from a report.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestRecord {
    /// The class the test belongs to.
    pub classname: String,

    /// The short name of the test.
    pub name: String,

    /// The path of the unit the test came from, if recorded.
    pub file_path: Option<Utf8PathBuf>,

    /// Whether the test passed, failed or errored.
    pub status: OutcomeStatus,
}

impl TestRecord {
    /// Returns the identifier for this test: `classname:testname`.
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.classname, self.name)
    }
}

/// Test results from one or more suite reports.
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    records: Vec<TestRecord>,
}

impl ResultSet {
    /// Reads results from a results directory or a single report file.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ReadResultsError> {
        if path.is_dir() {
            Self::from_dir(path)
        } else if path.is_file() {
            let suite = read_suite(path)?;
            Ok(Self::from_suites([&suite]))
        } else {
            Err(ReadResultsError::NotFound {
                path: path.to_owned(),
            })
        }
    }

    /// Builds a result set from in-memory suites.
    pub fn from_suites<'a>(suites: impl IntoIterator<Item = &'a Testsuite>) -> Self {
        let records = suites
            .into_iter()
            .flat_map(|suite| suite.testcases.iter())
            .map(|testcase| TestRecord {
                classname: testcase.classname.clone(),
                name: testcase.name.clone(),
                file_path: (!testcase.file_path.is_empty())
                    .then(|| Utf8PathBuf::from(&testcase.file_path)),
                status: match testcase.status.kind() {
                    None => OutcomeStatus::Pass,
                    Some(NonSuccessKind::Failure) => OutcomeStatus::Fail,
                    Some(NonSuccessKind::Error) => OutcomeStatus::Error,
                },
            })
            .collect();
        Self { records }
    }

    fn from_dir(dir: &Utf8Path) -> Result<Self, ReadResultsError> {
        let io_error = |error| ReadResultsError::Io {
            path: dir.to_owned(),
            error,
        };
        let mut report_paths = Vec::new();
        for entry in dir.read_dir_utf8().map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            if is_report_file_name(entry.file_name()) && entry.path().is_file() {
                report_paths.push(entry.into_path());
            }
        }
        // Directory iteration order isn't stable across platforms.
        report_paths.sort();
        debug!("reading {} suite reports from `{dir}`", report_paths.len());

        let suites = report_paths
            .iter()
            .map(|path| read_suite(path))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_suites(&suites))
    }

    /// Returns every test record, in report order.
    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    /// Returns the total number of tests.
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Returns the identifiers of tests with the given status.
    pub fn identifiers(&self, status: OutcomeStatus) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .map(TestRecord::identifier)
            .collect()
    }

    /// Returns the identifiers of tests that failed or errored.
    pub fn failing_identifiers(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .filter(|record| record.status.is_failing())
            .map(TestRecord::identifier)
            .collect()
    }

    /// Returns the class names with at least one failing or erroring test.
    pub fn failed_classes(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .filter(|record| record.status.is_failing())
            .map(|record| record.classname.clone())
            .collect()
    }

    /// Returns failing or erroring test methods, keyed by class name.
    pub fn failed_methods(&self) -> FailedMethods {
        let mut failed = FailedMethods::new();
        for record in self.records.iter().filter(|r| r.status.is_failing()) {
            failed
                .entry(record.classname.clone())
                .or_default()
                .insert(record.name.clone());
        }
        failed
    }
}

impl FromIterator<TestRecord> for ResultSet {
    fn from_iter<I: IntoIterator<Item = TestRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Returns true if this is the file name of a per-suite report: `TEST-*.xml`.
pub fn is_report_file_name(file_name: &str) -> bool {
    file_name.starts_with("TEST-") && file_name.ends_with(".xml")
}

fn read_suite(path: &Utf8Path) -> Result<Testsuite, ReadResultsError> {
    let contents = std::fs::read_to_string(path).map_err(|error| ReadResultsError::Io {
        path: path.to_owned(),
        error,
    })?;
    Testsuite::deserialize_str(&contents).map_err(|error| ReadResultsError::Parse {
        path: path.to_owned(),
        error,
    })
}
