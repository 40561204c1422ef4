// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Records produced while units run.
//!
//! A [`TestOutcome`] is created once for every finished test method, and a [`SuiteReport`]
//! aggregates the outcomes for one unit. Counts are always derived from the outcomes.

use crate::{
    runner::{CrashedUnit, RunCompletion},
    unit::TestUnit,
};
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use itertools::Itertools;
use std::{fmt, time::Duration};
use suitemill_xml::{NonSuccessKind, Testcase, TestcaseStatus, Testsuite};

/// The terminal status of one test method.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum OutcomeStatus {
    /// The test passed.
    Pass,

    /// The test failed in an expected way, e.g. an assertion.
    Fail,

    /// The test failed in an unexpected way, e.g. an exception.
    Error,
}

impl OutcomeStatus {
    /// Returns true if the test failed or errored.
    pub fn is_failing(self) -> bool {
        !matches!(self, OutcomeStatus::Pass)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Pass => write!(f, "pass"),
            OutcomeStatus::Fail => write!(f, "fail"),
            OutcomeStatus::Error => write!(f, "error"),
        }
    }
}

/// Whether a fault is a failure or an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultKind {
    /// An expected failure, such as a failed assertion.
    Failure,

    /// An unexpected error, such as an uncaught exception.
    Error,
}

impl FaultKind {
    fn status(self) -> OutcomeStatus {
        match self {
            FaultKind::Failure => OutcomeStatus::Fail,
            FaultKind::Error => OutcomeStatus::Error,
        }
    }
}

/// A fault reported by a runtime for the open test.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Fault {
    /// Whether this is a failure or an error.
    pub kind: FaultKind,

    /// A short message.
    pub message: String,

    /// The type of the fault, e.g. an exception class.
    pub ty: Option<String>,

    /// The detail or backtrace.
    pub detail: String,
}

impl Fault {
    /// Creates a new failure.
    pub fn failure(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(FaultKind::Failure, message, detail)
    }

    /// Creates a new error.
    pub fn error(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(FaultKind::Error, message, detail)
    }

    /// Sets the type of the fault.
    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.ty = Some(ty.into());
        self
    }

    fn new(kind: FaultKind, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            ty: None,
            detail: detail.into(),
        }
    }
}

/// The diagnostic attached to a failing or erroring test.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    /// A short message.
    pub message: String,

    /// The type of the fault, if reported.
    pub ty: Option<String>,

    /// The detail or backtrace.
    pub detail_trace: String,
}

/// The outcome of one test method.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestOutcome {
    /// The unit the test belongs to.
    pub unit_path: Utf8PathBuf,

    /// The name of the method.
    pub method_name: String,

    /// The full name of the test: `method(Class)`.
    pub full_name: String,

    /// Whether the test passed, failed or errored.
    pub status: OutcomeStatus,

    /// How long the test took.
    pub duration: Duration,

    /// Present if and only if `status` isn't [`OutcomeStatus::Pass`].
    pub diagnostic: Option<Diagnostic>,

    /// When the test started.
    pub start_time: DateTime<Local>,
}

impl TestOutcome {
    pub(crate) fn new(
        unit: &TestUnit,
        method_name: &str,
        fault: Option<Fault>,
        start_time: DateTime<Local>,
        duration: Duration,
    ) -> Self {
        let (status, diagnostic) = match fault {
            None => (OutcomeStatus::Pass, None),
            Some(fault) => (
                fault.kind.status(),
                Some(Diagnostic {
                    message: fault.message,
                    ty: fault.ty,
                    detail_trace: fault.detail,
                }),
            ),
        };
        Self {
            unit_path: unit.path.clone(),
            method_name: method_name.to_owned(),
            full_name: format!("{method_name}({})", unit.suite_name()),
            status,
            duration,
            diagnostic,
            start_time,
        }
    }
}

/// All outcomes recorded for one unit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SuiteReport {
    /// The name of the suite: the unit's class name.
    pub suite_name: String,

    /// The path of the unit.
    pub file_path: Utf8PathBuf,

    /// The owner declared on the unit.
    pub owner: Option<String>,

    /// The development owner declared on the unit.
    pub dev_owner: Option<String>,

    /// Services declared on the unit.
    pub services: Vec<String>,

    /// Case identifiers declared on the unit.
    pub case_ids: Vec<String>,

    /// Test outcomes, in the order the tests finished.
    pub tests: Vec<TestOutcome>,

    /// When the suite started.
    pub start_time: DateTime<Local>,

    /// How long the suite took, from `suite_started` to the most recent event.
    pub total_duration: Duration,

    /// Console output captured while the suite ran.
    pub console_output: String,
}

impl SuiteReport {
    pub(crate) fn open(unit: &TestUnit, start_time: DateTime<Local>) -> Self {
        Self {
            suite_name: unit.suite_name().to_owned(),
            file_path: unit.path.clone(),
            owner: unit.owner.clone(),
            dev_owner: unit.dev_owner.clone(),
            services: unit.services.clone(),
            case_ids: unit.case_ids.clone(),
            tests: Vec::new(),
            start_time,
            total_duration: Duration::ZERO,
            console_output: String::new(),
        }
    }

    /// Returns the number of tests.
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Returns the number of tests that passed.
    pub fn passed(&self) -> usize {
        self.count(OutcomeStatus::Pass)
    }

    /// Returns the number of tests that failed.
    pub fn failures(&self) -> usize {
        self.count(OutcomeStatus::Fail)
    }

    /// Returns the number of tests that errored.
    pub fn errors(&self) -> usize {
        self.count(OutcomeStatus::Error)
    }

    /// Returns true if every test passed.
    pub fn is_success(&self) -> bool {
        self.tests.iter().all(|test| !test.status.is_failing())
    }

    /// Converts this report into its persisted form.
    pub fn to_testsuite(&self) -> Testsuite {
        let mut testsuite = Testsuite::new(&self.suite_name);
        testsuite
            .set_time(self.total_duration)
            .set_system_out(&self.console_output);

        let services = self.services.iter().join(",");
        for (index, test) in self.tests.iter().enumerate() {
            let status = match &test.diagnostic {
                None => TestcaseStatus::success(),
                Some(diagnostic) => {
                    let kind = match test.status {
                        OutcomeStatus::Error => NonSuccessKind::Error,
                        _ => NonSuccessKind::Failure,
                    };
                    let mut status = TestcaseStatus::non_success(kind);
                    status
                        .set_message(&diagnostic.message)
                        .set_description(&diagnostic.detail_trace);
                    if let Some(ty) = &diagnostic.ty {
                        status.set_type(ty);
                    }
                    status
                }
            };

            let mut testcase = Testcase::new(&test.full_name, status);
            testcase
                .set_owners(
                    self.owner.as_deref().unwrap_or_default(),
                    self.dev_owner.as_deref().unwrap_or_default(),
                )
                .set_services(services.as_str())
                .set_file_path(self.file_path.as_str())
                .set_time(test.duration);
            if let Some(tcid) = case_id_for_test(&self.case_ids, index, self.tests.len()) {
                testcase.set_tcid(tcid);
            }
            testsuite.add_testcase(testcase);
        }

        testsuite
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.tests
            .iter()
            .filter(|test| test.status == status)
            .count()
    }
}

/// Returns the case identifier(s) recorded for the test at `index`.
///
/// A lone test, or a suite with more tests than case identifiers, gets every identifier joined
/// with `,`. Otherwise tests and identifiers are paired up by position.
pub(crate) fn case_id_for_test(
    case_ids: &[String],
    index: usize,
    test_count: usize,
) -> Option<String> {
    if case_ids.is_empty() {
        return None;
    }
    if test_count == 1 || test_count > case_ids.len() {
        Some(case_ids.join(","))
    } else {
        case_ids.get(index).cloned()
    }
}

/// A progress event emitted while a run is in progress.
#[derive(Clone, Debug)]
pub enum RunEvent<'a> {
    /// The run started.
    RunStarted {
        /// The number of units queued.
        unit_count: usize,

        /// The number of workers started.
        worker_count: usize,
    },

    /// A unit finished and its suite report was closed.
    UnitFinished {
        /// The closed report.
        report: &'a SuiteReport,

        /// The number of units finished or crashed so far, including this one.
        finished: usize,

        /// The number of units queued.
        total: usize,
    },

    /// A unit crashed its worker.
    UnitCrashed {
        /// The crashed unit.
        crashed: &'a CrashedUnit,

        /// The number of units finished or crashed so far, including this one.
        finished: usize,

        /// The number of units queued.
        total: usize,
    },

    /// The run finished and every worker was joined.
    RunFinished {
        /// The completion record.
        completion: &'a RunCompletion,
    },
}
