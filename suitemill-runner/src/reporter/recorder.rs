// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    events::{Fault, SuiteReport, TestOutcome},
    writer::ReportWriter,
};
use crate::{
    errors::{ProtocolViolation, SinkError},
    stopwatch::{StopwatchStart, stopwatch},
    unit::TestUnit,
};
use tracing::{debug, warn};

/// Receives the outcome events emitted by a runtime while it runs a unit.
///
/// For each unit, events arrive in this order:
///
/// ```text
/// suite_started (test_started add_fault? test_finished)* suite_finished
/// ```
///
/// A sink is bound to a single unit at a time. Units running concurrently on different workers
/// use independent sinks.
pub trait OutcomeSink {
    /// The runtime started running a unit.
    fn suite_started(&mut self, unit: &TestUnit) -> Result<(), SinkError>;

    /// A test method started.
    fn test_started(&mut self, method: &str) -> Result<(), SinkError>;

    /// The open test failed or errored.
    fn add_fault(&mut self, fault: Fault) -> Result<(), SinkError>;

    /// The open test finished.
    fn test_finished(&mut self, method: &str) -> Result<(), SinkError>;

    /// The runtime finished running a unit. `console_output` is everything it printed.
    fn suite_finished(&mut self, unit: &TestUnit, console_output: &str) -> Result<(), SinkError>;
}

/// An [`OutcomeSink`] that builds a [`SuiteReport`] for one unit and persists it as it goes.
///
/// The report is written after every finished test and again when the suite finishes, so a
/// crash partway through a unit leaves the tests that already finished on disk.
#[derive(Debug)]
pub struct SuiteRecorder<'w> {
    writer: &'w ReportWriter,
    state: RecorderState,
}

#[derive(Debug)]
enum RecorderState {
    Idle,
    Open(Box<OpenSuite>),
    Finished(SuiteReport),
}

#[derive(Debug)]
struct OpenSuite {
    unit: TestUnit,
    report: SuiteReport,
    stopwatch: StopwatchStart,
    current: Option<OpenTest>,
}

#[derive(Debug)]
struct OpenTest {
    method: String,
    stopwatch: StopwatchStart,
    fault: Option<Fault>,
}

impl<'w> SuiteRecorder<'w> {
    /// Creates a new recorder that persists reports through `writer`.
    pub fn new(writer: &'w ReportWriter) -> Self {
        Self {
            writer,
            state: RecorderState::Idle,
        }
    }

    /// Returns the report for a suite that has finished.
    ///
    /// Returns an error if the suite was never started, or is still open.
    pub fn finish(self) -> Result<SuiteReport, ProtocolViolation> {
        match self.state {
            RecorderState::Idle => Err(ProtocolViolation::SuiteNotStarted),
            RecorderState::Open(open) => Err(ProtocolViolation::SuiteNotFinished {
                suite: open.report.suite_name,
            }),
            RecorderState::Finished(report) => Ok(report),
        }
    }

    fn open_suite(&mut self, event: &'static str) -> Result<&mut OpenSuite, ProtocolViolation> {
        match &mut self.state {
            RecorderState::Open(open) => Ok(&mut **open),
            RecorderState::Idle | RecorderState::Finished(_) => {
                Err(ProtocolViolation::NoOpenSuite { event })
            }
        }
    }
}

impl OutcomeSink for SuiteRecorder<'_> {
    fn suite_started(&mut self, unit: &TestUnit) -> Result<(), SinkError> {
        match &self.state {
            RecorderState::Idle => {}
            RecorderState::Open(open) => {
                return Err(ProtocolViolation::NestedSuite {
                    open: open.report.suite_name.clone(),
                    started: unit.suite_name().to_owned(),
                }
                .into());
            }
            RecorderState::Finished(report) => {
                return Err(ProtocolViolation::SuiteRestarted {
                    suite: report.suite_name.clone(),
                }
                .into());
            }
        }

        debug!("suite `{}` started", unit.suite_name());
        let stopwatch = stopwatch();
        self.state = RecorderState::Open(Box::new(OpenSuite {
            unit: unit.clone(),
            report: SuiteReport::open(unit, stopwatch.start_time()),
            stopwatch,
            current: None,
        }));
        Ok(())
    }

    fn test_started(&mut self, method: &str) -> Result<(), SinkError> {
        let open = self.open_suite("test_started")?;
        if let Some(current) = &open.current {
            return Err(ProtocolViolation::NestedTest {
                open: current.method.clone(),
                started: method.to_owned(),
            }
            .into());
        }
        open.current = Some(OpenTest {
            method: method.to_owned(),
            stopwatch: stopwatch(),
            fault: None,
        });
        Ok(())
    }

    fn add_fault(&mut self, fault: Fault) -> Result<(), SinkError> {
        let open = self.open_suite("add_fault")?;
        let Some(current) = &mut open.current else {
            return Err(ProtocolViolation::NoOpenTest { event: "add_fault" }.into());
        };
        if current.fault.is_some() {
            warn!(
                "ignoring second fault for `{}({})`: {}",
                current.method, open.report.suite_name, fault.message
            );
            return Ok(());
        }
        current.fault = Some(fault);
        Ok(())
    }

    fn test_finished(&mut self, method: &str) -> Result<(), SinkError> {
        let writer = self.writer;
        let open = self.open_suite("test_finished")?;
        let Some(current) = open.current.take_if(|current| current.method == method) else {
            return Err(match &open.current {
                Some(current) => ProtocolViolation::MismatchedTest {
                    open: current.method.clone(),
                    finished: method.to_owned(),
                },
                None => ProtocolViolation::NoOpenTest {
                    event: "test_finished",
                },
            }
            .into());
        };

        let snapshot = current.stopwatch.snapshot();
        let outcome = TestOutcome::new(
            &open.unit,
            &current.method,
            current.fault,
            snapshot.start_time,
            snapshot.duration,
        );
        debug!("test `{}` finished: {}", outcome.full_name, outcome.status);
        open.report.tests.push(outcome);
        open.report.total_duration = open.stopwatch.snapshot().duration;

        writer.write(&open.report)?;
        Ok(())
    }

    fn suite_finished(&mut self, unit: &TestUnit, console_output: &str) -> Result<(), SinkError> {
        let writer = self.writer;
        let open = self.open_suite("suite_finished")?;
        if open.unit.path != unit.path {
            return Err(ProtocolViolation::MismatchedSuite {
                open: open.report.suite_name.clone(),
                finished: unit.suite_name().to_owned(),
            }
            .into());
        }
        if let Some(current) = &open.current {
            return Err(ProtocolViolation::TestStillOpen {
                suite: open.report.suite_name.clone(),
                test: current.method.clone(),
            }
            .into());
        }

        open.report.total_duration = open.stopwatch.snapshot().duration;
        open.report.console_output = console_output.to_owned();
        let result = writer.write(&open.report);
        debug!(
            "suite `{}` finished: {} tests, {} failures, {} errors",
            open.report.suite_name,
            open.report.test_count(),
            open.report.failures(),
            open.report.errors()
        );

        // The suite is closed even if persisting it failed.
        if let RecorderState::Open(open) = std::mem::replace(&mut self.state, RecorderState::Idle) {
            self.state = RecorderState::Finished(open.report);
        }
        result?;
        Ok(())
    }
}
