// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The execution engine: a fixed pool of workers pulling units from a shared queue.
//!
//! Every selected unit is queued before any worker starts. Each worker pops one unit at a time,
//! runs it through the [`TestRuntime`] with its own [`SuiteRecorder`], and reports the terminal
//! state of the unit over a channel. A unit that crashes its runtime is recorded and the worker
//! moves on to the next unit.

use crate::{
    errors::{
        DisplayErrorChain, ProtocolViolation, QueueEmpty, RunError, SinkError, UnitRunError,
        WriteReportError,
    },
    reporter::{ReportWriter, RunEvent, SuiteRecorder, SuiteReport},
    runtime::TestRuntime,
    stopwatch::stopwatch,
    unit::TestUnit,
};
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use crossbeam_channel::Sender;
use std::{
    any::Any,
    collections::VecDeque,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};
use tracing::{debug, error, info};

/// A queue of units shared by every worker in a run.
///
/// Popping is the only way to take a unit out, so each unit is handed to at most one worker.
#[derive(Debug, Default)]
pub struct WorkQueue {
    units: Mutex<VecDeque<TestUnit>>,
}

impl WorkQueue {
    /// Creates a new queue holding these units, in order.
    pub fn new(units: impl IntoIterator<Item = TestUnit>) -> Self {
        Self {
            units: Mutex::new(units.into_iter().collect()),
        }
    }

    /// Removes and returns the unit at the front of the queue.
    pub fn pop(&self) -> Result<TestUnit, QueueEmpty> {
        self.lock().pop_front().ok_or(QueueEmpty)
    }

    /// Returns true if every unit has been handed out.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn drain(&self) -> Vec<TestUnit> {
        self.lock().drain(..).collect()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TestUnit>> {
        // A worker never panics while holding the lock, and the queue is valid at every point
        // anyway.
        self.units.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// State shared across the workers of one run. Constructed per run and dropped at the end of it.
#[derive(Debug)]
struct RunContext {
    queue: WorkQueue,
    cancelled: AtomicBool,
}

impl RunContext {
    fn new(units: Vec<TestUnit>) -> Self {
        Self {
            queue: WorkQueue::new(units),
            cancelled: AtomicBool::new(false),
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Runs units on a bounded pool of worker threads.
pub struct TestRunner<'a> {
    runtime: &'a dyn TestRuntime,
    writer: ReportWriter,
    max_concurrent: NonZeroUsize,
}

impl<'a> TestRunner<'a> {
    /// Creates a new runner that starts `max_concurrent` workers per run.
    pub fn new(
        runtime: &'a dyn TestRuntime,
        writer: ReportWriter,
        max_concurrent: NonZeroUsize,
    ) -> Self {
        Self {
            runtime,
            writer,
            max_concurrent,
        }
    }

    /// Runs every unit exactly once, returning after all workers have exited.
    ///
    /// The callback is called on the current thread with progress events. Returns an error if a
    /// runtime violated the outcome protocol. In that case workers stop taking new units, the run
    /// ends once the units already in progress are done, and the units still queued are listed in
    /// the error.
    ///
    /// If a worker thread can't be spawned, the run continues with the workers that did start.
    /// Units that no worker picked up are reported in [`RunCompletion::never_started`].
    pub fn execute<F>(
        &self,
        units: Vec<TestUnit>,
        mut callback: F,
    ) -> Result<RunCompletion, RunError>
    where
        F: FnMut(RunEvent<'_>),
    {
        let run_stopwatch = stopwatch();
        let total = units.len();
        let worker_count = self.max_concurrent.get();
        let ctx = RunContext::new(units);

        info!("running {total} units with {worker_count} workers");
        callback(RunEvent::RunStarted {
            unit_count: total,
            worker_count,
        });

        let mut completed = Vec::new();
        let mut crashed = Vec::new();
        let mut report_write_failures = Vec::new();
        let mut first_violation = None;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let ctx_ref = &ctx;

        thread::scope(|scope| {
            let mut spawned = 0;
            for index in 0..worker_count {
                let sender = sender.clone();
                let result = thread::Builder::new()
                    .name(format!("suitemill-worker-{index}"))
                    .spawn_scoped(scope, move || self.worker_loop(ctx_ref, sender));
                if let Err(error) = result {
                    // Units are left to the workers that did start. With no workers at all, every
                    // unit is reported as never started.
                    error!("failed to spawn worker {index} ({spawned} running): {error}");
                    break;
                }
                spawned += 1;
            }

            // When every worker has exited, all senders are dropped and iteration completes.
            drop(sender);

            let mut finished = 0;
            for event in receiver {
                finished += 1;
                match event {
                    WorkerEvent::Completed { report } => {
                        callback(RunEvent::UnitFinished {
                            report: &report,
                            finished,
                            total,
                        });
                        completed.push(report);
                    }
                    WorkerEvent::WriteFailed {
                        unit,
                        error,
                        report,
                        duration,
                    } => {
                        error!(
                            "failed to persist report for `{}`: {}",
                            unit.path,
                            DisplayErrorChain::new(&error)
                        );
                        match report {
                            Some(report) => {
                                callback(RunEvent::UnitFinished {
                                    report: &report,
                                    finished,
                                    total,
                                });
                                completed.push(report);
                            }
                            None => {
                                let crash = CrashedUnit::new(
                                    &unit,
                                    DisplayErrorChain::new(&error).to_string(),
                                    duration,
                                );
                                callback(RunEvent::UnitCrashed {
                                    crashed: &crash,
                                    finished,
                                    total,
                                });
                                crashed.push(crash);
                            }
                        }
                        report_write_failures.push(ReportWriteFailure {
                            unit: unit.path,
                            error,
                        });
                    }
                    WorkerEvent::Crashed { crash } => {
                        error!("unit `{}` crashed: {}", crash.path, crash.reason);
                        callback(RunEvent::UnitCrashed {
                            crashed: &crash,
                            finished,
                            total,
                        });
                        crashed.push(crash);
                    }
                    WorkerEvent::ProtocolViolated { unit, violation } => {
                        error!("unit `{}` violated the outcome protocol: {violation}", unit.path);
                        if first_violation.is_none() {
                            first_violation = Some((unit.path, violation));
                        }
                    }
                }
            }
        });

        // Every worker has been joined, so whatever is left was never handed out.
        let never_started: Vec<_> = ctx.queue.drain().into_iter().map(|unit| unit.path).collect();
        for path in &never_started {
            error!("unit `{path}` was never started");
        }

        if let Some((unit, violation)) = first_violation {
            return Err(RunError::Protocol {
                unit,
                violation,
                never_started,
            });
        }

        let snapshot = run_stopwatch.snapshot();
        let completion = RunCompletion {
            completed,
            crashed,
            never_started,
            report_write_failures,
            start_time: snapshot.start_time,
            duration: snapshot.duration,
        };
        callback(RunEvent::RunFinished {
            completion: &completion,
        });
        Ok(completion)
    }

    fn worker_loop(&self, ctx: &RunContext, sender: Sender<WorkerEvent>) {
        while !ctx.is_cancelled() {
            let Ok(unit) = ctx.queue.pop() else {
                break;
            };
            debug!("running unit `{}`", unit.path);

            let event = self.run_unit(unit);
            if matches!(event, WorkerEvent::ProtocolViolated { .. }) {
                ctx.cancel();
            }
            // Failure to send means the receiver was dropped.
            let _ = sender.send(event);
        }
    }

    fn run_unit(&self, unit: TestUnit) -> WorkerEvent {
        let unit_stopwatch = stopwatch();
        let mut recorder = SuiteRecorder::new(&self.writer);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.runtime.run_unit(&unit, &mut recorder)
        }));
        let duration = unit_stopwatch.snapshot().duration;

        match result {
            Ok(Ok(())) => match recorder.finish() {
                Ok(report) => WorkerEvent::Completed { report },
                Err(violation) => WorkerEvent::ProtocolViolated { unit, violation },
            },
            Ok(Err(UnitRunError::Sink(SinkError::Protocol(violation)))) => {
                WorkerEvent::ProtocolViolated { unit, violation }
            }
            Ok(Err(UnitRunError::Sink(SinkError::Write(error)))) => WorkerEvent::WriteFailed {
                report: recorder.finish().ok(),
                unit,
                error,
                duration,
            },
            Ok(Err(error)) => WorkerEvent::Crashed {
                crash: CrashedUnit::new(
                    &unit,
                    DisplayErrorChain::new(&error).to_string(),
                    duration,
                ),
            },
            Err(payload) => WorkerEvent::Crashed {
                crash: CrashedUnit::new(
                    &unit,
                    format!("runtime panicked: {}", panic_message(&*payload)),
                    duration,
                ),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "(non-string panic payload)"
    }
}

/// The terminal state of a unit, sent from a worker to the run loop.
#[derive(Debug)]
enum WorkerEvent {
    Completed {
        report: SuiteReport,
    },
    WriteFailed {
        unit: TestUnit,
        error: WriteReportError,
        report: Option<SuiteReport>,
        duration: Duration,
    },
    Crashed {
        crash: CrashedUnit,
    },
    ProtocolViolated {
        unit: TestUnit,
        violation: ProtocolViolation,
    },
}

/// A unit whose runtime failed outside of the per-test protocol.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CrashedUnit {
    /// The path of the unit.
    pub path: Utf8PathBuf,

    /// The name of the unit's suite.
    pub suite_name: String,

    /// A description of the failure.
    pub reason: String,

    /// How long the unit ran before crashing.
    pub duration: Duration,
}

impl CrashedUnit {
    fn new(unit: &TestUnit, reason: String, duration: Duration) -> Self {
        Self {
            path: unit.path.clone(),
            suite_name: unit.suite_name().to_owned(),
            reason,
            duration,
        }
    }
}

/// A report that could not be persisted.
#[derive(Debug)]
pub struct ReportWriteFailure {
    /// The unit the report belongs to.
    pub unit: Utf8PathBuf,

    /// The error that occurred.
    pub error: WriteReportError,
}

/// The result of a run in which every worker was joined.
#[derive(Debug)]
pub struct RunCompletion {
    /// Reports for units that ran to completion, in the order they finished.
    pub completed: Vec<SuiteReport>,

    /// Units that crashed their worker.
    pub crashed: Vec<CrashedUnit>,

    /// Units that were queued but never handed to a worker.
    pub never_started: Vec<Utf8PathBuf>,

    /// Reports that could not be persisted.
    pub report_write_failures: Vec<ReportWriteFailure>,

    /// When the run started.
    pub start_time: DateTime<Local>,

    /// The wall-clock duration of the run.
    pub duration: Duration,
}

impl RunCompletion {
    /// Returns true if every queued unit completed, every test passed and every report was
    /// persisted.
    pub fn is_success(&self) -> bool {
        self.crashed.is_empty()
            && self.never_started.is_empty()
            && self.report_write_failures.is_empty()
            && self.completed.iter().all(SuiteReport::is_success)
    }
}
