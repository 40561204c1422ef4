// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable progress output for a run.

use super::events::{RunEvent, SuiteReport};
use owo_colors::{OwoColorize, Style};
use std::{fmt, io, time::Duration};

/// Writes one line per run event to a terminal or log.
#[derive(Clone, Debug, Default)]
pub struct RunDisplayer {
    styles: Box<Styles>,
}

impl RunDisplayer {
    /// Creates a new displayer with colors disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables colorized output.
    pub fn colorize(&mut self) -> &mut Self {
        self.styles.colorize();
        self
    }

    /// Writes a line describing this event.
    pub fn write_event(&self, event: &RunEvent<'_>, mut writer: impl io::Write) -> io::Result<()> {
        let styles: &Styles = &self.styles;
        match event {
            RunEvent::RunStarted {
                unit_count,
                worker_count,
            } => {
                write!(writer, "{:>12} ", "Starting".style(styles.pass))?;
                writeln!(
                    writer,
                    "{} {} across {} {}",
                    unit_count.style(styles.count),
                    units_str(*unit_count),
                    worker_count.style(styles.count),
                    if *worker_count == 1 {
                        "worker"
                    } else {
                        "workers"
                    },
                )?;
            }
            RunEvent::UnitFinished {
                report,
                finished,
                total,
            } => {
                if report.is_success() {
                    write!(writer, "{:>12} ", "PASS".style(styles.pass))?;
                } else {
                    write!(writer, "{:>12} ", "FAIL".style(styles.fail))?;
                }
                write!(
                    writer,
                    "{}({finished}/{total}) {}: ",
                    DisplayBracketedDuration(report.total_duration),
                    report.suite_name.style(styles.suite_name),
                )?;
                writeln!(writer, "{}", DisplayReportCounts { report, styles })?;
            }
            RunEvent::UnitCrashed {
                crashed,
                finished,
                total,
            } => {
                write!(writer, "{:>12} ", "CRASH".style(styles.fail))?;
                writeln!(
                    writer,
                    "{}({finished}/{total}) {}: {}",
                    DisplayBracketedDuration(crashed.duration),
                    crashed.suite_name.style(styles.suite_name),
                    crashed.reason,
                )?;
            }
            RunEvent::RunFinished { completion } => {
                let tests: usize = completion
                    .completed
                    .iter()
                    .map(SuiteReport::test_count)
                    .sum();
                let passed: usize = completion.completed.iter().map(SuiteReport::passed).sum();
                let failed: usize = completion.completed.iter().map(SuiteReport::failures).sum();
                let errored: usize = completion.completed.iter().map(SuiteReport::errors).sum();

                let summary_style = if completion.is_success() {
                    styles.pass
                } else {
                    styles.fail
                };
                write!(
                    writer,
                    "------------\n{:>12} ",
                    "Summary".style(summary_style)
                )?;
                write!(writer, "{}", DisplayBracketedDuration(completion.duration))?;

                let units_run = completion.completed.len() + completion.crashed.len();
                write!(
                    writer,
                    "{} {} run, {} {}: ",
                    units_run.style(styles.count),
                    units_str(units_run),
                    tests.style(styles.count),
                    if tests == 1 { "test" } else { "tests" },
                )?;
                write!(
                    writer,
                    "{} {}",
                    passed.style(styles.count),
                    "passed".style(styles.pass)
                )?;
                for (count, label) in [
                    (failed, "failed"),
                    (errored, "errored"),
                    (completion.crashed.len(), "crashed"),
                ] {
                    let style = if count > 0 { styles.fail } else { styles.count };
                    write!(writer, ", {} {}", count.style(style), label.style(style))?;
                }
                if !completion.never_started.is_empty() {
                    write!(
                        writer,
                        ", {} never started",
                        completion.never_started.len().style(styles.skip)
                    )?;
                }
                writeln!(writer)?;
            }
        }
        Ok(())
    }
}

fn units_str(count: usize) -> &'static str {
    if count == 1 { "unit" } else { "units" }
}

struct DisplayReportCounts<'a> {
    report: &'a SuiteReport,
    styles: &'a Styles,
}

impl fmt::Display for DisplayReportCounts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { report, styles } = self;
        write!(
            f,
            "{} passed, {} failed, {} errored",
            report.passed().style(styles.count),
            report.failures().style(if report.failures() > 0 {
                styles.fail
            } else {
                styles.count
            }),
            report.errors().style(if report.errors() > 0 {
                styles.fail
            } else {
                styles.count
            }),
        )
    }
}

struct DisplayBracketedDuration(Duration);

impl fmt::Display for DisplayBracketedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(f, "[{:>8.3?}s] ", self.0.as_secs_f64())
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    skip: Style,
    suite_name: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
        self.suite_name = Style::new().magenta().bold();
    }
}
