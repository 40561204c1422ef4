// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use suitemill_metadata::SuitemillExitCode;
use suitemill_runner::errors::*;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that suitemill expects and knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config read error")]
    ConfigReadError {
        #[from]
        err: ConfigReadError,
    },
    #[error("manifest read error")]
    ManifestReadError {
        #[from]
        err: ManifestReadError,
    },
    #[error("group spec parse error")]
    GroupSpecParseError {
        #[from]
        err: GroupSpecParseError,
    },
    #[error("selection error")]
    SelectionError {
        #[from]
        err: SelectionError,
    },
    #[error("runtime config error")]
    RuntimeConfigError {
        #[from]
        err: RuntimeConfigError,
    },
    #[error("results read error")]
    ReadResultsError {
        #[from]
        err: ReadResultsError,
    },
    #[error("ownership map read error")]
    OwnershipMapReadError {
        #[from]
        err: OwnershipMapReadError,
    },
    #[error("results dir error")]
    ResultsDirError {
        results_dir: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("run error")]
    RunError {
        #[from]
        err: RunError,
    },
    #[error("report write failed")]
    ReportWriteFailed { count: usize },
    #[error("summary write error")]
    WriteSummaryError {
        #[from]
        err: WriteSummaryError,
    },
    #[error("output write error")]
    WriteOutputError {
        #[source]
        err: std::io::Error,
    },
    #[error("output serialize error")]
    SerializeOutputError {
        #[source]
        err: serde_json::Error,
    },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    pub(crate) fn results_dir_error(
        results_dir: impl Into<Utf8PathBuf>,
        err: std::io::Error,
    ) -> Self {
        Self::ResultsDirError {
            results_dir: results_dir.into(),
            err,
        }
    }

    pub(crate) fn write_output_error(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigReadError { .. }
            | Self::ManifestReadError { .. }
            | Self::RuntimeConfigError { .. }
            | Self::ReadResultsError { .. }
            | Self::OwnershipMapReadError { .. }
            | Self::ResultsDirError { .. } => SuitemillExitCode::SETUP_ERROR,
            Self::GroupSpecParseError { .. } => SuitemillExitCode::INVALID_GROUP_SPEC,
            Self::SelectionError { .. } => SuitemillExitCode::SELECTION_FAILED,
            Self::RunError {
                err: RunError::Protocol { .. },
            } => SuitemillExitCode::PROTOCOL_VIOLATION,
            Self::RunError { .. } => SuitemillExitCode::SETUP_ERROR,
            Self::ReportWriteFailed { .. }
            | Self::WriteSummaryError { .. }
            | Self::WriteOutputError { .. }
            | Self::SerializeOutputError { .. } => SuitemillExitCode::WRITE_REPORT_ERROR,
            Self::TestRunFailed => SuitemillExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::ConfigReadError { err } => {
                error!(
                    "failed to read suitemill config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::ManifestReadError { err } => {
                error!("{err}");
                err.source()
            }
            Self::GroupSpecParseError { err } => {
                error!("{err}");
                None
            }
            Self::SelectionError { err } => {
                error!("{err}");
                if matches!(err, SelectionError::DuplicateClass { .. }) {
                    error!(
                        target: NO_HEADING_TARGET,
                        "{}",
                        "(hint: pass --no-detect-duplicates to run anyway)"
                            .style(styles.warning_text)
                    );
                }
                None
            }
            Self::RuntimeConfigError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ReadResultsError { err } => {
                error!("{err}");
                err.source()
            }
            Self::OwnershipMapReadError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ResultsDirError { results_dir, err } => {
                error!(
                    "failed to prepare results directory `{}`",
                    results_dir.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::RunError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ReportWriteFailed { count } => {
                error!(
                    "{} suite {} could not be written (see above)",
                    count.style(styles.bold),
                    if *count == 1 { "report" } else { "reports" },
                );
                None
            }
            Self::WriteSummaryError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteOutputError { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
            Self::SerializeOutputError { err } => {
                error!("error serializing output");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
