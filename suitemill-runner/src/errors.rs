// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by suitemill.

use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{error, fmt, io};
use suitemill_xml::{DeserializeError, SerializeError};
use thiserror::Error;

/// An error that occurred while reading the unit manifest.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestReadError {
    /// The manifest could not be read from disk.
    #[error("failed to read unit manifest at `{path}`")]
    Read {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The manifest is not valid TOML, or doesn't match the expected schema.
    #[error("failed to parse unit manifest at `{path}`")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse suitemill config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigReadError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigReadError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// An error that occurs while parsing a group spec such as `[OR] smoke,login`.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum GroupSpecParseError {
    /// A bracketed marker other than `[AND]`, `[OR]` or `[NOT]` was found.
    #[error("unknown marker `{marker}` in group spec `{input}` (known markers: [AND], [OR], [NOT])")]
    UnknownMarker {
        /// The full group spec.
        input: String,

        /// The marker that wasn't recognized.
        marker: String,
    },

    /// Both `[AND]` and `[OR]` were specified.
    #[error("group spec `{input}` contains both [AND] and [OR]")]
    ConflictingMarkers {
        /// The full group spec.
        input: String,
    },

    /// A `[NOT]` marker wasn't followed by a group name.
    #[error("group spec `{input}` has a [NOT] marker without a group name")]
    EmptyExclusion {
        /// The full group spec.
        input: String,
    },
}

/// A fatal error found while selecting units. No unit is run if this occurs.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum SelectionError {
    /// A unit selected to run shares its class name with another unit.
    #[error(
        "class `{class_name}` is declared by more than one unit ({}), \
         and `{selected}` was selected to run",
        .paths.iter().join(", ")
    )]
    DuplicateClass {
        /// The class name declared more than once.
        class_name: String,

        /// The selected unit.
        selected: Utf8PathBuf,

        /// Every unit that declares the class, in discovery order.
        paths: Vec<Utf8PathBuf>,
    },

    /// Selected units with different suite names would write to the same report file.
    #[error(
        "suites {} would all be written to `{file_name}`",
        .suite_names.iter().map(|name| format!("`{name}`")).join(", ")
    )]
    ArtifactCollision {
        /// The report file name.
        file_name: String,

        /// The colliding suite names, sorted.
        suite_names: Vec<String>,
    },
}

/// A violation of the outcome protocol between a runtime and its sink.
///
/// This indicates a coordination bug rather than a test failure, and aborts the run.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum ProtocolViolation {
    /// `suite_started` was received while another suite was open.
    #[error("suite `{started}` started while suite `{open}` is still open")]
    NestedSuite {
        /// The suite that is already open.
        open: String,

        /// The suite that was started.
        started: String,
    },

    /// `suite_started` was received after the suite had already finished.
    #[error("suite `{suite}` started again after it finished")]
    SuiteRestarted {
        /// The suite that was started again.
        suite: String,
    },

    /// A suite was finished, but the open suite is a different one.
    #[error("suite `{finished}` finished, but the open suite is `{open}`")]
    MismatchedSuite {
        /// The suite that is open.
        open: String,

        /// The suite named by the event.
        finished: String,
    },

    /// A test-level event arrived with no open suite.
    #[error("`{event}` received with no open suite")]
    NoOpenSuite {
        /// The name of the event.
        event: &'static str,
    },

    /// `test_started` was received while another test was open.
    #[error("test `{started}` started while test `{open}` is still open")]
    NestedTest {
        /// The test that is already open.
        open: String,

        /// The test that was started.
        started: String,
    },

    /// A fault or `test_finished` arrived with no open test.
    #[error("`{event}` received with no open test")]
    NoOpenTest {
        /// The name of the event.
        event: &'static str,
    },

    /// `test_finished` named a test other than the open one.
    #[error("test `{finished}` finished, but the open test is `{open}`")]
    MismatchedTest {
        /// The test that is open.
        open: String,

        /// The test named by the event.
        finished: String,
    },

    /// `suite_finished` arrived while a test was still open.
    #[error("suite `{suite}` finished while test `{test}` is still open")]
    TestStillOpen {
        /// The suite being finished.
        suite: String,

        /// The test that is still open.
        test: String,
    },

    /// The runtime returned normally without starting a suite.
    #[error("runtime returned without starting a suite")]
    SuiteNotStarted,

    /// The runtime returned normally without finishing the open suite.
    #[error("runtime returned without finishing suite `{suite}`")]
    SuiteNotFinished {
        /// The suite that is still open.
        suite: String,
    },
}

/// An error returned by an [`OutcomeSink`](crate::reporter::OutcomeSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// An event arrived out of order.
    #[error("outcome protocol violated")]
    Protocol(#[from] ProtocolViolation),

    /// The suite report could not be persisted.
    #[error("failed to persist suite report")]
    Write(#[from] WriteReportError),
}

/// An error that ends the execution of a single unit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UnitRunError {
    /// The runtime failed outside of the per-test protocol.
    #[error("runtime crashed: {reason}")]
    Crashed {
        /// A description of the crash.
        reason: String,
    },

    /// The runtime program could not be started.
    #[error("failed to spawn `{program}`")]
    Spawn {
        /// The program that failed to start.
        program: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The sink rejected an event.
    #[error("error reporting outcomes")]
    Sink(#[from] SinkError),
}

/// An error that occurs while constructing a [`CommandRuntime`](crate::runtime::CommandRuntime).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeConfigError {
    /// `[runtime] program` isn't set.
    #[error("no runtime program configured (set `program` in the `[runtime]` section)")]
    MissingProgram,

    /// `[runtime] args` is a string that isn't valid shell syntax.
    #[error("failed to split runtime args `{input}`")]
    InvalidArgs {
        /// The args string.
        input: String,

        /// The underlying error.
        #[source]
        error: shell_words::ParseError,
    },
}

/// An error that occurs while writing a per-suite report artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// An error occurred while operating on the file system.
    #[error("error writing suite report to `{path}`")]
    Io {
        /// The artifact path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// An error occurred while producing XML.
    #[error("error serializing suite report to `{path}`")]
    Serialize {
        /// The artifact path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: SerializeError,
    },
}

/// An error that occurs while reading persisted suite reports.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadResultsError {
    /// The path doesn't exist.
    #[error("results path `{path}` does not exist")]
    NotFound {
        /// The path that was looked up.
        path: Utf8PathBuf,
    },

    /// An error occurred while reading a directory or file.
    #[error("error reading results from `{path}`")]
    Io {
        /// The path being read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A report file isn't a valid suite report.
    #[error("error parsing suite report `{path}`")]
    Parse {
        /// The report path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: DeserializeError,
    },
}

/// An error that occurs while reading an ownership map.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OwnershipMapReadError {
    /// The map could not be read from disk.
    #[error("failed to read ownership map at `{path}`")]
    Read {
        /// The map path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The map isn't a TOML table of team names to class name arrays.
    #[error("failed to parse ownership map at `{path}`")]
    Parse {
        /// The map path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },
}

/// An error that occurs while writing run summary files.
#[derive(Debug, Error)]
#[error("error writing run summary to `{path}`")]
pub struct WriteSummaryError {
    path: Utf8PathBuf,
    #[source]
    error: io::Error,
}

impl WriteSummaryError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: io::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }
}

/// Returned by [`WorkQueue::pop`](crate::runner::WorkQueue::pop) once every unit has been handed
/// out.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("work queue is empty")]
pub struct QueueEmpty;

/// An error that aborts a whole run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// A runtime broke the outcome protocol while running a unit.
    #[error(
        "protocol violation while running `{unit}`{}",
        DisplayNeverStarted(never_started)
    )]
    Protocol {
        /// The unit being run.
        unit: Utf8PathBuf,

        /// The violation.
        #[source]
        violation: ProtocolViolation,

        /// Units that were still queued when the run was aborted.
        never_started: Vec<Utf8PathBuf>,
    },
}

struct DisplayNeverStarted<'a>(&'a [Utf8PathBuf]);

impl fmt::Display for DisplayNeverStarted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(
            f,
            " ({} {} never started: {})",
            self.0.len(),
            if self.0.len() == 1 { "unit" } else { "units" },
            self.0.iter().join(", ")
        )
    }
}

/// Displays an error along with every error in its source chain, one per line.
pub struct DisplayErrorChain<E>(E);

impl<E: error::Error> DisplayErrorChain<E> {
    /// Wraps an error.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, "\n  caused by: {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chain_lists_sources() {
        let error = WriteSummaryError::new(
            "target/suitemill/bottom_line.log",
            io::Error::new(io::ErrorKind::PermissionDenied, "read-only file system"),
        );
        assert_eq!(
            DisplayErrorChain::new(&error).to_string(),
            "error writing run summary to `target/suitemill/bottom_line.log`\n  \
             caused by: read-only file system"
        );
    }

    #[test]
    fn protocol_error_lists_never_started_units() {
        let violation = ProtocolViolation::MismatchedTest {
            open: "test_a".to_owned(),
            finished: "test_b".to_owned(),
        };
        let error = RunError::Protocol {
            unit: "tests/beta.rb".into(),
            violation: violation.clone(),
            never_started: vec!["tests/gamma.rb".into(), "tests/delta.rb".into()],
        };
        assert_eq!(
            error.to_string(),
            "protocol violation while running `tests/beta.rb` \
             (2 units never started: tests/gamma.rb, tests/delta.rb)"
        );

        let error = RunError::Protocol {
            unit: "tests/beta.rb".into(),
            violation,
            never_started: Vec::new(),
        };
        assert_eq!(
            error.to_string(),
            "protocol violation while running `tests/beta.rb`"
        );
    }

    #[test]
    fn duplicate_class_lists_paths() {
        let error = SelectionError::DuplicateClass {
            class_name: "LoginTest".to_owned(),
            selected: "tests/a/login_test.rb".into(),
            paths: vec!["tests/a/login_test.rb".into(), "tests/b/login_test.rb".into()],
        };
        assert_eq!(
            error.to_string(),
            "class `LoginTest` is declared by more than one unit \
             (tests/a/login_test.rb, tests/b/login_test.rb), and `tests/a/login_test.rb` \
             was selected to run"
        );
    }
}
