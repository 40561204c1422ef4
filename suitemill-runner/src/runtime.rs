// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtimes that execute the tests in a unit.
//!
//! A [`TestRuntime`] runs every test method in a unit and reports outcomes through an
//! [`OutcomeSink`]. Failures of individual tests are reported as faults. Failures of the runtime
//! itself are returned as a [`UnitRunError`] and mark the unit as crashed.

use crate::{
    config::{RuntimeArgs, RuntimeConfig},
    errors::{RuntimeConfigError, UnitRunError},
    reporter::{Fault, OutcomeSink},
    unit::TestUnit,
};
use std::process::{ExitStatus, Output};
use swrite::{SWrite, swrite};
use tracing::debug;

/// The test name used for a unit that doesn't declare any methods, and is run as a whole.
pub const WHOLE_UNIT_TEST_NAME: &str = "all";

/// Executes the tests in a unit.
///
/// Implementations are shared across worker threads, and are called concurrently for different
/// units.
pub trait TestRuntime: Sync {
    /// Runs every test in `unit`, reporting outcomes to `sink`.
    ///
    /// Implementations must call `sink.suite_started` before any other event and
    /// `sink.suite_finished` last, unless they return an error.
    fn run_unit(&self, unit: &TestUnit, sink: &mut dyn OutcomeSink) -> Result<(), UnitRunError>;
}

/// Runs each test method as a separate invocation of an external program.
///
/// The exit status decides the outcome: `0` is a pass, the configured failure exit code is a
/// failure, and anything else (including termination by a signal) is an error. Each invocation
/// also receives `SUITEMILL_UNIT_PATH`, `SUITEMILL_UNIT_CLASS` and `SUITEMILL_TEST_METHOD` in its
/// environment.
#[derive(Clone, Debug)]
pub struct CommandRuntime {
    program: String,
    args: Vec<String>,
    failure_exit_code: i32,
}

impl CommandRuntime {
    /// Creates a new runtime.
    ///
    /// `{path}`, `{class}` and `{method}` in `args` are replaced for each invocation.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            failure_exit_code: 1,
        }
    }

    /// Creates a new runtime from the `[runtime]` config table.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, RuntimeConfigError> {
        let program = config
            .program
            .as_deref()
            .filter(|program| !program.trim().is_empty())
            .ok_or(RuntimeConfigError::MissingProgram)?;
        let args = match &config.args {
            RuntimeArgs::List(args) => args.clone(),
            RuntimeArgs::String(input) => {
                shell_words::split(input).map_err(|error| RuntimeConfigError::InvalidArgs {
                    input: input.clone(),
                    error,
                })?
            }
        };

        let mut runtime = Self::new(program, args);
        runtime.set_failure_exit_code(config.failure_exit_code);
        Ok(runtime)
    }

    /// Sets the exit code that indicates a test failure rather than an error.
    pub fn set_failure_exit_code(&mut self, failure_exit_code: i32) -> &mut Self {
        self.failure_exit_code = failure_exit_code;
        self
    }

    /// Returns the arguments for one invocation.
    ///
    /// `method` is `None` when the unit is run as a whole, in which case arguments that consist only
    /// of `{method}` are dropped.
    fn expand_args(&self, unit: &TestUnit, method: Option<&str>) -> Vec<String> {
        self.args
            .iter()
            .filter(|arg| method.is_some() || arg.as_str() != "{method}")
            .map(|arg| {
                arg.replace("{path}", unit.path.as_str())
                    .replace("{class}", unit.suite_name())
                    .replace("{method}", method.unwrap_or_default())
            })
            .collect()
    }

    fn run_method(&self, unit: &TestUnit, method: Option<&str>) -> Result<Output, UnitRunError> {
        let args = self.expand_args(unit, method);
        debug!(
            "running `{}`",
            shell_words::join(std::iter::once(&self.program).chain(&args))
        );

        duct::cmd(&self.program, &args)
            .env("SUITEMILL_UNIT_PATH", unit.path.as_str())
            .env("SUITEMILL_UNIT_CLASS", unit.suite_name())
            .env(
                "SUITEMILL_TEST_METHOD",
                method.unwrap_or(WHOLE_UNIT_TEST_NAME),
            )
            // Capture stdout and stderr.
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|error| UnitRunError::Spawn {
                program: self.program.clone(),
                error,
            })
    }

    fn fault_for(&self, status: ExitStatus, detail: String) -> Option<Fault> {
        match status.code() {
            Some(0) => None,
            Some(code) if code == self.failure_exit_code => Some(Fault::failure(
                format!("test exited with code {code}"),
                detail,
            )),
            Some(code) => Some(
                Fault::error(format!("test exited with code {code}"), detail)
                    .with_type("ExitStatus"),
            ),
            None => {
                Some(Fault::error(describe_abnormal_exit(status), detail).with_type("Signal"))
            }
        }
    }
}

impl TestRuntime for CommandRuntime {
    fn run_unit(&self, unit: &TestUnit, sink: &mut dyn OutcomeSink) -> Result<(), UnitRunError> {
        sink.suite_started(unit)?;

        let methods: Vec<Option<&str>> = if unit.methods.is_empty() {
            vec![None]
        } else {
            unit.methods.iter().map(|method| Some(method.as_str())).collect()
        };

        let mut console_output = String::new();
        for method in methods {
            let test_name = method.unwrap_or(WHOLE_UNIT_TEST_NAME);
            sink.test_started(test_name)?;

            let output = self.run_method(unit, method)?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            swrite!(console_output, "{stdout}{stderr}");

            // Prefer stderr for the fault detail, since that's where failures are usually printed.
            let detail = if stderr.trim().is_empty() {
                stdout.into_owned()
            } else {
                stderr.into_owned()
            };
            if let Some(fault) = self.fault_for(output.status, detail) {
                sink.add_fault(fault)?;
            }
            sink.test_finished(test_name)?;
        }

        sink.suite_finished(unit, &console_output)?;
        Ok(())
    }
}

#[cfg(unix)]
fn describe_abnormal_exit(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(signal) => format!("test terminated by signal {signal}"),
        None => format!("test exited abnormally: {status}"),
    }
}

#[cfg(not(unix))]
fn describe_abnormal_exit(status: ExitStatus) -> String {
    format!("test exited abnormally: {status}")
}
