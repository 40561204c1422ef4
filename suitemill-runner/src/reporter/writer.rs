// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::events::SuiteReport;
use crate::errors::WriteReportError;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

/// Persists suite reports as `TEST-<suite name>.xml` files in a results directory.
///
/// Each write replaces the artifact atomically. The results directory must already exist.
#[derive(Clone, Debug)]
pub struct ReportWriter {
    results_dir: Utf8PathBuf,
}

impl ReportWriter {
    /// Creates a new writer for the given results directory.
    pub fn new(results_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    /// Returns the results directory.
    pub fn results_dir(&self) -> &Utf8Path {
        &self.results_dir
    }

    /// Returns the path that the report for this suite is written to.
    pub fn artifact_path(&self, suite_name: &str) -> Utf8PathBuf {
        self.results_dir.join(artifact_file_name(suite_name))
    }

    /// Serializes the report and writes it to its artifact path.
    pub fn write(&self, report: &SuiteReport) -> Result<(), WriteReportError> {
        let path = self.artifact_path(&report.suite_name);
        let testsuite = report.to_testsuite();
        atomicwrites::AtomicFile::new(&path, atomicwrites::AllowOverwrite)
            .write(|file| testsuite.serialize(file))
            .map_err(|error| match error {
                atomicwrites::Error::Internal(error) => WriteReportError::Io {
                    path: path.clone(),
                    error,
                },
                atomicwrites::Error::User(error) => WriteReportError::Serialize {
                    path: path.clone(),
                    error,
                },
            })?;
        debug!(
            "wrote report for `{}` ({} tests) to `{path}`",
            report.suite_name,
            report.test_count()
        );
        Ok(())
    }
}

/// Returns the artifact file name for a suite: `TEST-<suite name>.xml`, with characters that
/// aren't safe in file names replaced by `_`.
pub fn artifact_file_name(suite_name: &str) -> String {
    let sanitized: String = suite_name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("TEST-{sanitized}.xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("SampleTest" => "TEST-SampleTest.xml"; "plain")]
    #[test_case("Admin::UsersTest" => "TEST-Admin__UsersTest.xml"; "namespaced")]
    #[test_case("tests/cart test.rb" => "TEST-tests_cart_test.rb.xml"; "path fallback")]
    #[test_case("a*b?c\"d<e>f|g\\h" => "TEST-a_b_c_d_e_f_g_h.xml"; "reserved characters")]
    fn artifact_names(suite_name: &str) -> String {
        artifact_file_name(suite_name)
    }
}
