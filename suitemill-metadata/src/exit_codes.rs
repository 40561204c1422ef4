// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `suitemill` failures.
///
/// `suitemill` runs may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum SuitemillExitCode {}

impl SuitemillExitCode {
    /// No errors occurred and suitemill exited normally.
    pub const OK: i32 = 0;

    /// One or more tests failed or errored, or a unit crashed its worker.
    ///
    /// This matches the exit code automation built around the suite runner has always checked.
    pub const TEST_RUN_FAILED: i32 = 10;

    /// A user issue happened while setting up a suitemill invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// A group spec failed to parse.
    pub const INVALID_GROUP_SPEC: i32 = 94;

    /// Selection found an ambiguous duplicate class among the units scheduled to run.
    pub const SELECTION_FAILED: i32 = 104;

    /// A test runtime violated the suite event protocol.
    pub const PROTOCOL_VIOLATION: i32 = 105;

    /// A report artifact or summary file could not be written.
    pub const WRITE_REPORT_ERROR: i32 = 110;
}
