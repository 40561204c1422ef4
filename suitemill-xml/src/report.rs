// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    DeserializeError, SerializeError, deserialize::deserialize_testsuite,
    serialize::serialize_testsuite,
};
use std::{io, time::Duration};

/// The root element of a suite report: the aggregate of all test outcomes for one unit.
///
/// Counts are derived from `testcases` and never stored separately.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Testsuite {
    /// The name of this testsuite.
    pub name: String,

    /// The overall time taken by the testsuite.
    ///
    /// This is serialized as the number of seconds, with millisecond precision.
    pub time: Duration,

    /// The testcases that form this testsuite, in the order they finished.
    pub testcases: Vec<Testcase>,

    /// Console output captured while the testsuite was executed.
    pub system_out: Output,
}

impl Testsuite {
    /// Creates a new, empty `Testsuite`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            time: Duration::ZERO,
            testcases: vec![],
            system_out: Output::new(""),
        }
    }

    /// Sets the time taken for the testsuite.
    pub fn set_time(&mut self, time: Duration) -> &mut Self {
        self.time = time;
        self
    }

    /// Adds a testcase to this testsuite.
    pub fn add_testcase(&mut self, testcase: Testcase) -> &mut Self {
        self.testcases.push(testcase);
        self
    }

    /// Sets the captured console output.
    pub fn set_system_out(&mut self, system_out: impl AsRef<str>) -> &mut Self {
        self.system_out = Output::new(system_out);
        self
    }

    /// Returns the number of tests in this suite.
    pub fn tests(&self) -> usize {
        self.testcases.len()
    }

    /// Returns the number of tests that failed in an expected way.
    pub fn failures(&self) -> usize {
        self.count_kind(NonSuccessKind::Failure)
    }

    /// Returns the number of tests that failed in an unexpected way.
    pub fn errors(&self) -> usize {
        self.count_kind(NonSuccessKind::Error)
    }

    /// Returns the number of tests that passed.
    pub fn passes(&self) -> usize {
        self.testcases
            .iter()
            .filter(|testcase| testcase.status.is_success())
            .count()
    }

    /// Serialize this suite to the given writer.
    pub fn serialize(&self, writer: impl io::Write) -> Result<(), SerializeError> {
        Ok(serialize_testsuite(self, writer)?)
    }

    /// Serialize this suite to a byte buffer.
    ///
    /// Serializing the same suite twice produces identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        let mut buf: Vec<u8> = vec![];
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    /// Parses a suite from an XML document previously produced by [`Self::serialize`].
    pub fn deserialize_str(xml: &str) -> Result<Self, DeserializeError> {
        deserialize_testsuite(xml)
    }

    fn count_kind(&self, kind: NonSuccessKind) -> usize {
        self.testcases
            .iter()
            .filter(|testcase| testcase.status.kind() == Some(kind))
            .count()
    }
}

/// Represents a single testcase.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Testcase {
    /// The full name of the test as reported by the runtime, e.g. `test_add(SampleTest)`.
    pub full_name: String,

    /// The class the test belongs to.
    pub classname: String,

    /// The short name of the test, derived from the full name.
    pub name: String,

    /// The owner declared on the unit. Empty if none was declared.
    pub owner: String,

    /// The development owner declared on the unit. Empty if none was declared.
    pub dev_owner: String,

    /// Comma-separated services declared on the unit.
    pub services: String,

    /// The path of the unit the test was loaded from.
    pub file_path: String,

    /// The case identifier(s) associated with this test, if any.
    pub tcid: Option<String>,

    /// The time it took to execute this testcase.
    pub time: Duration,

    /// The status of this test.
    pub status: TestcaseStatus,
}

impl Testcase {
    /// Creates a new testcase from its full name, deriving the class name and short name.
    pub fn new(full_name: impl Into<String>, status: TestcaseStatus) -> Self {
        let full_name = full_name.into();
        let (classname, name) = split_full_name(&full_name);
        Self {
            classname: classname.to_owned(),
            name: name.to_owned(),
            full_name,
            owner: String::new(),
            dev_owner: String::new(),
            services: String::new(),
            file_path: String::new(),
            tcid: None,
            time: Duration::ZERO,
            status,
        }
    }

    /// Sets the owner fields.
    pub fn set_owners(
        &mut self,
        owner: impl Into<String>,
        dev_owner: impl Into<String>,
    ) -> &mut Self {
        self.owner = owner.into();
        self.dev_owner = dev_owner.into();
        self
    }

    /// Sets the services field.
    pub fn set_services(&mut self, services: impl Into<String>) -> &mut Self {
        self.services = services.into();
        self
    }

    /// Sets the path of the unit this test came from.
    pub fn set_file_path(&mut self, file_path: impl Into<String>) -> &mut Self {
        self.file_path = file_path.into();
        self
    }

    /// Sets the case identifier(s) for this test.
    pub fn set_tcid(&mut self, tcid: impl Into<String>) -> &mut Self {
        self.tcid = Some(tcid.into());
        self
    }

    /// Sets the time taken for the testcase.
    pub fn set_time(&mut self, time: Duration) -> &mut Self {
        self.time = time;
        self
    }

    /// Returns the identifier used in summaries and diffs: `classname:name`.
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.classname, self.name)
    }
}

/// Splits a full test name like `test_add(SampleTest)` into `("SampleTest", "test_add")`.
///
/// Names without a trailing parenthesized class are attributed to a generic class.
pub fn split_full_name(full_name: &str) -> (&str, &str) {
    if let Some(without_paren) = full_name.strip_suffix(')') {
        if let Some(open) = without_paren.find('(') {
            let (name, class) = without_paren.split_at(open);
            let class = &class[1..];
            if !class.contains(['(', ')']) {
                let class = if class.is_empty() { "test suite" } else { class };
                return (class, name);
            }
        }
    }
    ("test", full_name)
}

/// Represents the success or failure of a testcase.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TestcaseStatus {
    /// This testcase passed.
    Success,

    /// This testcase did not pass.
    NonSuccess {
        /// Whether this testcase failed in an expected way (failure) or an unexpected way (error).
        kind: NonSuccessKind,

        /// The fault message.
        message: Option<String>,

        /// The "type" of fault that occurred.
        ty: Option<String>,

        /// The detail or trace for the fault.
        ///
        /// This is serialized and deserialized from a CDATA section inside the element.
        description: Option<String>,
    },
}

impl TestcaseStatus {
    /// Creates a new `TestcaseStatus` that represents a successful test.
    pub fn success() -> Self {
        TestcaseStatus::Success
    }

    /// Creates a new `TestcaseStatus` that represents an unsuccessful test.
    pub fn non_success(kind: NonSuccessKind) -> Self {
        TestcaseStatus::NonSuccess {
            kind,
            message: None,
            ty: None,
            description: None,
        }
    }

    /// Returns true if this test passed.
    pub fn is_success(&self) -> bool {
        matches!(self, TestcaseStatus::Success)
    }

    /// Returns the kind of non-success, or `None` for a success.
    pub fn kind(&self) -> Option<NonSuccessKind> {
        match self {
            TestcaseStatus::Success => None,
            TestcaseStatus::NonSuccess { kind, .. } => Some(*kind),
        }
    }

    /// Sets the message. No-op if this is a success case.
    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        if let TestcaseStatus::NonSuccess { message: m, .. } = self {
            *m = Some(message.into());
        }
        self
    }

    /// Sets the type. No-op if this is a success case.
    pub fn set_type(&mut self, ty: impl Into<String>) -> &mut Self {
        if let TestcaseStatus::NonSuccess { ty: t, .. } = self {
            *t = Some(ty.into());
        }
        self
    }

    /// Sets the description. No-op if this is a success case.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        if let TestcaseStatus::NonSuccess { description: d, .. } = self {
            *d = Some(description.into());
        }
        self
    }
}

/// The kind of a non-successful test.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NonSuccessKind {
    /// This is an expected failure, e.g. a failed assertion. Serialized as `failure`.
    Failure,

    /// This is an unexpected error, e.g. an exception. Serialized as `error`.
    Error,
}

impl NonSuccessKind {
    pub(crate) fn tag(self) -> &'static str {
        match self {
            NonSuccessKind::Failure => "failure",
            NonSuccessKind::Error => "error",
        }
    }
}

/// Represents console text captured during test execution.
///
/// # Encoding
///
/// Console output is typically a bytestring, but XML requires valid Unicode, and this type
/// definition reflects that.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Output {
    output: Box<str>,
}

impl Output {
    /// Creates a new output, removing any characters that are illegal in XML 1.0.
    pub fn new(output: impl AsRef<str>) -> Self {
        let output = output
            .as_ref()
            .replace(
                |c| matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f'),
                "",
            )
            .into_boxed_str();
        Self { output }
    }

    /// Returns the output.
    pub fn as_str(&self) -> &str {
        &self.output
    }
}

impl AsRef<str> for Output {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_full_name_cases() {
        assert_eq!(
            split_full_name("test_add(SampleTest)"),
            ("SampleTest", "test_add")
        );
        assert_eq!(split_full_name("test_add()"), ("test suite", "test_add"));
        assert_eq!(split_full_name("test_add"), ("test", "test_add"));
        assert_eq!(split_full_name("weird(a(b))"), ("test", "weird(a(b))"));
    }

    #[test]
    fn counts_are_derived() {
        let mut suite = Testsuite::new("SampleTest");
        suite.add_testcase(Testcase::new("a(SampleTest)", TestcaseStatus::success()));
        suite.add_testcase(Testcase::new(
            "b(SampleTest)",
            TestcaseStatus::non_success(NonSuccessKind::Failure),
        ));
        suite.add_testcase(Testcase::new(
            "c(SampleTest)",
            TestcaseStatus::non_success(NonSuccessKind::Error),
        ));
        assert_eq!(suite.tests(), 3);
        assert_eq!(suite.passes(), 1);
        assert_eq!(suite.failures(), 1);
        assert_eq!(suite.errors(), 1);
        assert_eq!(suite.testcases[1].identifier(), "SampleTest:b");
    }

    #[test]
    fn output_strips_control_characters() {
        let output = Output::new("a\x00b\x1bc\nd");
        assert_eq!(output.as_str(), "abc\nd");
    }
}
