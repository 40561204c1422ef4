// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parse a `Testsuite` back from XML.

use crate::{
    DeserializeError, NonSuccessKind, Output, Testcase, TestcaseStatus, Testsuite,
    serialize::{TESTCASE_TAG, TESTSUITE_TAG},
};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::time::Duration;

/// Where the reader currently is, for routing text and CDATA events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TextTarget {
    None,
    Fault,
    SystemOut,
}

#[derive(Debug, Default)]
struct DeclaredCounts {
    tests: Option<usize>,
    failures: Option<usize>,
    errors: Option<usize>,
}

pub(crate) fn deserialize_testsuite(xml: &str) -> Result<Testsuite, DeserializeError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut testsuite: Option<Testsuite> = None;
    let mut declared = DeclaredCounts::default();
    let mut current: Option<Testcase> = None;
    let mut target = TextTarget::None;
    let mut system_out = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"testsuite" => {
                    let (suite, counts) = read_testsuite(&e)?;
                    testsuite = Some(suite);
                    declared = counts;
                }
                b"testcase" => {
                    current = Some(read_testcase(&e)?);
                }
                b"failure" | b"error" => {
                    if let Some(testcase) = current.as_mut() {
                        testcase.status = read_fault(&e)?;
                        target = TextTarget::Fault;
                    }
                }
                b"system-out" => {
                    target = TextTarget::SystemOut;
                }
                // Unknown elements (e.g. `steps` from older writers) are skipped.
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"testcase" => {
                    let testcase = read_testcase(&e)?;
                    push_testcase(testsuite.as_mut(), testcase)?;
                }
                b"failure" | b"error" => {
                    if let Some(testcase) = current.as_mut() {
                        testcase.status = read_fault(&e)?;
                    }
                }
                _ => {}
            },
            Event::CData(cdata) => {
                let text = String::from_utf8_lossy(&cdata);
                route_text(&text, target, current.as_mut(), &mut system_out);
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                route_text(&text, target, current.as_mut(), &mut system_out);
            }
            Event::End(e) => match e.name().as_ref() {
                b"testcase" => {
                    if let Some(testcase) = current.take() {
                        push_testcase(testsuite.as_mut(), testcase)?;
                    }
                }
                b"failure" | b"error" | b"system-out" => {
                    target = TextTarget::None;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let mut testsuite = testsuite.ok_or(DeserializeError::MissingTestsuite)?;
    testsuite.system_out = Output::new(system_out);
    check_count("tests", declared.tests, testsuite.tests())?;
    check_count("failures", declared.failures, testsuite.failures())?;
    check_count("errors", declared.errors, testsuite.errors())?;
    Ok(testsuite)
}

fn push_testcase(
    testsuite: Option<&mut Testsuite>,
    testcase: Testcase,
) -> Result<(), DeserializeError> {
    let testsuite = testsuite.ok_or(DeserializeError::MissingTestsuite)?;
    testsuite.add_testcase(testcase);
    Ok(())
}

fn route_text(
    text: &str,
    target: TextTarget,
    current: Option<&mut Testcase>,
    system_out: &mut String,
) {
    match target {
        TextTarget::Fault => {
            if let Some(testcase) = current {
                let existing = match &testcase.status {
                    TestcaseStatus::NonSuccess {
                        description: Some(description),
                        ..
                    } => description.clone(),
                    _ => String::new(),
                };
                testcase.status.set_description(existing + text);
            }
        }
        TextTarget::SystemOut => system_out.push_str(text),
        TextTarget::None => {}
    }
}

fn check_count(
    kind: &'static str,
    declared: Option<usize>,
    actual: usize,
) -> Result<(), DeserializeError> {
    match declared {
        Some(declared) if declared != actual => Err(DeserializeError::CountMismatch {
            kind,
            declared,
            actual,
        }),
        _ => Ok(()),
    }
}

fn read_testsuite(e: &BytesStart<'_>) -> Result<(Testsuite, DeclaredCounts), DeserializeError> {
    let mut name = None;
    let mut time = Duration::ZERO;
    let mut counts = DeclaredCounts::default();

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"name" => name = Some(value.into_owned()),
            b"tests" => counts.tests = Some(parse_count("tests", &value)?),
            b"failures" => counts.failures = Some(parse_count("failures", &value)?),
            b"errors" => counts.errors = Some(parse_count("errors", &value)?),
            b"time" => time = parse_time(&value)?,
            _ => {}
        }
    }

    let name = name.ok_or(DeserializeError::MissingAttribute {
        element: TESTSUITE_TAG,
        attribute: "name",
    })?;
    let mut testsuite = Testsuite::new(name);
    testsuite.set_time(time);
    Ok((testsuite, counts))
}

fn read_testcase(e: &BytesStart<'_>) -> Result<Testcase, DeserializeError> {
    let mut full_name = None;
    let mut classname = None;
    let mut name = None;
    let mut owner = String::new();
    let mut dev_owner = String::new();
    let mut services = String::new();
    let mut file_path = String::new();
    let mut tcid = None;
    let mut time = Duration::ZERO;

    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.as_ref() {
            b"full_name" => full_name = Some(value),
            b"classname" => classname = Some(value),
            b"name" => name = Some(value),
            b"owner" => owner = value,
            b"dev_owner" => dev_owner = value,
            b"services" => services = value,
            b"file_path" => file_path = value,
            b"tcid" => tcid = Some(value),
            b"time" => time = parse_time(&value)?,
            _ => {}
        }
    }

    // Reports from other JUnit writers may only carry `name` and `classname`.
    let full_name = match (full_name, &name, &classname) {
        (Some(full_name), _, _) => full_name,
        (None, Some(name), Some(classname)) => format!("{name}({classname})"),
        (None, Some(name), None) => name.clone(),
        (None, None, _) => {
            return Err(DeserializeError::MissingAttribute {
                element: TESTCASE_TAG,
                attribute: "name",
            });
        }
    };

    let mut testcase = Testcase::new(full_name, TestcaseStatus::success());
    if let Some(classname) = classname {
        testcase.classname = classname;
    }
    if let Some(name) = name {
        testcase.name = name;
    }
    testcase
        .set_owners(owner, dev_owner)
        .set_services(services)
        .set_file_path(file_path)
        .set_time(time);
    if let Some(tcid) = tcid {
        testcase.set_tcid(tcid);
    }
    Ok(testcase)
}

fn read_fault(e: &BytesStart<'_>) -> Result<TestcaseStatus, DeserializeError> {
    let kind = match e.name().as_ref() {
        b"error" => NonSuccessKind::Error,
        _ => NonSuccessKind::Failure,
    };
    let mut status = TestcaseStatus::non_success(kind);
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"message" => {
                status.set_message(value);
            }
            b"type" => {
                status.set_type(value);
            }
            _ => {}
        }
    }
    Ok(status)
}

fn parse_count(attribute: &'static str, value: &str) -> Result<usize, DeserializeError> {
    value
        .trim()
        .parse()
        .map_err(|_| DeserializeError::InvalidAttribute {
            attribute,
            value: value.to_owned(),
        })
}

fn parse_time(value: &str) -> Result<Duration, DeserializeError> {
    match value.trim().parse::<f64>() {
        // Times are written with millisecond precision, so read them back the same way.
        Ok(secs) if secs.is_finite() && secs >= 0.0 => {
            Ok(Duration::from_millis((secs * 1000.0).round() as u64))
        }
        _ => Err(DeserializeError::InvalidAttribute {
            attribute: "time",
            value: value.to_owned(),
        }),
    }
}
