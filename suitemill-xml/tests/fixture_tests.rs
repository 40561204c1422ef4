// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use pretty_assertions::assert_eq;
use std::time::Duration;
use suitemill_xml::{NonSuccessKind, Testcase, TestcaseStatus, Testsuite};

#[test]
fn basic_suite_reads_back() {
    let suite = basic_suite();
    let bytes = suite.to_bytes().expect("serializing basic_suite succeeds");
    let xml = String::from_utf8(bytes).expect("output is UTF-8");

    assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(
        xml.contains(r#"<testsuite name="SampleTest" tests="3" failures="1" errors="1" time="42.234">"#),
        "unexpected header in:\n{xml}"
    );
    assert!(xml.contains(r#"tcid="1234""#));
    assert!(xml.ends_with("</testsuite>\n"));

    let parsed = Testsuite::deserialize_str(&xml).expect("parsing basic_suite succeeds");
    assert_eq!(parsed, suite);
}

#[test]
fn serialization_is_deterministic() {
    let suite = basic_suite();
    let first = suite.to_bytes().expect("first serialization succeeds");
    let second = suite.to_bytes().expect("second serialization succeeds");
    assert_eq!(first, second);

    // Re-serializing a parsed document produces the same bytes.
    let parsed = Testsuite::deserialize_str(std::str::from_utf8(&first).expect("UTF-8"))
        .expect("parse succeeds");
    assert_eq!(parsed.to_bytes().expect("third serialization succeeds"), first);
}

#[test]
fn cdata_terminator_in_trace_stays_well_formed() {
    let mut suite = Testsuite::new("Tricky");
    let mut status = TestcaseStatus::non_success(NonSuccessKind::Failure);
    status
        .set_message("assert <a> & \"b\"")
        .set_description("expected ]]> to be quoted");
    suite.add_testcase(Testcase::new("test_trace(Tricky)", status));
    suite.set_system_out("log line ]]> more");

    let bytes = suite.to_bytes().expect("serializing succeeds");
    let xml = String::from_utf8(bytes).expect("output is UTF-8");
    assert_eq!(xml.matches("]]>").count(), 2, "only CDATA closers remain:\n{xml}");

    let parsed = Testsuite::deserialize_str(&xml).expect("output is well-formed");
    assert_eq!(parsed.failures(), 1);
    assert_eq!(parsed.system_out.as_str(), "log line ]]&gt; more");
    match &parsed.testcases[0].status {
        TestcaseStatus::NonSuccess {
            message,
            description,
            ..
        } => {
            assert_eq!(message.as_deref(), Some("assert <a> & \"b\""));
            assert_eq!(description.as_deref(), Some("expected ]]&gt; to be quoted"));
        }
        other => panic!("expected failure, found {other:?}"),
    }
}

#[test]
fn empty_suite_has_zero_counts() {
    let suite = Testsuite::new("Empty");
    let bytes = suite.to_bytes().expect("serializing succeeds");
    let xml = String::from_utf8(bytes).expect("output is UTF-8");
    assert!(xml.contains(r#"tests="0" failures="0" errors="0" time="0.000""#));

    let parsed = Testsuite::deserialize_str(&xml).expect("parse succeeds");
    assert_eq!(parsed.tests(), 0);
    assert_eq!(parsed.system_out.as_str(), "");
}

fn basic_suite() -> Testsuite {
    let mut suite = Testsuite::new("SampleTest");
    suite.set_time(Duration::new(42, 234_000_000));

    let mut testcase = Testcase::new("test_add(SampleTest)", TestcaseStatus::success());
    testcase
        .set_owners("alice", "bob")
        .set_services("auth,billing")
        .set_file_path("tests/sample_test.rb")
        .set_tcid("1234")
        .set_time(Duration::from_millis(1500));
    suite.add_testcase(testcase);

    let mut status = TestcaseStatus::non_success(NonSuccessKind::Failure);
    status
        .set_message("expected 2, got 3")
        .set_type("AssertionError")
        .set_description("sample_test.rb:12: in `test_sub'");
    let mut testcase = Testcase::new("test_sub(SampleTest)", status);
    testcase
        .set_owners("alice", "bob")
        .set_file_path("tests/sample_test.rb")
        .set_time(Duration::from_millis(4242));
    suite.add_testcase(testcase);

    let mut status = TestcaseStatus::non_success(NonSuccessKind::Error);
    status.set_message("RuntimeError: boom");
    let mut testcase = Testcase::new("test_mul(SampleTest)", status);
    testcase.set_file_path("tests/sample_test.rb");
    suite.add_testcase(testcase);

    suite.set_system_out("running SampleTest\n3 tests, 1 failure, 1 error\n");
    suite
}
