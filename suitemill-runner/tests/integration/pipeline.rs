// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, ensure};
use indoc::indoc;
use maplit::btreeset;
use pretty_assertions::assert_eq;
use std::num::NonZeroUsize;
use suitemill_runner::{
    diff::diff,
    manifest::UnitManifest,
    ownership::OwnershipMap,
    reporter::{ReportWriter, RunEvent},
    results::ResultSet,
    runner::TestRunner,
    summary::{BOTTOM_LINE_FILE_NAME, RunSummary, SUMMARY_FILE_NAME},
    test_filter::{SelectionCriteria, UnitFilter},
};
use suitemill_xml::{TestcaseStatus, Testsuite};

const TWO_WORKERS: NonZeroUsize = NonZeroUsize::new(2).expect("2 is non-zero");

#[test]
fn select_run_summarize_and_diff() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let manifest_path = write_file(dir.path(), "suitemill-units.toml", MANIFEST);
    let store = UnitManifest::from_path(&manifest_path)?.into_store();
    assert_eq!(store.len(), 4, "the unit under tests/deprecated is dropped");

    let criteria = SelectionCriteria::parse("smoke", "")?;
    let mut selection = UnitFilter::new(criteria).select(&store)?;
    let selected: Vec<_> = selection.units.iter().map(|unit| unit.path.as_str()).collect();
    assert_eq!(selected, ["tests/login_test.rb", "tests/cart_test.rb"]);
    assert_eq!(selection.method_count(), 4);
    assert_eq!(
        selection.case_ids(),
        btreeset! {"101".to_owned(), "102".to_owned(), "201".to_owned()}
    );
    assert_eq!(selection.skip_counts().missing_case_ids, 1);
    assert_eq!(selection.skip_counts().group_mismatch, 1);

    // First run.
    let first_dir = dir.path().join("first");
    std::fs::create_dir(&first_dir)?;
    let runtime = FixtureRuntime::first_run();
    let runner = TestRunner::new(&runtime, ReportWriter::new(&first_dir), TWO_WORKERS);
    let mut finished_units = 0;
    let completion = runner.execute(selection.units.clone(), |event| {
        if let RunEvent::UnitFinished { .. } = event {
            finished_units += 1;
        }
    })?;
    assert_eq!(finished_units, 2);
    assert_eq!(completion.completed.len(), 2);
    assert!(completion.crashed.is_empty());
    assert!(completion.never_started.is_empty());
    assert!(!completion.is_success());

    // Reports read back from disk match what was recorded in memory.
    for report in &completion.completed {
        let path = first_dir.join(format!("TEST-{}.xml", report.suite_name));
        let suite = Testsuite::deserialize_str(&std::fs::read_to_string(&path)?)?;
        ensure!(
            (suite.tests(), suite.failures(), suite.errors())
                == (report.test_count(), report.failures(), report.errors()),
            "counts for {path} match the in-memory report"
        );
    }

    let first = ResultSet::from_path(&first_dir)?;
    let summary = RunSummary::from_results(&first);
    assert_eq!(summary, RunSummary::from_reports(&completion.completed));
    assert_eq!(
        summary.body(),
        indoc! {"
            Tests Executed: 4
            Passed: 2
            Failed: 1
            Error: 1
            50.00% Passed

            Failed/Errored Tests:
               CartTest:test_remove
               LoginTest:test_logout
        "}
    );
    summary.write_to(&first_dir, None)?;
    assert_eq!(
        std::fs::read_to_string(first_dir.join(BOTTOM_LINE_FILE_NAME))?,
        "2/4 failed"
    );

    // Rerun only the failing methods.
    selection.restrict_to_failed(&first.failed_methods());
    assert_eq!(selection.method_count(), 2);

    let second_dir = dir.path().join("second");
    std::fs::create_dir(&second_dir)?;
    let runtime = FixtureRuntime::rerun();
    let runner = TestRunner::new(&runtime, ReportWriter::new(&second_dir), TWO_WORKERS);
    runner.execute(selection.units, |_| {})?;

    let second = ResultSet::from_path(&second_dir)?;
    assert_eq!(second.total(), 2);

    let diff_summary = diff(&first, &second);
    assert_eq!(
        diff_summary.persistent,
        btreeset! {"LoginTest:test_logout".to_owned()}
    );
    assert_eq!(
        diff_summary.transient,
        btreeset! {"CartTest:test_remove".to_owned()}
    );
    assert_eq!(diff_summary.bottom_line(), "1/4 failed (after rerun)");

    let ownership = OwnershipMap::parse(OWNERSHIP_MAP)?;
    diff_summary.write_to(&second_dir, Some(&ownership))?;
    assert_eq!(
        std::fs::read_to_string(second_dir.join(SUMMARY_FILE_NAME))?,
        "Persistent failures/errors (1):\n\
         \n\tACCOUNTS - 1 failures / 1\n\n\
         \t\tLoginTest:test_logout\n\
         \nTransient failures/errors: (1):\n   \
         CartTest:test_remove\n"
    );

    Ok(())
}

#[test]
fn reports_preserve_raw_text() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let store = UnitManifest::parse(Utf8Path::new("units.toml"), MANIFEST)?.into_store();
    let selection =
        UnitFilter::new(SelectionCriteria::parse("checkout", "medium")?).select(&store)?;
    assert_eq!(selection.units.len(), 1);

    let runtime = FixtureRuntime::first_run();
    let writer = ReportWriter::new(dir.path());
    let completion = TestRunner::new(&runtime, writer.clone(), NonZeroUsize::MIN)
        .execute(selection.units, |_| {})?;
    let [report] = completion.completed.as_slice() else {
        panic!("expected a single report, found {:?}", completion.completed);
    };

    let path = writer.artifact_path(&report.suite_name);
    let first_bytes = std::fs::read(&path)?;
    writer.write(report)?;
    assert_eq!(
        std::fs::read(&path)?,
        first_bytes,
        "rewriting a closed report is byte-identical"
    );

    let suite = Testsuite::deserialize_str(std::str::from_utf8(&first_bytes)?)?;
    assert_eq!(suite.system_out.as_str(), "ran tests/cart_test.rb\n");
    let remove = suite
        .testcases
        .iter()
        .find(|testcase| testcase.name == "test_remove")
        .expect("test_remove is recorded");
    match &remove.status {
        TestcaseStatus::NonSuccess { description, .. } => {
            // The CDATA terminator is escaped on the way out.
            assert_eq!(description.as_deref(), Some("]]&gt; fixture_test.rb:30"));
        }
        TestcaseStatus::Success => panic!("test_remove should have errored"),
    }
    assert_eq!(remove.tcid.as_deref(), Some("201"));
    Ok(())
}
