// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comparing a run with its rerun.
//!
//! Given the results of a run and of a rerun of (some of) its failures, a test that fails in both
//! is a persistent failure, and a test that fails in the first and passes in the second is a
//! transient one.

use crate::{
    errors::WriteSummaryError,
    ownership::OwnershipMap,
    reporter::OutcomeStatus,
    results::ResultSet,
    summary::write_summary_files,
};
use camino::Utf8Path;
use std::collections::BTreeSet;
use swrite::{SWrite, swriteln};

/// Failures in a run, classified by their outcome in a rerun.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiffSummary {
    /// Tests that failed or errored in both runs.
    pub persistent: BTreeSet<String>,

    /// Tests that failed or errored in the first run and passed in the rerun.
    pub transient: BTreeSet<String>,

    /// The number of tests that failed or errored in the rerun.
    pub rerun_failures: usize,

    /// The number of tests in the first run.
    pub total: usize,
}

/// Classifies the failures in `run_x` by their outcome in `run_y`.
///
/// Failing tests in `run_x` that were not rerun appear in neither set.
pub fn diff(run_x: &ResultSet, run_y: &ResultSet) -> DiffSummary {
    let failing_y = run_y.failing_identifiers();
    let passing_y: BTreeSet<_> = run_y.identifiers(OutcomeStatus::Pass).into_iter().collect();

    let mut persistent = BTreeSet::new();
    let mut transient = BTreeSet::new();
    for id in run_x.failing_identifiers() {
        if failing_y.contains(&id) {
            persistent.insert(id);
        } else if passing_y.contains(&id) {
            transient.insert(id);
        }
    }

    DiffSummary {
        persistent,
        transient,
        rerun_failures: run_y
            .records()
            .iter()
            .filter(|record| record.status.is_failing())
            .count(),
        total: run_x.total(),
    }
}

impl DiffSummary {
    /// Returns the detailed diff.
    pub fn body(&self) -> String {
        let mut body = String::new();
        swriteln!(body, "Persistent failures/errors ({}):", self.persistent.len());
        for id in &self.persistent {
            swriteln!(body, "   {id}");
        }
        swriteln!(body, "\nTransient failures/errors: ({}):", self.transient.len());
        for id in &self.transient {
            swriteln!(body, "   {id}");
        }
        body
    }

    /// Returns the detailed diff, with persistent failures grouped by owning team.
    pub fn body_by_owner(&self, map: &OwnershipMap) -> String {
        let mut body = String::new();
        swriteln!(body, "Persistent failures/errors ({}):", self.persistent.len());
        map.bucket(self.persistent.iter().map(String::as_str))
            .render_to(&mut body);
        swriteln!(body, "\nTransient failures/errors: ({}):", self.transient.len());
        for id in &self.transient {
            swriteln!(body, "   {id}");
        }
        body
    }

    /// Returns the one-line diff: `<rerun failures>/<total> failed (after rerun)`.
    pub fn bottom_line(&self) -> String {
        format!(
            "{}/{} failed (after rerun)",
            self.rerun_failures, self.total
        )
    }

    /// Writes `result_summary.log` and `bottom_line.log` into the directory.
    pub fn write_to(
        &self,
        dir: &Utf8Path,
        ownership: Option<&OwnershipMap>,
    ) -> Result<(), WriteSummaryError> {
        let body = match ownership {
            Some(map) => self.body_by_owner(map),
            None => self.body(),
        };
        write_summary_files(dir, &body, &self.bottom_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::TestRecord;
    use indoc::indoc;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use test_strategy::proptest;

    fn record(classname: &str, name: &str, status: OutcomeStatus) -> TestRecord {
        TestRecord {
            classname: classname.to_owned(),
            name: name.to_owned(),
            file_path: None,
            status,
        }
    }

    fn status_strategy() -> impl Strategy<Value = OutcomeStatus> {
        prop_oneof![
            Just(OutcomeStatus::Pass),
            Just(OutcomeStatus::Fail),
            Just(OutcomeStatus::Error),
        ]
    }

    #[test]
    fn foo_transient_bar_persistent() {
        let run_x: ResultSet = [
            record("Suite", "foo", OutcomeStatus::Fail),
            record("Suite", "bar", OutcomeStatus::Error),
            record("Suite", "baz", OutcomeStatus::Pass),
        ]
        .into_iter()
        .collect();
        let run_y: ResultSet = [
            record("Suite", "foo", OutcomeStatus::Pass),
            record("Suite", "bar", OutcomeStatus::Error),
        ]
        .into_iter()
        .collect();

        let summary = diff(&run_x, &run_y);
        assert_eq!(summary.persistent, btreeset! {"Suite:bar".to_owned()});
        assert_eq!(summary.transient, btreeset! {"Suite:foo".to_owned()});
        assert_eq!(
            summary.body(),
            indoc! {"
                Persistent failures/errors (1):
                   Suite:bar

                Transient failures/errors: (1):
                   Suite:foo
            "}
        );
        assert_eq!(summary.bottom_line(), "1/3 failed (after rerun)");

        let map = OwnershipMap::new([("search", ["Suite"])]);
        assert_eq!(
            summary.body_by_owner(&map),
            "Persistent failures/errors (1):\n\
             \n\tSEARCH - 1 failures / 1\n\n\
             \t\tSuite:bar\n\
             \nTransient failures/errors: (1):\n   \
             Suite:foo\n"
        );
    }

    #[proptest]
    fn persistent_and_transient_follow_rerun_outcome(
        #[strategy(proptest::collection::btree_map(
            "[a-e]",
            (status_strategy(), proptest::option::of(status_strategy())),
            0..5,
        ))]
        outcomes: BTreeMap<String, (OutcomeStatus, Option<OutcomeStatus>)>,
    ) {
        let run_x: ResultSet = outcomes
            .iter()
            .map(|(name, (x, _))| record("Suite", name, *x))
            .collect();
        let run_y: ResultSet = outcomes
            .iter()
            .filter_map(|(name, (_, y))| y.map(|y| record("Suite", name, y)))
            .collect();

        let summary = diff(&run_x, &run_y);
        prop_assert!(summary.persistent.is_disjoint(&summary.transient));
        for (name, (x, y)) in &outcomes {
            let id = format!("Suite:{name}");
            let expected_persistent = x.is_failing() && y.is_some_and(OutcomeStatus::is_failing);
            let expected_transient = x.is_failing() && *y == Some(OutcomeStatus::Pass);
            prop_assert_eq!(summary.persistent.contains(&id), expected_persistent);
            prop_assert_eq!(summary.transient.contains(&id), expected_transient);
        }
        prop_assert_eq!(summary.total, outcomes.len());
    }
}
