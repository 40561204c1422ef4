// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use indoc::indoc;
use maplit::btreemap;
use std::{collections::BTreeMap, sync::LazyLock};
use suitemill_runner::{
    errors::UnitRunError,
    reporter::{Fault, OutcomeSink},
    runtime::{TestRuntime, WHOLE_UNIT_TEST_NAME},
    unit::TestUnit,
};

pub(crate) static MANIFEST: &str = indoc! {r#"
    [[unit]]
    path = "tests/login_test.rb"
    class-name = "LoginTest"
    groups = ["Smoke", "login"]
    priority = ["high"]
    tcids = [101, 102]
    owner = "alice"
    methods = ["test_login", "test_logout"]

    [[unit]]
    path = "tests/cart_test.rb"
    class-name = "CartTest"
    groups = ["smoke", "checkout"]
    priority = ["medium"]
    tcids = ["201"]
    methods = ["test_add", "test_remove"]

    [[unit]]
    path = "tests/search_test.rb"
    class-name = "SearchTest"
    groups = ["search"]
    tcids = [301]
    methods = ["test_query"]

    [[unit]]
    path = "tests/untracked_test.rb"
    class-name = "UntrackedTest"
    groups = ["smoke"]

    [[unit]]
    path = "tests/deprecated/legacy_test.rb"
    class-name = "LegacyTest"
    groups = ["smoke"]
    tcids = [401]
"#};

pub(crate) static OWNERSHIP_MAP: &str = indoc! {r#"
    accounts = ["LoginTest"]
    checkout = ["CartTest", "PaymentTest"]
"#};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum FixtureStatus {
    Pass,
    Fail,
    Error,
    /// Errors on the first run and passes on a rerun.
    Flaky,
}

type StatusMap = BTreeMap<(&'static str, &'static str), FixtureStatus>;

pub(crate) static FIXTURE_STATUSES: LazyLock<StatusMap> = LazyLock::new(|| {
    btreemap! {
        ("LoginTest", "test_login") => FixtureStatus::Pass,
        ("LoginTest", "test_logout") => FixtureStatus::Fail,
        ("CartTest", "test_add") => FixtureStatus::Pass,
        ("CartTest", "test_remove") => FixtureStatus::Flaky,
        ("SearchTest", "test_query") => FixtureStatus::Error,
    }
});

/// Replays [`FIXTURE_STATUSES`] through the outcome protocol.
#[derive(Debug)]
pub(crate) struct FixtureRuntime {
    rerun: bool,
}

impl FixtureRuntime {
    pub(crate) fn first_run() -> Self {
        Self { rerun: false }
    }

    pub(crate) fn rerun() -> Self {
        Self { rerun: true }
    }

    fn fault(&self, class_name: &str, method: &str) -> Option<Fault> {
        let status = FIXTURE_STATUSES
            .get(&(class_name, method))
            .copied()
            .unwrap_or(FixtureStatus::Pass);
        match status {
            FixtureStatus::Pass => None,
            FixtureStatus::Fail => Some(Fault::failure(
                format!("{method} failed"),
                "fixture_test.rb:10",
            )),
            FixtureStatus::Error => Some(
                Fault::error(format!("{method} raised"), "fixture_test.rb:20")
                    .with_type("RuntimeError"),
            ),
            FixtureStatus::Flaky if self.rerun => None,
            FixtureStatus::Flaky => Some(Fault::error(
                "connection reset",
                "]]> fixture_test.rb:30",
            )),
        }
    }
}

impl TestRuntime for FixtureRuntime {
    fn run_unit(&self, unit: &TestUnit, sink: &mut dyn OutcomeSink) -> Result<(), UnitRunError> {
        let class_name = unit.suite_name();
        sink.suite_started(unit)?;
        let methods: Vec<&str> = if unit.methods.is_empty() {
            vec![WHOLE_UNIT_TEST_NAME]
        } else {
            unit.methods.iter().map(String::as_str).collect()
        };
        for method in methods {
            sink.test_started(method)?;
            if let Some(fault) = self.fault(class_name, method) {
                sink.add_fault(fault)?;
            }
            sink.test_finished(method)?;
        }
        sink.suite_finished(unit, &format!("ran {}\n", unit.path))?;
        Ok(())
    }
}

pub(crate) fn write_file(dir: &Utf8Path, name: &str, contents: &str) -> camino::Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("fixture file written");
    path
}
