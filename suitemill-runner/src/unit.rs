// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test units and the store that holds them.
//!
//! A [`TestUnit`] is one schedulable source artifact: a file declaring a single class with one or
//! more test methods. Units are produced by discovery (see [`crate::manifest`]), enriched with the
//! metadata declared for them, and are immutable from then on.

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use suitemill_metadata::UnitSummary;
use tracing::debug;

/// A unit as produced by discovery: its path and, if one could be resolved, its class name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscoveredUnit {
    /// The path to the unit, unique within a run.
    pub path: Utf8PathBuf,

    /// The class declared by the unit, if it could be resolved.
    pub class_name: Option<String>,
}

impl DiscoveredUnit {
    /// Creates a new `DiscoveredUnit`.
    pub fn new(path: impl Into<Utf8PathBuf>, class_name: Option<impl Into<String>>) -> Self {
        Self {
            path: path.into(),
            class_name: class_name.map(Into::into),
        }
    }
}

/// One schedulable unit of work, along with its declared metadata.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestUnit {
    /// The path to the unit. This is the key used for deduplication.
    pub path: Utf8PathBuf,

    /// The class declared by the unit. Units without a class name are never run.
    pub class_name: Option<String>,

    /// Lowercased group tags.
    pub groups: BTreeSet<String>,

    /// Lowercased priorities, or `None` if the unit doesn't declare any.
    pub priority: Option<Vec<String>>,

    /// Case identifiers, in declaration order.
    pub case_ids: Vec<String>,

    /// The owner of the unit.
    pub owner: Option<String>,

    /// The development owner of the unit.
    pub dev_owner: Option<String>,

    /// Services exercised by the unit.
    pub services: Vec<String>,

    /// Test methods declared by the unit. If empty, the runtime runs the unit as a whole.
    pub methods: Vec<String>,
}

impl TestUnit {
    /// Creates a unit with no declared metadata.
    pub fn new(discovered: DiscoveredUnit) -> Self {
        let DiscoveredUnit { path, class_name } = discovered;
        Self {
            path,
            class_name,
            groups: BTreeSet::new(),
            priority: None,
            case_ids: Vec::new(),
            owner: None,
            dev_owner: None,
            services: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Returns the name used for this unit's suite report: its class name, or its path if the
    /// class name is unresolved.
    pub fn suite_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or(self.path.as_str())
    }

    /// Returns the number of individually addressable test methods in this unit.
    ///
    /// A unit with no declared methods counts as a single test.
    pub fn method_count(&self) -> usize {
        self.methods.len().max(1)
    }

    /// Returns a serializable summary of this unit.
    pub fn to_summary(&self) -> UnitSummary {
        UnitSummary {
            path: self.path.clone(),
            class_name: self.suite_name().to_owned(),
            groups: self.groups.clone(),
            priority: self.priority.clone(),
            case_ids: self.case_ids.clone(),
            owner: self.owner.clone(),
            methods: self.methods.clone(),
        }
    }
}

/// Normalizes a group or priority name: trimmed and lowercased.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Holds every discovered unit, keyed by path, in discovery order.
#[derive(Clone, Debug, Default)]
pub struct MetadataStore {
    units: IndexMap<Utf8PathBuf, TestUnit>,
}

impl MetadataStore {
    /// Creates a new store from units in discovery order.
    ///
    /// If more than one unit has the same path, the first one wins.
    pub fn new(units: impl IntoIterator<Item = TestUnit>) -> Self {
        let mut store = Self::default();
        for unit in units {
            store.insert(unit);
        }
        store
    }

    /// Returns the number of units in the store.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Looks up a unit by path.
    pub fn get(&self, path: &Utf8Path) -> Option<&TestUnit> {
        self.units.get(path)
    }

    /// Iterates over units in discovery order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TestUnit> + '_ {
        self.units.values()
    }

    fn insert(&mut self, unit: TestUnit) {
        if self.units.contains_key(&unit.path) {
            debug!("ignoring duplicate entry for unit `{}`", unit.path);
            return;
        }
        self.units.insert(unit.path.clone(), unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;

    #[test]
    fn store_keeps_first_path() {
        let first = TestUnit {
            groups: btreeset! {"smoke".to_owned()},
            ..TestUnit::new(DiscoveredUnit::new("tests/login_test.rb", Some("LoginTest")))
        };
        let second = TestUnit::new(DiscoveredUnit::new(
            "tests/login_test.rb",
            Some("OtherLoginTest"),
        ));
        let third = TestUnit::new(DiscoveredUnit::new("tests/cart_test.rb", None::<String>));

        let store = MetadataStore::new([first.clone(), second, third]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(Utf8Path::new("tests/login_test.rb")), Some(&first));
        let paths: Vec<_> = store.iter().map(|unit| unit.path.as_str()).collect();
        assert_eq!(paths, ["tests/login_test.rb", "tests/cart_test.rb"]);
    }

    #[test]
    fn suite_name_falls_back_to_path() {
        let unit = TestUnit::new(DiscoveredUnit::new("tests/cart_test.rb", None::<String>));
        assert_eq!(unit.suite_name(), "tests/cart_test.rb");
        assert_eq!(unit.method_count(), 1);
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name("  Smoke "), "smoke");
    }
}
