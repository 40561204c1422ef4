// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selection of units to run.
//!
//! A [`UnitFilter`] decides, for every unit in a [`MetadataStore`], whether it should run given
//! the requested groups, the requested priority and the excluded groups. Units must also resolve
//! to a class name and declare strictly numeric case identifiers to be runnable.
//!
//! Exclusion always takes precedence: a unit in any excluded group is never selected, whatever
//! the match mode.

use crate::{
    errors::{GroupSpecParseError, SelectionError},
    reporter::artifact_file_name,
    results::FailedMethods,
    runtime::WHOLE_UNIT_TEST_NAME,
    unit::{MetadataStore, TestUnit, normalize_name},
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};
use suitemill_metadata::{SelectionSummary, SkipCounts};
use tracing::{debug, info};

/// The reserved priority value that matches every priority.
pub const ALL_PRIORITIES: &str = "all";

/// How requested groups are matched against a unit's groups.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MatchMode {
    /// The unit must be in every requested group.
    #[default]
    And,

    /// The unit must be in at least one requested group.
    Or,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::And => write!(f, "and"),
            MatchMode::Or => write!(f, "or"),
        }
    }
}

/// Criteria that decide which units are selected.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SelectionCriteria {
    /// Groups requested for this run. Empty matches every unit.
    pub requested_groups: BTreeSet<String>,

    /// Units in any of these groups are never selected.
    pub excluded_groups: BTreeSet<String>,

    /// The requested priority. The empty string and [`ALL_PRIORITIES`] match every priority.
    pub requested_priority: String,

    /// How `requested_groups` is matched.
    pub match_mode: MatchMode,
}

impl SelectionCriteria {
    /// Parses a group spec and a priority into criteria.
    ///
    /// The group spec is split on `,` and `+`. Each entry is trimmed and lowercased. The markers
    /// `[AND]` (the default) and `[OR]` set the match mode, and a `[NOT]` prefix on an entry moves
    /// that group to the excluded set.
    pub fn parse(group_spec: &str, priority: &str) -> Result<Self, GroupSpecParseError> {
        let mut criteria = Self {
            requested_priority: normalize_name(priority),
            ..Self::default()
        };
        let mut saw_and = false;
        let mut saw_or = false;

        for entry in group_spec.split([',', '+']) {
            let mut entry = entry.trim();
            // Markers may prefix a group name, e.g. "[OR] smoke".
            while let Some(rest) = entry.strip_prefix('[') {
                let Some((marker, remainder)) = rest.split_once(']') else {
                    return Err(GroupSpecParseError::UnknownMarker {
                        input: group_spec.to_owned(),
                        marker: entry.to_owned(),
                    });
                };
                match marker.trim().to_ascii_uppercase().as_str() {
                    "AND" => saw_and = true,
                    "OR" => saw_or = true,
                    "NOT" => {
                        let group = normalize_name(remainder);
                        if group.is_empty() || group.starts_with('[') {
                            return Err(GroupSpecParseError::EmptyExclusion {
                                input: group_spec.to_owned(),
                            });
                        }
                        criteria.excluded_groups.insert(group);
                        entry = "";
                        break;
                    }
                    _ => {
                        return Err(GroupSpecParseError::UnknownMarker {
                            input: group_spec.to_owned(),
                            marker: format!("[{marker}]"),
                        });
                    }
                }
                entry = remainder.trim();
            }

            let group = normalize_name(entry);
            if !group.is_empty() {
                criteria.requested_groups.insert(group);
            }
        }

        if saw_and && saw_or {
            return Err(GroupSpecParseError::ConflictingMarkers {
                input: group_spec.to_owned(),
            });
        }
        if saw_or {
            criteria.match_mode = MatchMode::Or;
        }
        Ok(criteria)
    }

    /// Adds groups that are always excluded, such as `deprecated`.
    pub fn exclude_groups<I, S>(&mut self, groups: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_groups.extend(
            groups
                .into_iter()
                .map(|group| normalize_name(group.as_ref()))
                .filter(|group| !group.is_empty()),
        );
        self
    }

    /// Returns true if every priority was requested.
    pub fn is_any_priority(&self) -> bool {
        self.requested_priority.is_empty() || self.requested_priority == ALL_PRIORITIES
    }
}

/// Filters units by [`SelectionCriteria`].
#[derive(Clone, Debug)]
pub struct UnitFilter {
    criteria: SelectionCriteria,
    detect_duplicates: bool,
}

impl UnitFilter {
    /// Creates a new filter. Duplicate class detection is on by default.
    pub fn new(criteria: SelectionCriteria) -> Self {
        Self {
            criteria,
            detect_duplicates: true,
        }
    }

    /// Sets whether selecting a unit whose class name is shared with another unit is an error.
    pub fn set_detect_duplicates(&mut self, detect_duplicates: bool) -> &mut Self {
        self.detect_duplicates = detect_duplicates;
        self
    }

    /// Returns the criteria for this filter.
    pub fn criteria(&self) -> &SelectionCriteria {
        &self.criteria
    }

    /// Returns an enum describing whether this unit matches the filter.
    pub fn filter_match(&self, unit: &TestUnit) -> FilterMatch {
        let criteria = &self.criteria;

        if unit.class_name.is_none() {
            return FilterMatch::mismatch(MismatchReason::Unresolved);
        }
        if !unit.groups.is_disjoint(&criteria.excluded_groups) {
            return FilterMatch::mismatch(MismatchReason::ExcludedGroup);
        }
        if unit.case_ids.is_empty() {
            return FilterMatch::mismatch(MismatchReason::MissingCaseIds);
        }
        if !unit.case_ids.iter().all(|id| is_numeric_case_id(id)) {
            return FilterMatch::mismatch(MismatchReason::InvalidCaseIds);
        }
        if !criteria.is_any_priority() {
            match &unit.priority {
                None => return FilterMatch::mismatch(MismatchReason::MissingPriority),
                Some(priorities) => {
                    if !priorities.contains(&criteria.requested_priority) {
                        return FilterMatch::mismatch(MismatchReason::PriorityMismatch);
                    }
                }
            }
        }

        let groups_match = criteria.requested_groups.is_empty()
            || match criteria.match_mode {
                MatchMode::And => criteria.requested_groups.is_subset(&unit.groups),
                MatchMode::Or => !criteria.requested_groups.is_disjoint(&unit.groups),
            };
        if groups_match {
            FilterMatch::Matches
        } else {
            FilterMatch::mismatch(MismatchReason::GroupMismatch)
        }
    }

    /// Selects units from the store, preserving discovery order.
    ///
    /// Returns an error if duplicate detection is on and a selected unit shares its class name
    /// with another unit in the store.
    pub fn select(&self, store: &MetadataStore) -> Result<Selection, SelectionError> {
        info!(
            "selecting units: groups [{}] ({}), excluded [{}], priority `{}`",
            self.criteria.requested_groups.iter().join(", "),
            self.criteria.match_mode,
            self.criteria.excluded_groups.iter().join(", "),
            if self.criteria.is_any_priority() {
                ALL_PRIORITIES
            } else {
                self.criteria.requested_priority.as_str()
            },
        );

        let mut selection = Selection::new(self.criteria.clone(), store);
        for unit in store.iter() {
            match self.filter_match(unit) {
                FilterMatch::Matches => selection.units.push(unit.clone()),
                FilterMatch::Mismatch { reason } => {
                    debug!("skipping `{}`: {}", unit.path, reason);
                    selection.skipped.push((unit.path.clone(), reason));
                }
            }
        }

        self.finish(selection)
    }

    /// Selects exactly the units at the given paths, in the order given.
    ///
    /// Group, priority and case identifier filtering doesn't apply. Paths that aren't in the store
    /// are recorded in [`Selection::unknown_paths`], and units without a class name are skipped.
    pub fn select_paths<'a>(
        &self,
        store: &MetadataStore,
        paths: impl IntoIterator<Item = &'a Utf8Path>,
    ) -> Result<Selection, SelectionError> {
        let mut selection = Selection::new(self.criteria.clone(), store);
        let mut seen = BTreeSet::new();
        for path in paths {
            if !seen.insert(path) {
                continue;
            }
            match store.get(path) {
                Some(unit) if unit.class_name.is_some() => selection.units.push(unit.clone()),
                Some(unit) => {
                    debug!("skipping `{}`: {}", unit.path, MismatchReason::Unresolved);
                    selection
                        .skipped
                        .push((unit.path.clone(), MismatchReason::Unresolved));
                }
                None => {
                    debug!("skipping `{path}`: not in the unit manifest");
                    selection.unknown_paths.push(path.to_owned());
                }
            }
        }

        self.finish(selection)
    }

    fn finish(&self, selection: Selection) -> Result<Selection, SelectionError> {
        if !selection.duplicates.is_empty() {
            info!(
                "{} units declare a class name that is also declared elsewhere",
                selection.duplicates.values().map(Vec::len).sum::<usize>()
            );
        }
        if self.detect_duplicates {
            selection.check_duplicates()?;
        }
        selection.check_artifact_names()?;
        info!(
            "selected {} units ({} tests) out of {}",
            selection.units.len(),
            selection.method_count(),
            selection.candidate_count,
        );
        Ok(selection)
    }
}

/// Returns true if a case identifier is made only of ASCII digits.
pub fn is_numeric_case_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

/// The outcome of selection: units to run and diagnostics about those that weren't picked.
#[derive(Clone, Debug)]
pub struct Selection {
    /// The criteria used for selection.
    pub criteria: SelectionCriteria,

    /// The selected units, in discovery order.
    pub units: Vec<TestUnit>,

    /// Units that weren't selected, along with the reason.
    pub skipped: Vec<(Utf8PathBuf, MismatchReason)>,

    /// Requested paths that aren't in the store.
    pub unknown_paths: Vec<Utf8PathBuf>,

    /// Class names declared by more than one unit, mapped to every unit that declares them.
    pub duplicates: IndexMap<String, Vec<Utf8PathBuf>>,

    candidate_count: usize,
}

impl Selection {
    fn new(criteria: SelectionCriteria, store: &MetadataStore) -> Self {
        Self {
            criteria,
            units: Vec::new(),
            skipped: Vec::new(),
            unknown_paths: Vec::new(),
            duplicates: find_duplicate_classes(store),
            candidate_count: store.len(),
        }
    }

    /// Returns the number of individually addressable test methods across selected units.
    pub fn method_count(&self) -> usize {
        self.units.iter().map(TestUnit::method_count).sum()
    }

    /// Returns the sorted, unique case identifiers across selected units.
    pub fn case_ids(&self) -> BTreeSet<String> {
        self.units
            .iter()
            .flat_map(|unit| unit.case_ids.iter().cloned())
            .collect()
    }

    /// Returns true if the unit at this path shares its class name with another unit.
    pub fn is_duplicate(&self, path: &Utf8Path) -> bool {
        self.duplicates
            .values()
            .any(|paths| paths.iter().any(|p| p == path))
    }

    /// Counts skipped units by reason.
    pub fn skip_counts(&self) -> SkipCounts {
        let mut counts = SkipCounts {
            unknown_path: self.unknown_paths.len(),
            ..SkipCounts::default()
        };
        for (_, reason) in &self.skipped {
            let count = match reason {
                MismatchReason::Unresolved => &mut counts.unresolved,
                MismatchReason::MissingCaseIds => &mut counts.missing_case_ids,
                MismatchReason::InvalidCaseIds => &mut counts.invalid_case_ids,
                MismatchReason::MissingPriority => &mut counts.missing_priority,
                MismatchReason::PriorityMismatch => &mut counts.priority_mismatch,
                MismatchReason::ExcludedGroup => &mut counts.excluded_group,
                MismatchReason::GroupMismatch => &mut counts.group_mismatch,
            };
            *count += 1;
        }
        counts
    }

    /// Restricts the selection to units with failing tests in a previous run, and each of those
    /// units to its failing methods.
    pub fn restrict_to_failed(&mut self, failed: &FailedMethods) {
        self.units.retain_mut(|unit| {
            let Some(methods) = unit.class_name.as_deref().and_then(|class| failed.get(class))
            else {
                debug!("not rerunning `{}`: no failures recorded", unit.path);
                return false;
            };
            // A unit run as a whole is rerun as a whole.
            let whole_unit_failed = methods.len() == 1 && methods.contains(WHOLE_UNIT_TEST_NAME);
            if !(unit.methods.is_empty() && whole_unit_failed) {
                unit.methods = methods.iter().cloned().collect();
            }
            true
        });
    }

    /// Returns a serializable summary of this selection.
    pub fn to_summary(&self) -> SelectionSummary {
        SelectionSummary {
            requested_groups: self.criteria.requested_groups.clone(),
            excluded_groups: self.criteria.excluded_groups.clone(),
            requested_priority: self.criteria.requested_priority.clone(),
            match_mode: self.criteria.match_mode.to_string(),
            units: self.units.iter().map(TestUnit::to_summary).collect(),
            method_count: self.method_count(),
            case_ids: self.case_ids(),
            skipped: self.skip_counts(),
        }
    }

    fn check_duplicates(&self) -> Result<(), SelectionError> {
        for unit in &self.units {
            let Some(class_name) = &unit.class_name else {
                continue;
            };
            if let Some(paths) = self.duplicates.get(class_name) {
                return Err(SelectionError::DuplicateClass {
                    class_name: class_name.clone(),
                    selected: unit.path.clone(),
                    paths: paths.clone(),
                });
            }
        }
        Ok(())
    }

    /// Checks that no two selected units with different suite names write to the same report.
    fn check_artifact_names(&self) -> Result<(), SelectionError> {
        let mut by_file_name: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
        for unit in &self.units {
            by_file_name
                .entry(artifact_file_name(unit.suite_name()))
                .or_default()
                .insert(unit.suite_name());
        }
        match by_file_name.into_iter().find(|(_, names)| names.len() > 1) {
            Some((file_name, names)) => Err(SelectionError::ArtifactCollision {
                file_name,
                suite_names: names.into_iter().map(str::to_owned).collect(),
            }),
            None => Ok(()),
        }
    }
}

fn find_duplicate_classes(store: &MetadataStore) -> IndexMap<String, Vec<Utf8PathBuf>> {
    let mut by_class: IndexMap<&str, Vec<Utf8PathBuf>> = IndexMap::new();
    for unit in store.iter() {
        if let Some(class_name) = &unit.class_name {
            by_class
                .entry(class_name.as_str())
                .or_default()
                .push(unit.path.clone());
        }
    }
    by_class
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(class_name, paths)| (class_name.to_owned(), paths))
        .collect()
}

/// An enum describing whether a unit matches a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum FilterMatch {
    /// This unit matches this filter.
    Matches,

    /// This unit does not match this filter.
    ///
    /// The `MismatchReason` inside describes the reason this filter isn't matched.
    Mismatch {
        /// The reason the unit isn't selected.
        reason: MismatchReason,
    },
}

impl FilterMatch {
    fn mismatch(reason: MismatchReason) -> Self {
        FilterMatch::Mismatch { reason }
    }

    /// Returns true if the filter matches.
    pub fn is_match(&self) -> bool {
        matches!(self, FilterMatch::Matches)
    }
}

/// The reason why a unit doesn't match a filter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MismatchReason {
    /// The unit's class name couldn't be resolved.
    Unresolved,

    /// The unit declares no case identifiers.
    MissingCaseIds,

    /// The unit declares a case identifier that isn't numeric.
    InvalidCaseIds,

    /// The unit declares no priority, and a specific priority was requested.
    MissingPriority,

    /// The unit's priorities don't include the requested priority.
    PriorityMismatch,

    /// The unit is in an excluded group.
    ExcludedGroup,

    /// The unit's groups don't match the requested groups.
    GroupMismatch,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::Unresolved => write!(f, "class name could not be resolved"),
            MismatchReason::MissingCaseIds => write!(f, "no case ids declared"),
            MismatchReason::InvalidCaseIds => write!(f, "case ids must be numeric"),
            MismatchReason::MissingPriority => write!(f, "no priority declared"),
            MismatchReason::PriorityMismatch => {
                write!(f, "does not have the requested priority")
            }
            MismatchReason::ExcludedGroup => write!(f, "is in an excluded group"),
            MismatchReason::GroupMismatch => write!(f, "does not match the requested groups"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::DiscoveredUnit;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;
    use proptest::{collection::btree_set, prelude::*};
    use test_case::test_case;
    use test_strategy::proptest;

    fn unit(path: &str, class: &str, groups: &[&str], priority: &[&str], ids: &[&str]) -> TestUnit {
        TestUnit {
            groups: groups.iter().map(|g| (*g).to_owned()).collect(),
            priority: Some(priority.iter().map(|p| (*p).to_owned()).collect()),
            case_ids: ids.iter().map(|id| (*id).to_owned()).collect(),
            ..TestUnit::new(DiscoveredUnit::new(path, Some(class)))
        }
    }

    fn selected_paths(selection: &Selection) -> Vec<&str> {
        selection
            .units
            .iter()
            .map(|unit| unit.path.as_str())
            .collect()
    }

    #[test]
    fn or_selection_skips_unit_without_case_ids() {
        let store = MetadataStore::new([
            unit("a.rb", "A", &["hal", "satya"], &["high"], &["12345"]),
            unit("b.rb", "B", &["satya"], &["medium"], &[]),
        ]);
        let criteria = SelectionCriteria {
            requested_groups: btreeset! {"satya".to_owned()},
            match_mode: MatchMode::Or,
            requested_priority: "high".to_owned(),
            ..SelectionCriteria::default()
        };

        let selection = UnitFilter::new(criteria)
            .select(&store)
            .expect("selection succeeds");
        assert_eq!(selected_paths(&selection), ["a.rb"]);
        assert_eq!(
            selection.skipped,
            vec![("b.rb".into(), MismatchReason::MissingCaseIds)]
        );
        assert_eq!(selection.skip_counts().missing_case_ids, 1);
        assert_eq!(selection.case_ids(), btreeset! {"12345".to_owned()});
    }

    #[test_case("", MatchMode::And, &[], &[] ; "empty spec")]
    #[test_case("Smoke, Login", MatchMode::And, &["smoke", "login"], &[] ; "comma separated")]
    #[test_case("smoke+login", MatchMode::And, &["smoke", "login"], &[] ; "plus separated")]
    #[test_case("[OR] smoke,login", MatchMode::Or, &["smoke", "login"], &[] ; "or marker")]
    #[test_case("[AND]smoke", MatchMode::And, &["smoke"], &[] ; "and marker")]
    #[test_case("smoke,[NOT] Slow", MatchMode::And, &["smoke"], &["slow"] ; "not marker")]
    #[test_case("[or],[not]flaky", MatchMode::Or, &[], &["flaky"] ; "markers only")]
    fn parse_group_spec(
        spec: &str,
        match_mode: MatchMode,
        requested: &[&str],
        excluded: &[&str],
    ) {
        let criteria = SelectionCriteria::parse(spec, "").expect("spec parses");
        assert_eq!(criteria.match_mode, match_mode);
        assert_eq!(
            criteria.requested_groups,
            requested.iter().map(|g| (*g).to_owned()).collect::<BTreeSet<_>>()
        );
        assert_eq!(
            criteria.excluded_groups,
            excluded.iter().map(|g| (*g).to_owned()).collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn parse_group_spec_errors() {
        assert!(matches!(
            SelectionCriteria::parse("[XOR] smoke", ""),
            Err(GroupSpecParseError::UnknownMarker { marker, .. }) if marker == "[XOR]"
        ));
        assert!(matches!(
            SelectionCriteria::parse("[AND] a,[OR] b", ""),
            Err(GroupSpecParseError::ConflictingMarkers { .. })
        ));
        assert!(matches!(
            SelectionCriteria::parse("a,[NOT]", ""),
            Err(GroupSpecParseError::EmptyExclusion { .. })
        ));
        assert!(matches!(
            SelectionCriteria::parse("[OR smoke", ""),
            Err(GroupSpecParseError::UnknownMarker { .. })
        ));
    }

    #[test_case("", true ; "empty is any")]
    #[test_case("ALL", true ; "all is any")]
    #[test_case(" High ", false ; "specific")]
    fn priority_wildcard(priority: &str, is_any: bool) {
        let criteria = SelectionCriteria::parse("", priority).expect("spec parses");
        assert_eq!(criteria.is_any_priority(), is_any);
    }

    #[test]
    fn mismatch_reasons() {
        let mut criteria = SelectionCriteria::parse("smoke", "high").expect("spec parses");
        criteria.exclude_groups(["deprecated"]);
        let filter = UnitFilter::new(criteria);

        let unresolved = TestUnit {
            case_ids: vec!["1".to_owned()],
            ..TestUnit::new(DiscoveredUnit::new("u.rb", None::<String>))
        };
        let no_priority = TestUnit {
            priority: None,
            ..unit("p.rb", "P", &["smoke"], &[], &["1"])
        };
        let cases = [
            (unresolved, MismatchReason::Unresolved),
            (
                unit("x.rb", "X", &["smoke", "deprecated"], &["high"], &["1"]),
                MismatchReason::ExcludedGroup,
            ),
            (
                unit("i.rb", "I", &["smoke"], &["high"], &["12", "TC-3"]),
                MismatchReason::InvalidCaseIds,
            ),
            (no_priority, MismatchReason::MissingPriority),
            (
                unit("m.rb", "M", &["smoke"], &["low"], &["1"]),
                MismatchReason::PriorityMismatch,
            ),
            (
                unit("g.rb", "G", &["login"], &["high"], &["1"]),
                MismatchReason::GroupMismatch,
            ),
        ];
        for (unit, reason) in cases {
            assert_eq!(
                filter.filter_match(&unit),
                FilterMatch::Mismatch { reason },
                "for unit {}",
                unit.path
            );
        }

        let ok = unit("ok.rb", "Ok", &["smoke", "login"], &["high", "low"], &["1", "2"]);
        assert!(filter.filter_match(&ok).is_match());
    }

    #[test]
    fn unit_without_priority_runs_under_wildcard() {
        let filter = UnitFilter::new(SelectionCriteria::default());
        let unit = TestUnit {
            priority: None,
            ..unit("p.rb", "P", &[], &[], &["1"])
        };
        assert!(filter.filter_match(&unit).is_match());
    }

    #[test]
    fn duplicate_classes_are_fatal_when_selected() {
        let store = MetadataStore::new([
            unit("a/login.rb", "LoginTest", &["smoke"], &["high"], &["1"]),
            unit("b/login.rb", "LoginTest", &["slow"], &["high"], &["2"]),
            unit("cart.rb", "CartTest", &["smoke"], &["high"], &["3"]),
        ]);

        let mut filter = UnitFilter::new(SelectionCriteria::parse("smoke", "").expect("parses"));
        let err = filter.select(&store).expect_err("duplicate is selected");
        assert_eq!(
            err,
            SelectionError::DuplicateClass {
                class_name: "LoginTest".to_owned(),
                selected: "a/login.rb".into(),
                paths: vec!["a/login.rb".into(), "b/login.rb".into()],
            }
        );

        // Flagged units that aren't selected don't fail selection.
        let cart_only = UnitFilter::new(SelectionCriteria::parse("smoke", "").expect("parses"))
            .select_paths(&store, [Utf8Path::new("cart.rb")])
            .expect("cart alone is fine");
        assert_eq!(selected_paths(&cart_only), ["cart.rb"]);
        assert!(cart_only.is_duplicate(Utf8Path::new("b/login.rb")));

        filter.set_detect_duplicates(false);
        let selection = filter.select(&store).expect("detection is off");
        assert_eq!(selected_paths(&selection), ["a/login.rb", "cart.rb"]);
    }

    #[test]
    fn report_file_collisions_are_fatal() {
        let store = MetadataStore::new([
            unit("a.rb", "Admin::Users", &["smoke"], &[], &["1"]),
            unit("b.rb", "Admin__Users", &["smoke"], &[], &["2"]),
            unit("c.rb", "Cart", &["smoke"], &[], &["3"]),
        ]);
        let mut filter = UnitFilter::new(SelectionCriteria::default());
        let err = filter.select(&store).expect_err("report file names collide");
        assert_eq!(
            err,
            SelectionError::ArtifactCollision {
                file_name: "TEST-Admin__Users.xml".to_owned(),
                suite_names: vec!["Admin::Users".to_owned(), "Admin__Users".to_owned()],
            }
        );

        // Turning off duplicate detection doesn't allow reports to overwrite each other.
        filter.set_detect_duplicates(false);
        filter.select(&store).expect_err("report file names still collide");

        let selection = filter
            .select_paths(&store, ["a.rb", "c.rb"].map(Utf8Path::new))
            .expect("only one of the colliding units is selected");
        assert_eq!(selected_paths(&selection), ["a.rb", "c.rb"]);
    }

    #[test]
    fn select_paths_reports_unknown_paths() {
        let store = MetadataStore::new([
            unit("a.rb", "A", &[], &[], &[]),
            TestUnit::new(DiscoveredUnit::new("b.rb", None::<String>)),
        ]);
        let selection = UnitFilter::new(SelectionCriteria::default())
            .select_paths(
                &store,
                ["a.rb", "missing.rb", "b.rb", "a.rb"].map(Utf8Path::new),
            )
            .expect("selection succeeds");
        assert_eq!(selected_paths(&selection), ["a.rb"]);
        assert_eq!(selection.unknown_paths, vec![Utf8PathBuf::from("missing.rb")]);
        let counts = selection.skip_counts();
        assert_eq!(counts.unresolved, 1);
        assert_eq!(counts.unknown_path, 1);
    }

    #[test]
    fn restrict_to_failed_methods() {
        let store = MetadataStore::new([
            TestUnit {
                methods: vec!["test_a".to_owned(), "test_b".to_owned()],
                ..unit("a.rb", "A", &[], &[], &["1"])
            },
            unit("b.rb", "B", &[], &[], &["2"]),
        ]);
        let mut selection = UnitFilter::new(SelectionCriteria::default())
            .select(&store)
            .expect("selection succeeds");
        let failed: FailedMethods = [("A".to_owned(), btreeset! {"test_b".to_owned()})]
            .into_iter()
            .collect();
        selection.restrict_to_failed(&failed);
        assert_eq!(selected_paths(&selection), ["a.rb"]);
        assert_eq!(selection.units[0].methods, ["test_b"]);
        assert_eq!(selection.method_count(), 1);
    }

    #[test]
    fn whole_unit_is_rerun_as_a_whole() {
        let store = MetadataStore::new([
            unit("a.rb", "A", &[], &[], &["1"]),
            TestUnit {
                methods: vec!["all".to_owned(), "test_b".to_owned()],
                ..unit("b.rb", "B", &[], &[], &["2"])
            },
        ]);
        let mut selection = UnitFilter::new(SelectionCriteria::default())
            .select(&store)
            .expect("selection succeeds");
        let failed: FailedMethods = [
            ("A".to_owned(), btreeset! {WHOLE_UNIT_TEST_NAME.to_owned()}),
            ("B".to_owned(), btreeset! {"all".to_owned()}),
        ]
        .into_iter()
        .collect();
        selection.restrict_to_failed(&failed);

        assert_eq!(selected_paths(&selection), ["a.rb", "b.rb"]);
        assert!(
            selection.units[0].methods.is_empty(),
            "a unit without methods keeps running as a whole"
        );
        assert_eq!(
            selection.units[1].methods,
            ["all"],
            "a declared method named `all` is still rerun by name"
        );
    }

    fn group_name() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["smoke", "login", "cart", "slow", "nightly"]).prop_map(Into::into)
    }

    #[proptest]
    fn and_mode_selects_supersets(
        #[strategy(btree_set(group_name(), 0..4))] unit_groups: BTreeSet<String>,
        #[strategy(btree_set(group_name(), 0..3))] requested: BTreeSet<String>,
        #[strategy(btree_set(group_name(), 0..2))] excluded: BTreeSet<String>,
    ) {
        let criteria = SelectionCriteria {
            requested_groups: requested.clone(),
            excluded_groups: excluded.clone(),
            ..SelectionCriteria::default()
        };
        let unit = TestUnit {
            groups: unit_groups.clone(),
            ..unit("a.rb", "A", &[], &[], &["1"])
        };
        let expected = requested.is_subset(&unit_groups) && unit_groups.is_disjoint(&excluded);
        prop_assert_eq!(UnitFilter::new(criteria).filter_match(&unit).is_match(), expected);
    }

    #[proptest]
    fn or_mode_selects_intersections(
        #[strategy(btree_set(group_name(), 0..4))] unit_groups: BTreeSet<String>,
        #[strategy(btree_set(group_name(), 1..3))] requested: BTreeSet<String>,
        #[strategy(btree_set(group_name(), 0..2))] excluded: BTreeSet<String>,
    ) {
        let criteria = SelectionCriteria {
            requested_groups: requested.clone(),
            excluded_groups: excluded.clone(),
            match_mode: MatchMode::Or,
            ..SelectionCriteria::default()
        };
        let unit = TestUnit {
            groups: unit_groups.clone(),
            ..unit("a.rb", "A", &[], &[], &["1"])
        };
        let expected = !requested.is_disjoint(&unit_groups) && unit_groups.is_disjoint(&excluded);
        prop_assert_eq!(UnitFilter::new(criteria).filter_match(&unit).is_match(), expected);
    }
}
