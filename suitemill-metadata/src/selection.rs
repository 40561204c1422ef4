// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Root element for a serializable summary of a selection.
///
/// Printed by `suitemill run --dry-run --message-format json`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectionSummary {
    /// The groups requested for this run, lowercased.
    pub requested_groups: BTreeSet<String>,

    /// Groups that disqualify a unit regardless of match mode.
    pub excluded_groups: BTreeSet<String>,

    /// The requested priority, or the empty string if every priority was requested.
    pub requested_priority: String,

    /// Either `and` or `or`.
    pub match_mode: String,

    /// The units selected to run, in discovery order.
    pub units: Vec<UnitSummary>,

    /// The number of individually addressable test methods across selected units.
    pub method_count: usize,

    /// The unique case identifiers across selected units, sorted.
    pub case_ids: BTreeSet<String>,

    /// Counts of units that were not selected, keyed by reason.
    pub skipped: SkipCounts,
}

/// A single unit in a [`SelectionSummary`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitSummary {
    /// The unit's path, which is unique within a run.
    pub path: Utf8PathBuf,

    /// The resolved class name.
    pub class_name: String,

    /// The unit's groups.
    pub groups: BTreeSet<String>,

    /// The unit's declared priorities, if any were declared.
    pub priority: Option<Vec<String>>,

    /// Case identifiers declared by the unit.
    pub case_ids: Vec<String>,

    /// The owner of this unit, if declared.
    pub owner: Option<String>,

    /// The test methods that will be run.
    pub methods: Vec<String>,
}

/// Counts of units skipped during selection, by reason.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SkipCounts {
    /// Units without a resolvable class name.
    pub unresolved: usize,

    /// Units that declare no case identifiers.
    pub missing_case_ids: usize,

    /// Units with at least one non-numeric case identifier.
    pub invalid_case_ids: usize,

    /// Units that declare no priority.
    pub missing_priority: usize,

    /// Units whose priorities don't include the requested priority.
    pub priority_mismatch: usize,

    /// Units carrying an excluded group.
    pub excluded_group: usize,

    /// Units whose groups don't satisfy the requested groups.
    pub group_mismatch: usize,

    /// Paths named explicitly that aren't known to discovery.
    pub unknown_path: usize,
}

impl SkipCounts {
    /// Returns the total number of skipped units.
    pub fn total(&self) -> usize {
        let Self {
            unresolved,
            missing_case_ids,
            invalid_case_ids,
            missing_priority,
            priority_mismatch,
            excluded_group,
            group_mismatch,
            unknown_path,
        } = *self;
        unresolved
            + missing_case_ids
            + invalid_case_ids
            + missing_priority
            + priority_mismatch
            + excluded_group
            + group_mismatch
            + unknown_path
    }
}
