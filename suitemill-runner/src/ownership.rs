// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bucketing failing tests by owning team.

use crate::errors::OwnershipMapReadError;
use camino::Utf8Path;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use swrite::{SWrite, swrite, swriteln};

/// A map from team name to the class names the team owns.
///
/// Read from a TOML file of the form `team = ["ClassA", "ClassB"]`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct OwnershipMap {
    teams: BTreeMap<String, Vec<String>>,
}

impl OwnershipMap {
    /// Creates a new map from `(team, classes)` pairs.
    pub fn new<T, C>(teams: impl IntoIterator<Item = (T, C)>) -> Self
    where
        T: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            teams: teams
                .into_iter()
                .map(|(team, classes)| (team.into(), classes.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Reads an ownership map from a file.
    pub fn from_path(path: &Utf8Path) -> Result<Self, OwnershipMapReadError> {
        let contents = std::fs::read_to_string(path).map_err(|error| {
            OwnershipMapReadError::Read {
                path: path.to_owned(),
                error,
            }
        })?;
        Self::parse(&contents).map_err(|error| OwnershipMapReadError::Parse {
            path: path.to_owned(),
            error,
        })
    }

    /// Parses an ownership map from TOML.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Returns the team that owns this class, if any.
    ///
    /// If more than one team lists the class, the first team in name order wins.
    pub fn owner_of(&self, class_name: &str) -> Option<&str> {
        self.teams
            .iter()
            .find(|(_, classes)| classes.iter().any(|c| c == class_name))
            .map(|(team, _)| team.as_str())
    }

    /// Returns the number of classes a team owns.
    pub fn class_count(&self, team: &str) -> usize {
        self.teams.get(team).map_or(0, Vec::len)
    }

    /// Groups test identifiers (`classname:testname`) by owning team.
    pub fn bucket<'a>(
        &self,
        identifiers: impl IntoIterator<Item = &'a str>,
    ) -> OwnershipBuckets<'_> {
        let mut buckets = OwnershipBuckets {
            map: self,
            teams: BTreeMap::new(),
            unowned: BTreeSet::new(),
        };
        for id in identifiers {
            let class_name = id.split_once(':').map_or(id, |(class_name, _)| class_name);
            match self.owner_of(class_name) {
                Some(team) => {
                    buckets
                        .teams
                        .entry(team)
                        .or_default()
                        .insert(id.to_owned());
                }
                None => {
                    buckets.unowned.insert(id.to_owned());
                }
            }
        }
        buckets
    }
}

/// Failing test identifiers grouped by owning team.
#[derive(Clone, Debug)]
pub struct OwnershipBuckets<'map> {
    map: &'map OwnershipMap,
    teams: BTreeMap<&'map str, BTreeSet<String>>,
    unowned: BTreeSet<String>,
}

impl OwnershipBuckets<'_> {
    /// Returns the identifiers owned by each team with at least one failure, sorted by team.
    pub fn teams(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> + '_ {
        self.teams.iter().map(|(team, ids)| (*team, ids))
    }

    /// Returns the identifiers no team owns.
    pub fn unowned(&self) -> &BTreeSet<String> {
        &self.unowned
    }

    /// Renders the buckets as text, appending to `out`.
    pub fn render_to(&self, out: &mut String) {
        for (team, ids) in &self.teams {
            swrite!(
                out,
                "\n\t{} - {} failures / {}\n\n",
                team.to_uppercase(),
                ids.len(),
                self.map.class_count(team),
            );
            for id in ids {
                swriteln!(out, "\t\t{id}");
            }
        }

        if !self.unowned.is_empty() {
            out.push_str("\n\tTests with no team to associate with -\n");
            for id in &self.unowned {
                swriteln!(out, "\t\t{id}");
            }
        }
    }
}
