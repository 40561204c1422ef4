// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of test units through a TOML manifest.
//!
//! The manifest lists every candidate unit along with the metadata it declares:
//!
//! ```toml
//! [[unit]]
//! path = "tests/login_test.rb"
//! class-name = "LoginTest"
//! groups = ["smoke", "login"]
//! priority = ["high"]
//! tcids = [12345, "12346"]
//! owner = "alice"
//! methods = ["test_login", "test_logout"]
//! ```

use crate::{
    errors::ManifestReadError,
    unit::{DiscoveredUnit, MetadataStore, TestUnit, normalize_name},
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tracing::debug;

/// A parsed unit manifest.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UnitManifest {
    #[serde(default, rename = "unit")]
    units: Vec<ManifestUnit>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ManifestUnit {
    path: Utf8PathBuf,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    priority: Option<Vec<String>>,
    #[serde(default)]
    tcids: Vec<CaseId>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    dev_owner: Option<String>,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    deprecated: bool,
}

/// Case identifiers may be written as integers or as strings.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum CaseId {
    Int(i64),
    String(String),
}

impl CaseId {
    fn into_string(self) -> String {
        match self {
            CaseId::Int(id) => id.to_string(),
            CaseId::String(id) => id.trim().to_owned(),
        }
    }
}

impl UnitManifest {
    /// Reads a manifest from the given path.
    pub fn from_path(path: &Utf8Path) -> Result<Self, ManifestReadError> {
        let contents = std::fs::read_to_string(path).map_err(|error| ManifestReadError::Read {
            path: path.to_owned(),
            error,
        })?;
        Self::parse(path, &contents)
    }

    /// Parses a manifest from a string. `path` is only used for error reporting.
    pub fn parse(path: &Utf8Path, contents: &str) -> Result<Self, ManifestReadError> {
        toml::from_str(contents).map_err(|error| ManifestReadError::Parse {
            path: path.to_owned(),
            error,
        })
    }

    /// Returns the number of entries in the manifest, including deprecated ones.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns the path and class name of every unit that wasn't dropped as deprecated.
    pub fn discovered(&self) -> impl Iterator<Item = DiscoveredUnit> + '_ {
        self.live_units()
            .map(|unit| DiscoveredUnit::new(unit.path.clone(), unit.class_name.clone()))
    }

    /// Consumes the manifest, producing a store of units with their declared metadata.
    pub fn into_store(self) -> MetadataStore {
        let total = self.units.len();
        let store = MetadataStore::new(
            self.units
                .into_iter()
                .filter(|unit| !unit.is_deprecated())
                .map(ManifestUnit::into_test_unit),
        );
        debug!(
            "discovered {} units ({} manifest entries)",
            store.len(),
            total
        );
        store
    }

    fn live_units(&self) -> impl Iterator<Item = &ManifestUnit> + '_ {
        self.units.iter().filter(|unit| !unit.is_deprecated())
    }
}

impl ManifestUnit {
    fn is_deprecated(&self) -> bool {
        if self.deprecated {
            debug!("dropping unit `{}`: marked deprecated", self.path);
            return true;
        }
        let in_deprecated_dir = self
            .path
            .parent()
            .is_some_and(|parent| parent.as_str().to_lowercase().contains("deprecate"));
        if in_deprecated_dir {
            debug!("dropping unit `{}`: in a deprecated directory", self.path);
        }
        in_deprecated_dir
    }

    fn into_test_unit(self) -> TestUnit {
        let discovered = DiscoveredUnit::new(
            self.path,
            self.class_name.filter(|name| !name.trim().is_empty()),
        );
        TestUnit {
            groups: self
                .groups
                .iter()
                .map(|group| normalize_name(group))
                .filter(|group| !group.is_empty())
                .collect(),
            priority: self.priority.map(|priorities| {
                priorities
                    .iter()
                    .map(|priority| normalize_name(priority))
                    .collect()
            }),
            case_ids: self.tcids.into_iter().map(CaseId::into_string).collect(),
            owner: self.owner,
            dev_owner: self.dev_owner,
            services: self.services,
            methods: self.methods,
            ..TestUnit::new(discovered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;

    static MANIFEST: &str = indoc! {r#"
        [[unit]]
        path = "tests/login_test.rb"
        class-name = "LoginTest"
        groups = [" Smoke", "LOGIN"]
        priority = ["High"]
        tcids = [12345, " 12346 "]
        owner = "alice"
        dev-owner = "bob"
        services = ["auth"]
        methods = ["test_login", "test_logout"]

        [[unit]]
        path = "tests/cart_test.rb"

        [[unit]]
        path = "tests/Deprecated/old_test.rb"
        class-name = "OldTest"

        [[unit]]
        path = "tests/retired_test.rb"
        class-name = "RetiredTest"
        deprecated = true

        [[unit]]
        path = "tests/login_test.rb"
        class-name = "ShadowedTest"
    "#};

    #[test]
    fn parse_manifest() {
        let manifest =
            UnitManifest::parse(Utf8Path::new("units.toml"), MANIFEST).expect("manifest parses");
        assert_eq!(manifest.len(), 5);

        let discovered: Vec<_> = manifest.discovered().collect();
        assert_eq!(
            discovered,
            vec![
                DiscoveredUnit::new("tests/login_test.rb", Some("LoginTest")),
                DiscoveredUnit::new("tests/cart_test.rb", None::<String>),
                DiscoveredUnit::new("tests/login_test.rb", Some("ShadowedTest")),
            ]
        );

        let store = manifest.into_store();
        assert_eq!(store.len(), 2, "deprecated and duplicate entries are dropped");

        let login = store
            .get(Utf8Path::new("tests/login_test.rb"))
            .expect("login unit is present");
        assert_eq!(login.class_name.as_deref(), Some("LoginTest"));
        assert_eq!(
            login.groups,
            btreeset! {"smoke".to_owned(), "login".to_owned()}
        );
        assert_eq!(login.priority, Some(vec!["high".to_owned()]));
        assert_eq!(login.case_ids, ["12345", "12346"]);
        assert_eq!(login.dev_owner.as_deref(), Some("bob"));
        assert_eq!(login.method_count(), 2);

        let cart = store
            .get(Utf8Path::new("tests/cart_test.rb"))
            .expect("cart unit is present");
        assert_eq!(cart.class_name, None);
        assert_eq!(cart.priority, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = UnitManifest::parse(
            Utf8Path::new("units.toml"),
            "[[unit]]\npath = \"a.rb\"\ngrouping = [\"smoke\"]\n",
        )
        .expect_err("unknown key is an error");
        assert!(matches!(err, ManifestReadError::Parse { .. }), "{err:?}");
    }

    #[test]
    fn missing_manifest_is_a_read_error() {
        let err = UnitManifest::from_path(Utf8Path::new("does/not/exist.toml"))
            .expect_err("missing file is an error");
        assert!(matches!(err, ManifestReadError::Read { .. }), "{err:?}");
    }
}
