// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for suitemill.

use crate::errors::ConfigReadError;
use camino::{Utf8Path, Utf8PathBuf};
use config::{
    Case, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, Map,
    builder::DefaultState,
};
use serde::Deserialize;
use std::num::NonZeroUsize;

/// Overall configuration for suitemill.
///
/// Built by layering, from lowest to highest precedence: the default config, the project's
/// `.config/suitemill.toml` (or an explicitly specified file), and `SUITEMILL_*` environment
/// variables.
#[derive(Clone, Debug)]
pub struct SuitemillConfig {
    project_root: Utf8PathBuf,
    inner: SuitemillConfigImpl,
}

impl SuitemillConfig {
    /// The default location of the config within the project: `.config/suitemill.toml`.
    pub const CONFIG_PATH: &'static str = ".config/suitemill.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Project-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Environment configuration uses this prefix, plus a _.
    ///
    /// Nested keys are separated by `__`, e.g. `SUITEMILL_RUNTIME__PROGRAM`.
    pub const ENVIRONMENT_PREFIX: &'static str = "SUITEMILL";

    /// Reads the config from the given file, or if not specified from `.config/suitemill.toml` in
    /// the project root.
    ///
    /// If no config file is specified and the project doesn't have `.config/suitemill.toml`, uses
    /// the default config options, still overridden by the environment.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigReadError> {
        Self::from_sources_impl(project_root.into(), config_file, None)
    }

    /// Returns the default config.
    pub fn default_config(project_root: impl Into<Utf8PathBuf>) -> Self {
        let inner = Self::make_default_config()
            .build()
            .and_then(|config| config.try_deserialize())
            .expect("default config is always valid");
        Self {
            project_root: project_root.into(),
            inner,
        }
    }

    /// Returns the project root that relative paths are resolved against.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the maximum number of units run at the same time.
    pub fn max_concurrent(&self) -> NonZeroUsize {
        self.inner.max_concurrent
    }

    /// Returns the results directory, resolved against the project root.
    pub fn results_dir(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.results_dir)
    }

    /// Returns the path to the unit manifest, resolved against the project root.
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.project_root.join(&self.inner.manifest)
    }

    /// Returns the default group spec.
    pub fn groups(&self) -> &str {
        &self.inner.groups
    }

    /// Returns the default priority.
    pub fn priority(&self) -> &str {
        &self.inner.priority
    }

    /// Returns the groups that are always excluded.
    pub fn excluded_groups(&self) -> &[String] {
        &self.inner.excluded_groups
    }

    /// Returns true if selecting a unit with a shared class name is an error.
    pub fn detect_duplicates(&self) -> bool {
        self.inner.detect_duplicates
    }

    /// Returns true if the run summary lists failing tests by owning team.
    pub fn sort_summary_by_owner(&self) -> bool {
        self.inner.sort_summary_by_owner
    }

    /// Returns the path to the ownership map, if configured, resolved against the project root.
    pub fn ownership_map(&self) -> Option<Utf8PathBuf> {
        self.inner
            .ownership_map
            .as_ref()
            .map(|path| self.project_root.join(path))
    }

    /// Returns the runtime configuration.
    pub fn runtime(&self) -> &RuntimeConfig {
        &self.inner.runtime
    }

    // ---
    // Helper methods
    // ---

    fn from_sources_impl(
        project_root: Utf8PathBuf,
        file: Option<&Utf8Path>,
        env_source: Option<Map<String, String>>,
    ) -> Result<Self, ConfigReadError> {
        let (config_file, source) = match file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config()
            .add_source(source)
            .add_source(Self::make_environment(env_source));
        let inner = Self::build_and_deserialize_config(&builder)
            .map_err(|err| ConfigReadError::new(config_file, err))?;

        Ok(Self {
            project_root,
            inner,
        })
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn make_environment(source: Option<Map<String, String>>) -> Environment {
        Environment::with_prefix(Self::ENVIRONMENT_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .convert_case(Case::Kebab)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("excluded-groups")
            .source(source)
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<SuitemillConfigImpl, ConfigError> {
        builder.build_cloned()?.try_deserialize()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct SuitemillConfigImpl {
    max_concurrent: NonZeroUsize,
    results_dir: Utf8PathBuf,
    manifest: Utf8PathBuf,
    groups: String,
    priority: String,
    excluded_groups: Vec<String>,
    detect_duplicates: bool,
    sort_summary_by_owner: bool,
    #[serde(default)]
    ownership_map: Option<Utf8PathBuf>,
    runtime: RuntimeConfig,
}

/// Configuration for [`CommandRuntime`](crate::runtime::CommandRuntime): the `[runtime]` table.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuntimeConfig {
    /// The program invoked once per test method.
    #[serde(default)]
    pub program: Option<String>,

    /// Arguments passed to the program, with placeholders.
    pub args: RuntimeArgs,

    /// The exit code that indicates a test failure rather than an error.
    pub failure_exit_code: i32,
}

/// Runtime arguments: either a list, or a single shell-quoted string.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RuntimeArgs {
    /// A list of arguments.
    List(Vec<String>),

    /// A string split into arguments with shell quoting rules.
    String(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        let config = SuitemillConfig::default_config("/project");
        assert_eq!(config.max_concurrent().get(), 3);
        assert_eq!(
            config.results_dir(),
            Utf8Path::new("/project/target/suitemill")
        );
        assert_eq!(
            config.manifest_path(),
            Utf8Path::new("/project/suitemill-units.toml")
        );
        assert_eq!(config.groups(), "");
        assert_eq!(config.excluded_groups(), ["deprecated"]);
        assert!(config.detect_duplicates());
        assert!(!config.sort_summary_by_owner());
        assert_eq!(config.ownership_map(), None);
        assert_eq!(
            config.runtime(),
            &RuntimeConfig {
                program: None,
                args: RuntimeArgs::List(vec!["{path}".to_owned(), "{method}".to_owned()]),
                failure_exit_code: 1,
            }
        );
    }

    #[test]
    fn project_config_and_environment_are_layered() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        std::fs::create_dir(dir.path().join(".config")).expect("config dir created");
        std::fs::write(
            dir.path().join(SuitemillConfig::CONFIG_PATH),
            indoc! {r#"
                max-concurrent = 8
                groups = "[OR] smoke,login"
                ownership-map = "teams.toml"

                [runtime]
                program = "ruby"
                args = "-Itest {path} --name={method}"
            "#},
        )
        .expect("config written");

        let env: Map<String, String> = [
            ("SUITEMILL_MAX_CONCURRENT", "2"),
            ("SUITEMILL_EXCLUDED_GROUPS", "deprecated,flaky"),
            ("SUITEMILL_RUNTIME__FAILURE_EXIT_CODE", "3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let config = SuitemillConfig::from_sources_impl(dir.path().to_owned(), None, Some(env))
            .expect("config is valid");
        assert_eq!(config.max_concurrent().get(), 2, "environment wins");
        assert_eq!(config.groups(), "[OR] smoke,login");
        assert_eq!(config.excluded_groups(), ["deprecated", "flaky"]);
        assert_eq!(
            config.ownership_map(),
            Some(dir.path().join("teams.toml"))
        );
        assert_eq!(config.runtime().program.as_deref(), Some("ruby"));
        assert_eq!(
            config.runtime().args,
            RuntimeArgs::String("-Itest {path} --name={method}".to_owned())
        );
        assert_eq!(config.runtime().failure_exit_code, 3);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let dir = Utf8TempDir::new().expect("temp dir created");
        let config_file = dir.path().join("custom.toml");

        for contents in ["max-concurrent = 0\n", "unknown-key = true\n"] {
            std::fs::write(&config_file, contents).expect("config written");
            let err = SuitemillConfig::from_sources_impl(
                dir.path().to_owned(),
                Some(&config_file),
                Some(Map::new()),
            )
            .expect_err("config is invalid");
            assert_eq!(err.config_file(), &config_file, "for {contents:?}");
        }

        let err = SuitemillConfig::from_sources_impl(
            dir.path().to_owned(),
            Some(&dir.path().join("missing.toml")),
            Some(Map::new()),
        )
        .expect_err("an explicit config file must exist");
        assert_eq!(err.config_file(), &dir.path().join("missing.toml"));
    }
}
