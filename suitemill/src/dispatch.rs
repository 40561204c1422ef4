// Copyright (c) The suitemill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use std::{collections::BTreeSet, io::Write, num::NonZeroUsize};
use suitemill_metadata::SuitemillExitCode;
use suitemill_runner::{
    config::SuitemillConfig,
    diff::diff,
    manifest::UnitManifest,
    ownership::OwnershipMap,
    reporter::{ReportWriter, RunDisplayer},
    results::{ResultSet, is_report_file_name},
    runner::TestRunner,
    runtime::CommandRuntime,
    summary::{BOTTOM_LINE_FILE_NAME, RunSummary, SUMMARY_FILE_NAME},
    test_filter::{Selection, SelectionCriteria, UnitFilter},
};
use supports_color::Stream;
use tracing::{info, warn};

/// Select, run and summarize grouped test suites in parallel.
#[derive(Debug, Parser)]
#[command(version, name = "suitemill", styles = clap_styles::style())]
pub struct SuitemillApp {
    /// Project root that manifest, unit and results paths are relative to [default: current
    /// directory]
    #[arg(long, global = true, value_name = "DIR")]
    project_root: Option<Utf8PathBuf>,

    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl SuitemillApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let project_root = self
            .project_root
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        let config = self.config_opts.make_config(&project_root)?;

        match self.command {
            Command::Run {
                selection_opts,
                runner_opts,
            } => exec_run(&config, &selection_opts, &runner_opts, output, output_writer),
            Command::Summary {
                results,
                ownership_map,
            } => {
                let results = results.unwrap_or_else(|| config.results_dir());
                let summary = RunSummary::from_results(&ResultSet::from_path(&results)?);
                let ownership = ownership_for(&config, ownership_map.as_deref())?;
                if results.is_dir() {
                    summary.write_to(&results, ownership.as_ref())?;
                }
                let body = match &ownership {
                    Some(map) => summary.body_by_owner(map),
                    None => summary.body(),
                };
                write_summary(&body, &summary.bottom_line(), output_writer)?;
                Ok(SuitemillExitCode::OK)
            }
            Command::Diff {
                run_x,
                run_y,
                ownership_map,
                output_dir,
            } => {
                let run_x = ResultSet::from_path(&run_x)?;
                let run_y = ResultSet::from_path(&run_y)?;
                let diff_summary = diff(&run_x, &run_y);
                let ownership = ownership_for(&config, ownership_map.as_deref())?;
                if let Some(output_dir) = &output_dir {
                    std::fs::create_dir_all(output_dir)
                        .map_err(|err| ExpectedError::results_dir_error(output_dir, err))?;
                    diff_summary.write_to(output_dir, ownership.as_ref())?;
                }
                let body = match &ownership {
                    Some(map) => diff_summary.body_by_owner(map),
                    None => diff_summary.body(),
                };
                write_summary(&body, &diff_summary.bottom_line(), output_writer)?;
                Ok(SuitemillExitCode::OK)
            }
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: project-root/.config/suitemill.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    /// Creates a suitemill config with the given options.
    fn make_config(&self, project_root: &Utf8Path) -> Result<SuitemillConfig> {
        Ok(SuitemillConfig::from_sources(
            project_root,
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Select units and run them
    ///
    /// Units are read from the unit manifest and filtered by group, priority and case
    /// identifiers. Selected units run in parallel, one report per unit is written to the
    /// results directory, and the run ends with `result_summary.log` and `bottom_line.log`.
    Run {
        #[command(flatten)]
        selection_opts: SelectionOpts,

        #[command(flatten)]
        runner_opts: RunnerOpts,
    },

    /// Summarize persisted suite reports
    ///
    /// RESULTS is a results directory or a single report file. If it is a directory, the
    /// summary files in it are rewritten.
    Summary {
        /// Results directory or report file [default: from config]
        #[arg(value_name = "RESULTS")]
        results: Option<Utf8PathBuf>,

        /// Group failing tests by the teams listed in this ownership map
        #[arg(long, value_name = "FILE")]
        ownership_map: Option<Utf8PathBuf>,
    },

    /// Compare a run with a rerun of its failures
    ///
    /// Tests failing in both runs are persistent failures. Tests failing in RUN_X and passing in
    /// RUN_Y are transient.
    Diff {
        /// Results of the first run
        #[arg(value_name = "RUN_X")]
        run_x: Utf8PathBuf,

        /// Results of the rerun
        #[arg(value_name = "RUN_Y")]
        run_y: Utf8PathBuf,

        /// Group persistent failures by the teams listed in this ownership map
        #[arg(long, value_name = "FILE")]
        ownership_map: Option<Utf8PathBuf>,

        /// Also write `result_summary.log` and `bottom_line.log` to this directory
        #[arg(long, value_name = "DIR")]
        output_dir: Option<Utf8PathBuf>,
    },
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "SELECTION OPTIONS")]
struct SelectionOpts {
    /// Group spec, e.g. `smoke,login`, `[OR] smoke,login` or `smoke,[NOT]slow` [default: from
    /// config]
    #[arg(long, short = 'g', value_name = "SPEC")]
    groups: Option<String>,

    /// Priority to select, or `all` [default: from config]
    #[arg(long, short = 'p', value_name = "PRIORITY")]
    priority: Option<String>,

    /// Run exactly these units, ignoring group, priority and case identifier filters
    #[arg(long, value_name = "PATH", num_args = 1.., value_delimiter = ',')]
    files: Vec<Utf8PathBuf>,

    /// Only rerun tests that failed in the reports in this directory
    #[arg(long, value_name = "DIR")]
    rerun_failed: Option<Utf8PathBuf>,

    /// Unit manifest [default: from config]
    #[arg(long, value_name = "FILE")]
    manifest: Option<Utf8PathBuf>,

    /// Allow running units whose class name is declared by another unit
    #[arg(long)]
    no_detect_duplicates: bool,
}

impl SelectionOpts {
    fn compute(&self, config: &SuitemillConfig) -> Result<Selection> {
        let manifest_path = self
            .manifest
            .clone()
            .unwrap_or_else(|| config.manifest_path());
        let store = UnitManifest::from_path(&manifest_path)?.into_store();

        let mut criteria = SelectionCriteria::parse(
            self.groups.as_deref().unwrap_or(config.groups()),
            self.priority.as_deref().unwrap_or(config.priority()),
        )?;
        criteria.exclude_groups(config.excluded_groups());

        let mut filter = UnitFilter::new(criteria);
        filter.set_detect_duplicates(config.detect_duplicates() && !self.no_detect_duplicates);

        let mut selection = if self.files.is_empty() {
            filter.select(&store)?
        } else {
            filter.select_paths(&store, self.files.iter().map(Utf8PathBuf::as_path))?
        };
        for path in &selection.unknown_paths {
            warn!("`{path}` is not listed in the unit manifest `{manifest_path}`");
        }

        if let Some(previous) = &self.rerun_failed {
            let previous = ResultSet::from_path(previous)?;
            selection.restrict_to_failed(&previous.failed_methods());
            info!(
                "rerunning {} failing tests across {} units",
                selection.method_count(),
                selection.units.len()
            );
        }

        Ok(selection)
    }
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "RUNNER OPTIONS")]
struct RunnerOpts {
    /// Number of units to run simultaneously [default: from config]
    #[arg(long, short = 'j', visible_alias = "jobs", value_name = "WORKERS")]
    max_concurrent: Option<NonZeroUsize>,

    /// Directory for suite reports and run summaries [default: from config]
    #[arg(long, value_name = "DIR")]
    results_dir: Option<Utf8PathBuf>,

    /// Print the selection and exit without running anything
    #[arg(long)]
    dry_run: bool,

    /// Format for the selection output
    #[arg(long, value_enum, default_value_t, value_name = "FMT")]
    message_format: MessageFormatOpts,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Plain,
    Json,
}

fn exec_run(
    config: &SuitemillConfig,
    selection_opts: &SelectionOpts,
    runner_opts: &RunnerOpts,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let selection = selection_opts.compute(config)?;

    {
        let mut stdout = output_writer.stdout_writer();
        match runner_opts.message_format {
            MessageFormatOpts::Plain => {
                write_case_ids(&selection.case_ids(), &mut stdout)
                    .map_err(ExpectedError::write_output_error)?;
            }
            MessageFormatOpts::Json => {
                serde_json::to_writer_pretty(&mut stdout, &selection.to_summary())
                    .map_err(|err| ExpectedError::SerializeOutputError { err })?;
                writeln!(stdout).map_err(ExpectedError::write_output_error)?;
            }
        }
        stdout.flush().map_err(ExpectedError::write_output_error)?;
    }

    if runner_opts.dry_run {
        return Ok(SuitemillExitCode::OK);
    }

    let results_dir = runner_opts
        .results_dir
        .clone()
        .unwrap_or_else(|| config.results_dir());
    prepare_results_dir(&results_dir)?;

    let runtime = CommandRuntime::from_config(config.runtime())?;
    let max_concurrent = runner_opts
        .max_concurrent
        .unwrap_or_else(|| config.max_concurrent());
    let runner = TestRunner::new(&runtime, ReportWriter::new(&results_dir), max_concurrent);

    let mut displayer = RunDisplayer::new();
    if output.color.should_colorize(Stream::Stderr) {
        displayer.colorize();
    }

    let completion = {
        let mut stderr = output_writer.stderr_writer();
        let mut write_error = None;
        let completion = runner.execute(selection.units, |event| {
            // Write and flush the event.
            let res = displayer
                .write_event(&event, &mut stderr)
                .and_then(|()| stderr.flush());
            if let Err(error) = res {
                write_error.get_or_insert(error);
            }
        })?;
        if let Some(error) = write_error {
            return Err(ExpectedError::write_output_error(error));
        }
        completion
    };

    let summary = RunSummary::from_reports(&completion.completed);
    let ownership = if config.sort_summary_by_owner() {
        ownership_for(config, None)?
    } else {
        None
    };
    summary.write_to(&results_dir, ownership.as_ref())?;
    let body = match &ownership {
        Some(map) => summary.body_by_owner(map),
        None => summary.body(),
    };
    write_summary(&body, &summary.bottom_line(), output_writer)?;

    if !completion.report_write_failures.is_empty() {
        return Err(ExpectedError::ReportWriteFailed {
            count: completion.report_write_failures.len(),
        });
    }
    if !completion.is_success() {
        return Err(ExpectedError::TestRunFailed);
    }
    Ok(SuitemillExitCode::OK)
}

/// Creates the results directory, removing reports and summaries left over from a previous run.
///
/// Other files in the directory are left alone.
fn prepare_results_dir(results_dir: &Utf8Path) -> Result<()> {
    let dir_error = |err| ExpectedError::results_dir_error(results_dir, err);
    std::fs::create_dir_all(results_dir).map_err(dir_error)?;

    let mut removed = 0;
    for entry in results_dir.read_dir_utf8().map_err(dir_error)? {
        let entry = entry.map_err(dir_error)?;
        let file_name = entry.file_name();
        let is_stale = is_report_file_name(file_name)
            || file_name == SUMMARY_FILE_NAME
            || file_name == BOTTOM_LINE_FILE_NAME;
        if is_stale && entry.path().is_file() {
            std::fs::remove_file(entry.path()).map_err(dir_error)?;
            removed += 1;
        }
    }
    if removed > 0 {
        info!("removed {removed} stale files from `{results_dir}`");
    }
    Ok(())
}

/// Returns the ownership map from the command line, or from config if none was given.
fn ownership_for(
    config: &SuitemillConfig,
    from_cli: Option<&Utf8Path>,
) -> Result<Option<OwnershipMap>> {
    let path = match from_cli {
        Some(path) => Some(path.to_owned()),
        None => config.ownership_map(),
    };
    match path {
        Some(path) => Ok(Some(OwnershipMap::from_path(&path)?)),
        None => Ok(None),
    }
}

const CASE_IDS_PER_ROW: usize = 10;

fn write_case_ids(case_ids: &BTreeSet<String>, mut writer: impl Write) -> std::io::Result<()> {
    writeln!(writer, "Case IDs ({}):", case_ids.len())?;
    for row in &case_ids.iter().chunks(CASE_IDS_PER_ROW) {
        writeln!(writer, "  {}", row.format(", "))?;
    }
    Ok(())
}

fn write_summary(body: &str, bottom_line: &str, output_writer: &mut OutputWriter) -> Result<()> {
    let mut stdout = output_writer.stdout_writer();
    let separator = "-".repeat(50);
    writeln!(stdout, "{separator}\n{body}{separator}\n{bottom_line}")
        .and_then(|()| stdout.flush())
        .map_err(ExpectedError::write_output_error)
}
