pub mod checks;
pub mod cloudsql;
pub mod firewall;
pub mod gke;
pub mod iam;

use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use anyhow::{Context, Result};
use ascii_table::AsciiTable;
use chrono::Local;
use log::{debug, info};
use std::fs;
use std::path::Path;

/// Run a gcloud command, capturing stdout and stderr.
///
/// A non-zero exit is not an error here: callers inspect the outcome so they
/// can match on stderr (e.g. "already exists").
pub fn run_gcloud(runner: &dyn CommandRunner, args: &[&str]) -> Result<CommandOutput> {
    run_tool(runner, "gcloud", args, &[])
}

/// Run a psql command. `env` carries connection settings such as PGPASSWORD
/// so they never appear on the command line.
pub fn run_psql(
    runner: &dyn CommandRunner,
    args: &[&str],
    env: &[(&str, &str)],
) -> Result<CommandOutput> {
    run_tool(runner, "psql", args, env)
}

fn run_tool(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
) -> Result<CommandOutput> {
    let mut spec = CommandSpec::new(program, args);
    for (key, value) in env {
        spec = spec.env(key, value);
    }

    debug!("Executing command: {}", spec.rendered());
    let output = runner.run(&spec)?;

    // stderr on a successful exit usually carries warnings worth surfacing
    if output.success() && !output.stderr.is_empty() {
        info!("{} stderr (exit code 0):\n{}", program, output.stderr);
    }

    Ok(output)
}

/// Timestamp fragment used in exported file names.
pub(crate) fn timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

pub(crate) fn ensure_output_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }
    Ok(())
}

/// Print a summary table sized to the terminal.
pub(crate) fn print_summary(summary: Vec<Vec<String>>) {
    let term_width = term_size::dimensions().map(|(w, _)| w).unwrap_or(120) - 5;

    let mut table = AsciiTable::default();
    table.set_max_width(term_width);

    info!("Summary:\n{}", table.format(summary));
}
