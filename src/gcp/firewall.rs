use super::{ensure_output_dir, run_gcloud, timestamp};
use crate::runner::CommandRunner;
use ansi_term::Colour::Green;
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Only supported output type for the rules export.
pub const OUTPUT_TYPE: &str = "csv";

pub const FILE_PREFIX: &str = "gcp-firewall-rules";

// Columns requested from gcloud, one row per firewall rule
const CSV_FORMAT: &str = "csv(name,network,direction,priority,\
sourceRanges.list():label=SOURCE_RANGES,destinationRanges.list():label=DESTINATION_RANGES,\
allowed.list():label=ALLOWED,denied.list():label=DENIED,\
sourceTags.list():label=SOURCE_TAGS,targetTags.list():label=TARGET_TAGS,disabled)";

/// Export all firewall rules of the project to a timestamped CSV file and
/// return the file path.
pub fn export_rules(
    runner: &dyn CommandRunner,
    project: &str,
    output_dir: &Path,
    output_type: &str,
) -> Result<PathBuf> {
    if output_type != OUTPUT_TYPE {
        bail!(
            "unsupported output type '{}', only '{}' is supported",
            output_type,
            OUTPUT_TYPE
        );
    }

    debug!("====> Exporting firewall rules for GCP project: {}", project);

    let format_arg = format!("--format={}", CSV_FORMAT);
    let output = run_gcloud(
        runner,
        &[
            "compute",
            "firewall-rules",
            "list",
            "--project",
            project,
            &format_arg,
        ],
    )?;
    if !output.success() {
        bail!(
            "failed to export firewall rules for project '{}': {}",
            project,
            output.stderr
        );
    }
    if output.stdout.is_empty() {
        warn!(
            "gcloud returned no firewall rules for project '{}', the output file will be empty.",
            project
        );
    }

    ensure_output_dir(output_dir)?;
    let path = output_dir.join(format!("{}-{}-{}.csv", FILE_PREFIX, project, timestamp()));
    fs::write(&path, &output.stdout)
        .with_context(|| format!("failed to write firewall rules to {}", path.display()))?;

    info!(
        "{}: exported firewall rules for project '{}' to {}",
        Green.paint("Success"),
        project,
        path.display()
    );
    Ok(path)
}
