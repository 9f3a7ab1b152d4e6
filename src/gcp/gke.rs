use super::run_gcloud;
use crate::runner::CommandRunner;
use ansi_term::Colour::{Green, Purple};
use anyhow::{bail, Result};
use log::{debug, info};

/// Configure kubectl to talk to a GKE cluster via `gcloud container clusters
/// get-credentials`.
pub fn connect_cluster(
    runner: &dyn CommandRunner,
    project: &str,
    location: &str,
    cluster: &str,
    dryrun: bool,
) -> Result<()> {
    if project.is_empty() || location.is_empty() || cluster.is_empty() {
        bail!("project, location (region/zone) and cluster name are required to connect to a GKE cluster");
    }

    info!(
        "Configuring kubectl for GKE cluster '{}' in '{}' (project: '{}')...",
        cluster, location, project
    );

    let mut args = vec![
        "container", "clusters", "get-credentials", cluster,
        "--project", project,
    ];
    // two hyphens means a zone (us-central1-a), otherwise a region (us-central1)
    if location.matches('-').count() == 2 {
        args.push("--zone");
    } else {
        args.push("--region");
    }
    args.push(location);

    if dryrun {
        info!("{}: gcloud {}", Purple.paint("Dry-run"), args.join(" "));
        return Ok(());
    }

    let output = run_gcloud(runner, &args)?;
    if !output.success() {
        bail!(
            "failed to get GKE cluster credentials for '{}' in '{}' (project: '{}'): {}",
            cluster,
            location,
            project,
            output.stderr
        );
    }

    if !output.stdout.is_empty() {
        debug!("gcloud get-credentials stdout: {}", output.stdout);
    }
    info!(
        "{}: kubectl configured for GKE cluster '{}' in '{}' (project: '{}').",
        Green.paint("Success"),
        cluster,
        location,
        project
    );
    Ok(())
}
