use super::run_gcloud;
use crate::runner::CommandRunner;
use anyhow::{bail, Result};
use log::debug;

/// Role required to perform the administrative actions.
pub const REQUIRED_ROLE: &str = "roles/owner";

/// Verify gcloud is authenticated and return the active account.
pub fn check_gcloud_auth(runner: &dyn CommandRunner) -> Result<String> {
    debug!("Checking gcloud authentication status...");

    let output = run_gcloud(runner, &["config", "get-value", "account"])?;
    let account = output.stdout.trim().to_string();

    if !output.success() || account.is_empty() {
        bail!(
            "gcloud is not authenticated, run 'gcloud auth login' and \
             'gcloud auth application-default login' first. Stderr: {}",
            output.stderr
        );
    }

    debug!("gcloud is authenticated with account: {}", account);
    Ok(account)
}

/// Verify the active account holds [`REQUIRED_ROLE`] on the project.
pub fn check_admin_permissions(runner: &dyn CommandRunner, project: &str) -> Result<()> {
    if project.is_empty() {
        bail!("project id is required to check admin permissions");
    }

    let account = check_gcloud_auth(runner)?;
    let member = format!("user:{}", account);
    debug!("Checking '{}' for member: {}", REQUIRED_ROLE, member);

    // If the account holds the role the command prints it, otherwise nothing
    let filter = format!(
        "--filter=bindings.role:{} AND bindings.members:{}",
        REQUIRED_ROLE, member
    );
    let output = run_gcloud(
        runner,
        &[
            "projects",
            "get-iam-policy",
            project,
            "--flatten=bindings[].members",
            &filter,
            "--format=value(bindings.role)",
        ],
    )?;

    if !output.success() {
        bail!(
            "'gcloud projects get-iam-policy' failed for project '{}'. Stderr: {}",
            project,
            output.stderr
        );
    }

    if output.stdout.trim() != REQUIRED_ROLE {
        bail!(
            "account '{}' does not have '{}' on project '{}', insufficient permissions for administrative tasks",
            account,
            REQUIRED_ROLE,
            project
        );
    }

    debug!(
        "Account '{}' has '{}' on project '{}'. Administrative permissions check passed.",
        account, REQUIRED_ROLE, project
    );
    Ok(())
}
