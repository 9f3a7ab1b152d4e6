use super::run_gcloud;
use crate::runner::CommandRunner;
use ansi_term::Colour::{Green, Purple};
use anyhow::{bail, Result};
use log::{info, warn};

/// Create a service account in the project.
pub fn create_service_account(
    runner: &dyn CommandRunner,
    project: &str,
    account_id: &str,
    description: &str,
    dryrun: bool,
) -> Result<()> {
    if project.is_empty() || account_id.is_empty() {
        bail!("project and service account id are required to create a service account");
    }

    // gcloud prints the email on success, constructing it is safer than parsing
    let email = format!("{}@{}.iam.gserviceaccount.com", account_id, project);

    info!(
        "Creating service account '{}' in project '{}'...",
        account_id, project
    );

    let mut args = vec![
        "iam", "service-accounts", "create", account_id,
        "--display-name", account_id,
        "--project", project,
    ];
    if !description.is_empty() {
        args.push("--description");
        args.push(description);
    }

    if dryrun {
        info!("{}: gcloud {}", Purple.paint("Dry-run"), args.join(" "));
        return Ok(());
    }

    let output = run_gcloud(runner, &args)?;
    if !output.success() {
        if output.stderr.contains("already exists") {
            warn!("Service account '{}' already exists.", email);
            return Ok(());
        }
        bail!(
            "failed to create service account '{}' on project '{}': {}",
            account_id,
            project,
            output.stderr
        );
    }

    info!(
        "{}: service account '{}' created. Email: {} on project '{}'.",
        Green.paint("Success"),
        account_id,
        email,
        project
    );
    Ok(())
}

/// Grant an IAM role to a member on the project.
/// `add-iam-policy-binding` is idempotent, an existing binding does not fail.
pub fn grant_role(
    runner: &dyn CommandRunner,
    project: &str,
    member: &str,
    role: &str,
    dryrun: bool,
) -> Result<()> {
    if project.is_empty() || member.is_empty() || role.is_empty() {
        bail!("project, member and role are required to grant an IAM role");
    }

    info!(
        "Granting role '{}' to member '{}' on project '{}'...",
        role, member, project
    );

    let args = [
        "projects", "add-iam-policy-binding", project,
        "--member", member,
        "--role", role,
        "--condition=None",
        "--project", project,
    ];

    if dryrun {
        info!("{}: gcloud {}", Purple.paint("Dry-run"), args.join(" "));
        return Ok(());
    }

    let output = run_gcloud(runner, &args)?;
    if !output.success() {
        if output.stderr.contains("PERMISSION_DENIED")
            && output.stderr.contains("resourcemanager.projects.setIamPolicy")
        {
            bail!(
                "permission denied to set IAM policy for project '{}': {}",
                project,
                output.stderr
            );
        }
        bail!(
            "failed to grant role '{}' to member '{}' on project '{}': {}",
            role,
            member,
            project,
            output.stderr
        );
    }

    info!(
        "{}: granted (or ensured) role '{}' to member '{}' on project '{}'.",
        Green.paint("Success"),
        role,
        member,
        project
    );
    Ok(())
}
