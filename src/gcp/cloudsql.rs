use super::{ensure_output_dir, print_summary, run_gcloud, run_psql, timestamp};
use crate::runner::CommandRunner;
use ansi_term::Colour::{Green, Purple};
use anyhow::{bail, Context, Result};
use indoc::indoc;
use log::{info, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const LIST_DATABASES_SQL: &str = "SELECT datname FROM pg_database WHERE datistemplate = false;";

// System and managed roles carry no information for the report
const TABLE_GRANTS_SQL: &str = indoc! {"
    SELECT grantee, table_schema, table_name, privilege_type
    FROM information_schema.role_table_grants
    WHERE grantee != 'postgres'
      AND grantee NOT LIKE 'pg_%'
      AND grantee NOT LIKE 'cloudsql%'
    ORDER BY grantee, table_schema, table_name;
"};

/// One row of `information_schema.role_table_grants`.
#[derive(Debug)]
struct GrantRow {
    grantee: String,
    schema: String,
    table: String,
    privilege: String,
}

/// Create a user in a Cloud SQL instance.
/// The source host defaults to '%' so the user can connect from anywhere.
pub fn create_user(
    runner: &dyn CommandRunner,
    project: &str,
    instance: &str,
    username: &str,
    password: &str,
    host: &str,
    dryrun: bool,
) -> Result<()> {
    if project.is_empty() || instance.is_empty() || username.is_empty() {
        bail!("project, instance and username are required to create a SQL user");
    }
    if password.is_empty() {
        bail!(
            "no password provided for SQL user '{}', pass --password or generate one with `gen-pass`",
            username
        );
    }
    let host = if host.is_empty() { "%" } else { host };

    info!(
        "Creating SQL user '{}' for instance '{}' on project '{}' (source-host: '{}')...",
        username, instance, project, host
    );

    let args = [
        "sql", "users", "create", username,
        "--instance", instance,
        "--host", host,
        "--project", project,
        "--password", password,
    ];

    if dryrun {
        info!("{}: gcloud {}", Purple.paint("Dry-run"), render_masked(&args));
        return Ok(());
    }

    let output = run_gcloud(runner, &args)?;
    if !output.success() {
        if output.stderr.contains("already exists") {
            warn!(
                "SQL user '{}'@'{}' already exists on instance '{}' on project '{}'.",
                username, host, instance, project
            );
            return Ok(());
        }
        bail!(
            "failed to create SQL user '{}' on instance '{}' on project '{}': {}",
            username,
            instance,
            project,
            output.stderr
        );
    }

    info!(
        "{}: SQL user '{}'@'{}' created for instance '{}' on project '{}'.",
        Green.paint("Success"),
        username,
        host,
        instance,
        project
    );
    Ok(())
}

/// Create a database in a Cloud SQL instance.
pub fn create_database(
    runner: &dyn CommandRunner,
    project: &str,
    instance: &str,
    dbname: &str,
    charset: &str,
    collation: &str,
    dryrun: bool,
) -> Result<()> {
    if project.is_empty() || instance.is_empty() || dbname.is_empty() {
        bail!("project, instance and dbname are required to create a SQL database");
    }

    info!(
        "Creating SQL database '{}' for instance '{}' on project '{}'...",
        dbname, instance, project
    );

    let mut args = vec![
        "sql", "databases", "create", dbname,
        "--instance", instance,
        "--project", project,
    ];
    if !charset.is_empty() {
        args.push("--charset");
        args.push(charset);
    }
    if !collation.is_empty() {
        args.push("--collation");
        args.push(collation);
    }

    if dryrun {
        info!("{}: gcloud {}", Purple.paint("Dry-run"), args.join(" "));
        return Ok(());
    }

    let output = run_gcloud(runner, &args)?;
    if !output.success() {
        if output.stderr.contains("already exists") {
            warn!(
                "SQL database '{}' already exists on instance '{}' on project '{}'.",
                dbname, instance, project
            );
            return Ok(());
        }
        bail!(
            "failed to create SQL database '{}' on instance '{}' on project '{}': {}",
            dbname,
            instance,
            project,
            output.stderr
        );
    }

    info!(
        "{}: SQL database '{}' created for instance '{}' on project '{}'.",
        Green.paint("Success"),
        dbname,
        instance,
        project
    );
    Ok(())
}

/// Export a per-table permissions report for every database of a PostgreSQL
/// instance. Returns the path of the written report.
#[allow(clippy::too_many_arguments)]
pub fn export_user_permissions(
    runner: &dyn CommandRunner,
    project: &str,
    instance: &str,
    address: &str,
    port: &str,
    username: &str,
    password: &str,
    output_dir: &Path,
    ignore_databases: &str,
    ssl_required: bool,
) -> Result<PathBuf> {
    info!(
        "Exporting user permissions from instance '{}' in project '{}'",
        instance, project
    );

    let ignore = if ignore_databases.is_empty() {
        None
    } else {
        Some(Regex::new(ignore_databases).with_context(|| {
            format!("invalid --regex-ignore-databases: {}", ignore_databases)
        })?)
    };

    let databases: Vec<String> = list_databases(runner, address, port, username, password, ssl_required)?
        .into_iter()
        .filter(|db| ignore.as_ref().map_or(true, |re| !re.is_match(db)))
        .collect();

    let mut report = format!(
        "User and Role Permissions Report for Instance: '{}'\n\n",
        instance
    );
    let mut summary = vec![
        vec!["Database".to_string(), "Grant Rows".to_string()],
        vec!["---".to_string(), "---".to_string()],
    ];

    for db in &databases {
        info!("Checking permissions in database: {}", db);
        report.push_str(&format!(
            "========================================\n DATABASE: {}\n========================================\n\n",
            db
        ));

        let rows = match query_table_grants(runner, address, port, username, password, db, ssl_required)
        {
            Ok(rows) => rows,
            Err(e) => {
                report.push_str(&format!("Could not query permissions in {}: {}\n\n", db, e));
                summary.push(vec![db.clone(), "error".to_string()]);
                continue;
            }
        };

        summary.push(vec![db.clone(), rows.len().to_string()]);

        if rows.is_empty() {
            report.push_str("No specific user permissions found on tables in this database.\n\n");
            continue;
        }

        // grantee -> schema.table -> privileges
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for row in rows {
            grouped
                .entry(row.grantee)
                .or_default()
                .entry(format!("{}.{}", row.schema, row.table))
                .or_default()
                .push(row.privilege);
        }

        for (user, tables) in &grouped {
            report.push_str(&format!("  User/Role: {}\n", user));
            for (table, privileges) in tables {
                report.push_str(&format!("    - Table: {}\n", table));
                report.push_str(&format!("      Permissions: {}\n", privileges.join(", ")));
            }
            report.push('\n');
        }
    }

    ensure_output_dir(output_dir)?;
    let path = output_dir.join(format!(
        "{}_{}_database_permissions_{}.txt",
        project,
        instance,
        timestamp()
    ));
    fs::write(&path, &report)
        .with_context(|| format!("failed to write permissions report to {}", path.display()))?;

    print_summary(summary);
    info!(
        "{}: exported detailed database permissions to {}",
        Green.paint("Success"),
        path.display()
    );
    Ok(path)
}

/// Export DML audit logs (INSERT, UPDATE, DELETE) of a Cloud SQL instance.
/// Requires the `cloudsql.enable_pgaudit` flag on the instance.
pub fn export_audit_logs(
    runner: &dyn CommandRunner,
    project: &str,
    instance: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    info!(
        "Exporting audit logs for instance '{}' in project '{}'",
        instance, project
    );

    let filter = format!(
        "resource.type=\"cloudsql_database\"\n\
         resource.labels.database_id=\"{project}:{instance}\"\n\
         logName=\"projects/{project}/logs/cloudsql.googleapis.com%2Fpostgres.log\"\n\
         (textPayload:\"statement: INSERT\" OR textPayload:\"statement: UPDATE\" OR textPayload:\"statement: DELETE\")"
    );
    info!("Using log filter:\n{}", filter);

    let output = run_gcloud(
        runner,
        &[
            "logging",
            "read",
            &filter,
            "--project",
            project,
            "--format=value(timestamp,textPayload)",
        ],
    )?;
    if !output.success() {
        bail!(
            "failed to read audit logs for instance '{}' in project '{}': {}",
            instance,
            project,
            output.stderr
        );
    }
    if output.stdout.is_empty() {
        bail!(
            "no audit logs found, ensure the 'cloudsql.enable_pgaudit' flag is enabled on the \
             instance (see https://cloud.google.com/sql/docs/postgres/pg-audit)"
        );
    }

    ensure_output_dir(output_dir)?;
    let path = output_dir.join(format!(
        "{}_{}_audit_logs_{}.txt",
        project,
        instance,
        timestamp()
    ));
    fs::write(&path, &output.stdout)
        .with_context(|| format!("failed to write audit logs to {}", path.display()))?;

    info!(
        "{}: exported audit logs to {}",
        Green.paint("Success"),
        path.display()
    );
    Ok(path)
}

fn list_databases(
    runner: &dyn CommandRunner,
    address: &str,
    port: &str,
    username: &str,
    password: &str,
    ssl_required: bool,
) -> Result<Vec<String>> {
    let stdout = run_sql(
        runner,
        address,
        port,
        username,
        password,
        "postgres",
        ssl_required,
        LIST_DATABASES_SQL,
    )?;

    Ok(stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn query_table_grants(
    runner: &dyn CommandRunner,
    address: &str,
    port: &str,
    username: &str,
    password: &str,
    dbname: &str,
    ssl_required: bool,
) -> Result<Vec<GrantRow>> {
    let stdout = run_sql(
        runner,
        address,
        port,
        username,
        password,
        dbname,
        ssl_required,
        TABLE_GRANTS_SQL,
    )?;

    let mut rows = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(4, '|');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(grantee), Some(schema), Some(table), Some(privilege)) => rows.push(GrantRow {
                grantee: grantee.to_string(),
                schema: schema.to_string(),
                table: table.to_string(),
                privilege: privilege.to_string(),
            }),
            _ => warn!("Skipping malformed grant row in {}: {}", dbname, line),
        }
    }
    Ok(rows)
}

/// Run one SQL statement through psql in tuples-only, unaligned,
/// pipe-separated mode so the output parses line by line.
#[allow(clippy::too_many_arguments)]
fn run_sql(
    runner: &dyn CommandRunner,
    address: &str,
    port: &str,
    username: &str,
    password: &str,
    dbname: &str,
    ssl_required: bool,
    sql: &str,
) -> Result<String> {
    let args = [
        "--host", address,
        "--port", port,
        "--username", username,
        "--dbname", dbname,
        "--no-password",
        "--tuples-only",
        "--no-align",
        "--field-separator", "|",
        "--command", sql,
    ];

    let mut env = vec![("PGPASSWORD", password)];
    if ssl_required {
        env.push(("PGSSLMODE", "require"));
    }

    let output = run_psql(runner, &args, &env)?;
    if !output.success() {
        bail!("psql query failed on database '{}': {}", dbname, output.stderr);
    }

    Ok(output.stdout)
}

// The password value must never reach the logs
fn render_masked(args: &[&str]) -> String {
    let mut shown: Vec<&str> = args.to_vec();
    if let Some(i) = shown.iter().position(|arg| *arg == "--password") {
        if i + 1 < shown.len() {
            shown[i + 1] = "********";
        }
    }
    shown.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;
    use tempfile::tempdir;

    #[test]
    fn test_create_user_builds_gcloud_args() {
        let runner = FakeRunner::with_outputs(vec![FakeRunner::ok("")]);

        create_user(&runner, "my-project", "nonprod-psql", "app", "s3cret", "%", false).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].program, "gcloud");
        assert_eq!(
            calls[0].args,
            vec![
                "sql", "users", "create", "app",
                "--instance", "nonprod-psql",
                "--host", "%",
                "--project", "my-project",
                "--password", "s3cret",
            ]
        );
    }

    #[test]
    fn test_create_user_existing_user_is_not_an_error() {
        let runner = FakeRunner::with_outputs(vec![FakeRunner::failed(
            "ERROR: (gcloud.sql.users.create) user already exists",
        )]);

        create_user(&runner, "my-project", "nonprod-psql", "app", "s3cret", "%", false).unwrap();
    }

    #[test]
    fn test_create_user_other_failures_propagate() {
        let runner = FakeRunner::with_outputs(vec![FakeRunner::failed("quota exceeded")]);

        let err = create_user(&runner, "my-project", "nonprod-psql", "app", "s3cret", "%", false)
            .unwrap_err();

        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_create_user_requires_password() {
        let runner = FakeRunner::with_outputs(vec![]);

        let err =
            create_user(&runner, "my-project", "nonprod-psql", "app", "", "%", false).unwrap_err();

        assert!(err.to_string().contains("no password provided"));
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_create_user_dryrun_runs_nothing() {
        let runner = FakeRunner::with_outputs(vec![]);

        create_user(&runner, "my-project", "nonprod-psql", "app", "s3cret", "%", true).unwrap();

        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn test_create_database_optional_flags() {
        let runner = FakeRunner::with_outputs(vec![FakeRunner::ok("")]);

        create_database(&runner, "my-project", "nonprod-psql", "app-db", "UTF8", "", false)
            .unwrap();

        let calls = runner.calls.borrow();
        assert!(calls[0].args.contains(&"--charset".to_string()));
        assert!(!calls[0].args.contains(&"--collation".to_string()));
    }

    #[test]
    fn test_export_permissions_groups_by_user_and_table() {
        let dir = tempdir().expect("failed to create temp dir");
        let runner = FakeRunner::with_outputs(vec![
            // database list
            FakeRunner::ok("postgres\napp_db\n"),
            // grants for postgres db
            FakeRunner::ok(""),
            // grants for app_db
            FakeRunner::ok(
                "app|public|orders|SELECT\napp|public|orders|INSERT\nreporter|public|orders|SELECT\n",
            ),
        ]);

        let path = export_user_permissions(
            &runner,
            "my-project",
            "nonprod-psql",
            "db.example.com",
            "5432",
            "postgres",
            "s3cret",
            dir.path(),
            "",
            false,
        )
        .unwrap();

        let report = fs::read_to_string(&path).unwrap();
        assert!(report.contains("DATABASE: app_db"));
        assert!(report.contains("User/Role: app"));
        assert!(report.contains("- Table: public.orders"));
        assert!(report.contains("Permissions: SELECT, INSERT"));
        assert!(report.contains("User/Role: reporter"));
        assert!(report
            .contains("No specific user permissions found on tables in this database."));
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("my-project_nonprod-psql_database_permissions_"));
    }

    #[test]
    fn test_export_permissions_honors_ignore_regex() {
        let dir = tempdir().expect("failed to create temp dir");
        let runner = FakeRunner::with_outputs(vec![
            FakeRunner::ok("prisma_migrate_shadow\napp_db\n"),
            // only app_db is queried
            FakeRunner::ok("app|public|orders|SELECT\n"),
        ]);

        export_user_permissions(
            &runner,
            "my-project",
            "nonprod-psql",
            "db.example.com",
            "5432",
            "postgres",
            "s3cret",
            dir.path(),
            "^prisma_migrate",
            false,
        )
        .unwrap();

        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn test_export_permissions_sets_sslmode_when_required() {
        let dir = tempdir().expect("failed to create temp dir");
        let runner = FakeRunner::with_outputs(vec![FakeRunner::ok("app_db\n"), FakeRunner::ok("")]);

        export_user_permissions(
            &runner,
            "my-project",
            "nonprod-psql",
            "db.example.com",
            "5432",
            "postgres",
            "s3cret",
            dir.path(),
            "",
            true,
        )
        .unwrap();

        let calls = runner.calls.borrow();
        assert!(calls[0]
            .env
            .contains(&("PGSSLMODE".to_string(), "require".to_string())));
        assert!(calls[0]
            .env
            .contains(&("PGPASSWORD".to_string(), "s3cret".to_string())));
    }

    #[test]
    fn test_export_audit_logs_writes_gcloud_output() {
        let dir = tempdir().expect("failed to create temp dir");
        let runner = FakeRunner::with_outputs(vec![FakeRunner::ok(
            "2025-01-01T00:00:00Z statement: INSERT INTO orders VALUES (1)\n",
        )]);

        let path = export_audit_logs(&runner, "my-project", "nonprod-psql", dir.path()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("statement: INSERT"));
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("my-project_nonprod-psql_audit_logs_"));

        let calls = runner.calls.borrow();
        assert!(calls[0]
            .args
            .iter()
            .any(|arg| arg.contains("cloudsql_database")));
    }

    #[test]
    fn test_export_audit_logs_fails_when_empty() {
        let dir = tempdir().expect("failed to create temp dir");
        let runner = FakeRunner::with_outputs(vec![FakeRunner::ok("")]);

        let err =
            export_audit_logs(&runner, "my-project", "nonprod-psql", dir.path()).unwrap_err();

        assert!(err.to_string().contains("no audit logs found"));
    }

    #[test]
    fn test_render_masked_hides_password() {
        let rendered = render_masked(&["sql", "users", "create", "app", "--password", "s3cret"]);

        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("--password ********"));
    }
}
