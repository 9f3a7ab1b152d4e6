use anyhow::Result;
use log::debug;
use opsctl::cli::{self, CloudsqlCommand, Command, FirewallCommand, GcpCommand, GkeCommand, IamCommand};
use opsctl::config::Properties;
use opsctl::editor;
use opsctl::gcp::{checks, cloudsql, firewall, gke, iam};
use opsctl::gen;
use opsctl::runner::SystemRunner;
use opsctl::tools::ToolCache;
use std::fs;

fn main() -> Result<()> {
    let cli = cli::parse();

    let level = if cli.globals.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.cmd {
        Command::Merge {
            base,
            overlay,
            output,
            in_place,
        } => {
            if in_place {
                editor::merge_file_in_place(&base, &overlay)?;
                println!("Merged into {}", base.display());
            } else {
                let merged = editor::merge_files(&base, &overlay)?;
                match output {
                    Some(path) => {
                        fs::write(&path, merged)?;
                        println!("Merged into {}", path.display());
                    }
                    None => print!("{}", merged),
                }
            }
        }

        Command::Patch { target, overlay } => {
            editor::apply_overlay_recursively(&target, &overlay)?;
            println!("Patched YAML files under {}", target.display());
        }

        Command::Sync { source, target } => {
            editor::sync_dir(&source, &target)?;
            println!("Synced {} into {}", source.display(), target.display());
        }

        Command::GenPass { length } => {
            println!("Generated password: {}", gen::gen_password(length));
        }

        Command::Gcp(gcp_cmd) => run_gcp(&cli.globals, gcp_cmd)?,
    }

    Ok(())
}

fn run_gcp(globals: &cli::GlobalOpts, cmd: GcpCommand) -> Result<()> {
    let mut properties = Properties::load(globals.config_file.as_deref())?;
    if let Some(environment) = &globals.environment {
        properties.environment = environment.clone();
    }
    if let Some(project) = &globals.gcp_project {
        properties.gcp_project = project.clone();
    }
    if let Some(region) = &globals.gcp_region {
        properties.gcp_region = region.clone();
    }
    if let Some(database_type) = globals.database_type {
        properties.database_type = database_type;
    }
    properties.validate()?;

    debug!("====> Values loaded for gcp subcommand");
    properties.log_fields();
    debug!("Final configuration:\n{}", properties);

    let runner = SystemRunner;
    let dryrun = cmd.dryrun();

    if !dryrun {
        let tools = ToolCache::new();
        tools.ensure_available(&cmd.required_tools())?;
        checks::check_admin_permissions(&runner, &properties.gcp_project)?;
    }

    match cmd {
        GcpCommand::Cloudsql(sub) => match sub {
            CloudsqlCommand::CreateUser {
                instance,
                username,
                password,
                source_host,
                dryrun,
            } => cloudsql::create_user(
                &runner,
                &properties.gcp_project,
                &instance,
                &username,
                &password,
                &source_host,
                dryrun,
            )?,

            CloudsqlCommand::CreateDatabase {
                instance,
                dbname,
                charset,
                collation,
                dryrun,
            } => cloudsql::create_database(
                &runner,
                &properties.gcp_project,
                &instance,
                &dbname,
                &charset,
                &collation,
                dryrun,
            )?,

            CloudsqlCommand::ExportPermissions {
                instance,
                address,
                port,
                username,
                password,
                output_dir,
                regex_ignore_databases,
                ssl_required,
            } => {
                cloudsql::export_user_permissions(
                    &runner,
                    &properties.gcp_project,
                    &instance,
                    &address,
                    &port,
                    &username,
                    &password,
                    &output_dir,
                    &regex_ignore_databases,
                    ssl_required,
                )?;
            }

            CloudsqlCommand::ExportAuditLogs {
                instance,
                output_dir,
            } => {
                cloudsql::export_audit_logs(
                    &runner,
                    &properties.gcp_project,
                    &instance,
                    &output_dir,
                )?;
            }
        },

        GcpCommand::Iam(sub) => match sub {
            IamCommand::CreateSa {
                service_account_id,
                sa_description,
                dryrun,
            } => iam::create_service_account(
                &runner,
                &properties.gcp_project,
                &service_account_id,
                &sa_description,
                dryrun,
            )?,

            IamCommand::GrantRole {
                member,
                role,
                dryrun,
            } => iam::grant_role(&runner, &properties.gcp_project, &member, &role, dryrun)?,
        },

        GcpCommand::Firewall(FirewallCommand::ExportRules {
            output_dir,
            output_type,
        }) => {
            firewall::export_rules(&runner, &properties.gcp_project, &output_dir, &output_type)?;
        }

        GcpCommand::Gke(GkeCommand::Connect {
            cluster,
            location,
            dryrun,
        }) => gke::connect_cluster(
            &runner,
            &properties.gcp_project,
            &location,
            &cluster,
            dryrun,
        )?,
    }

    Ok(())
}
