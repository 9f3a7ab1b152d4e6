use crate::config::DatabaseType;
use std::path::PathBuf;
use structopt::StructOpt;

/// Automate cloud Ops tasks (Cloud SQL, IAM, firewall, GKE) and keep YAML
/// manifests in sync
#[derive(Debug, StructOpt)]
#[structopt(name = "opsctl")]
pub struct Cli {
    #[structopt(flatten)]
    pub globals: GlobalOpts,

    #[structopt(subcommand)]
    pub cmd: Command,
}

/// Flags shared by every subcommand. Values given here override the config
/// file and the CLI_* environment variables.
#[derive(Debug, StructOpt)]
pub struct GlobalOpts {
    /// Config file path
    #[structopt(short = "C", long, parse(from_os_str), global = true)]
    pub config_file: Option<PathBuf>,

    /// Name of environment. Supported values: dev, staging or production
    #[structopt(short = "E", long, global = true)]
    pub environment: Option<String>,

    /// GCP project name
    #[structopt(short = "P", long, global = true)]
    pub gcp_project: Option<String>,

    /// GCP region
    #[structopt(short = "R", long, global = true)]
    pub gcp_region: Option<String>,

    /// Database type. Supported values: postgresql, mongodb or none
    #[structopt(short = "T", long, global = true)]
    pub database_type: Option<DatabaseType>,

    /// Enable debug mode
    #[structopt(short = "D", long, global = true)]
    pub debug: bool,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Merge two YAML files and print or write the result
    Merge {
        /// The file whose keys come first
        #[structopt(short, long, parse(from_os_str))]
        base: PathBuf,

        /// The file whose values win on conflicting keys
        #[structopt(short = "o", long, parse(from_os_str))]
        overlay: PathBuf,

        /// Write the merged document here instead of stdout
        #[structopt(long, parse(from_os_str))]
        output: Option<PathBuf>,

        /// Rewrite the base file with the merged document. A missing or
        /// empty base file takes the overlay content as-is
        #[structopt(long, conflicts_with = "output")]
        in_place: bool,
    },

    /// Merge a YAML overlay into every YAML file under a directory
    Patch {
        /// Directory tree to patch
        #[structopt(short, long, parse(from_os_str))]
        target: PathBuf,

        /// Overlay file merged into each YAML file
        #[structopt(short = "o", long, parse(from_os_str))]
        overlay: PathBuf,
    },

    /// Copy a template tree into a target tree, merging YAML files that
    /// already exist at the destination
    Sync {
        /// Template source directory
        #[structopt(short, long, parse(from_os_str))]
        source: PathBuf,

        /// Destination directory
        #[structopt(short, long, parse(from_os_str))]
        target: PathBuf,
    },

    /// Generate a random password for new SQL users
    GenPass {
        /// Password length
        #[structopt(short, long, default_value = "16")]
        length: u8,
    },

    /// Perform Google Cloud Platform operations
    Gcp(GcpCommand),
}

#[derive(Debug, StructOpt)]
pub enum GcpCommand {
    /// Manage Cloud SQL instances, users and databases
    Cloudsql(CloudsqlCommand),

    /// Manage IAM resources (service accounts, roles)
    Iam(IamCommand),

    /// Manage firewall rules
    Firewall(FirewallCommand),

    /// Manage GKE cluster access
    Gke(GkeCommand),
}

impl GcpCommand {
    /// Dry-run commands print the external command instead of executing it,
    /// so pre-flight checks are skipped too.
    pub fn dryrun(&self) -> bool {
        match self {
            GcpCommand::Cloudsql(CloudsqlCommand::CreateUser { dryrun, .. })
            | GcpCommand::Cloudsql(CloudsqlCommand::CreateDatabase { dryrun, .. })
            | GcpCommand::Iam(IamCommand::CreateSa { dryrun, .. })
            | GcpCommand::Iam(IamCommand::GrantRole { dryrun, .. })
            | GcpCommand::Gke(GkeCommand::Connect { dryrun, .. }) => *dryrun,
            _ => false,
        }
    }

    /// External binaries this command needs on PATH.
    pub fn required_tools(&self) -> Vec<&'static str> {
        match self {
            GcpCommand::Cloudsql(CloudsqlCommand::ExportPermissions { .. }) => {
                vec!["gcloud", "psql"]
            }
            GcpCommand::Gke(_) => vec!["gcloud", "kubectl"],
            _ => vec!["gcloud"],
        }
    }
}

#[derive(Debug, StructOpt)]
pub enum CloudsqlCommand {
    /// Create a new user in a Cloud SQL instance
    CreateUser {
        /// Cloud SQL instance ID (e.g. nonprod-psql)
        #[structopt(short, long)]
        instance: String,

        /// Username for the new SQL user (e.g. app-name)
        #[structopt(short, long)]
        username: String,

        /// Password for the new SQL user
        #[structopt(short, long)]
        password: String,

        /// Host from which the user can connect (e.g. '%', 'localhost', '1.2.3.4')
        #[structopt(short = "s", long, default_value = "%")]
        source_host: String,

        /// Print the gcloud command without executing it
        #[structopt(long)]
        dryrun: bool,
    },

    /// Create a new database in a Cloud SQL instance
    CreateDatabase {
        /// Cloud SQL instance ID (e.g. nonprod-psql)
        #[structopt(short, long)]
        instance: String,

        /// Name for the new database (e.g. app-name-db)
        #[structopt(short, long)]
        dbname: String,

        /// Character set for the new database
        #[structopt(short, long, default_value = "UTF8")]
        charset: String,

        /// Collation for the new database
        #[structopt(short = "l", long, default_value = "en_US.UTF8")]
        collation: String,

        /// Print the gcloud command without executing it
        #[structopt(long)]
        dryrun: bool,
    },

    /// Export per-table user permissions from a PostgreSQL instance to a report
    ExportPermissions {
        /// Cloud SQL instance ID (e.g. nonprod-psql)
        #[structopt(short, long)]
        instance: String,

        /// Address (IP or DNS) of the PostgreSQL instance
        #[structopt(short, long)]
        address: String,

        /// Port of the PostgreSQL instance
        #[structopt(short = "t", long, default_value = "5432")]
        port: String,

        /// Role used to read the information schema
        #[structopt(short, long)]
        username: String,

        /// Password for the connection role
        #[structopt(short, long)]
        password: String,

        /// Custom output directory for the permissions report
        #[structopt(short, long, parse(from_os_str), default_value = ".")]
        output_dir: PathBuf,

        /// Regular expression of database names to skip
        #[structopt(short = "r", long, default_value = "^prisma_migrate")]
        regex_ignore_databases: String,

        /// Force SSL on the PostgreSQL connection
        #[structopt(long)]
        ssl_required: bool,
    },

    /// Export DML audit logs (INSERT, UPDATE, DELETE) from a Cloud SQL instance
    ExportAuditLogs {
        /// Cloud SQL instance ID (e.g. nonprod-psql)
        #[structopt(short, long)]
        instance: String,

        /// Custom output directory for the audit logs
        #[structopt(short, long, parse(from_os_str), default_value = ".")]
        output_dir: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
pub enum IamCommand {
    /// Create a new service account
    CreateSa {
        /// Unique ID for the new service account (e.g. app-name-gsa)
        #[structopt(short = "s", long)]
        service_account_id: String,

        /// Description for the service account
        #[structopt(short = "d", long, default_value = "")]
        sa_description: String,

        /// Print the gcloud command without executing it
        #[structopt(long)]
        dryrun: bool,
    },

    /// Grant an IAM role to a member on the project
    ///
    /// Member format: user:{email}, serviceAccount:{email}, group:{email} or
    /// domain:{domain}. Role format: roles/{SERVICE}.{ROLE} or
    /// projects/{PROJECT_ID}/roles/{CUSTOM_ROLE_ID} for custom roles.
    GrantRole {
        /// Member to grant the role to (e.g. user:name.surname@company.com)
        #[structopt(short, long)]
        member: String,

        /// IAM role to grant (e.g. roles/storage.admin)
        #[structopt(short, long, default_value = "roles/cloudsql.editor")]
        role: String,

        /// Print the gcloud command without executing it
        #[structopt(long)]
        dryrun: bool,
    },
}

#[derive(Debug, StructOpt)]
pub enum FirewallCommand {
    /// Export GCP firewall rules to a CSV file
    ExportRules {
        /// Custom output directory for the CSV file
        #[structopt(short, long, parse(from_os_str), default_value = ".")]
        output_dir: PathBuf,

        /// Output type for the rules file (only csv is supported)
        #[structopt(short = "t", long, default_value = "csv")]
        output_type: String,
    },
}

#[derive(Debug, StructOpt)]
pub enum GkeCommand {
    /// Configure kubectl to talk to a GKE cluster
    Connect {
        /// Cluster name
        #[structopt(short, long)]
        cluster: String,

        /// Region or zone of the cluster (e.g. us-central1 or us-central1-a)
        #[structopt(short, long)]
        location: String,

        /// Print the gcloud command without executing it
        #[structopt(long)]
        dryrun: bool,
    },
}

// Parse the command line arguments
pub fn parse() -> Cli {
    Cli::from_args()
}
