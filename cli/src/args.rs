//! Command-line arguments for `meraki-migrate`

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use migrator::migration::MigrationRequest;
use migrator::services::gateway::{NetworkRef, OrgRef};

/// Move a network and its devices between dashboard organizations
#[derive(Parser, Debug)]
#[command(name = "meraki-migrate", version)]
#[command(about = "Migrate a dashboard network into another organization", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for snapshot, state and log files (overrides the config file)
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// API key with access to the source organization
    #[arg(long, env = "MERAKI_SOURCE_API_KEY", hide_env_values = true, global = true)]
    pub source_api_key: Option<String>,

    /// API key with access to the target organization (defaults to the source key)
    #[arg(long, env = "MERAKI_TARGET_API_KEY", hide_env_values = true, global = true)]
    pub target_api_key: Option<String>,

    /// Print the final report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose logging, and debug mode for the UI driver
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a full migration
    Run(RunArgs),

    /// Continue an interrupted migration from its state file
    Resume(ResumeArgs),

    /// Check both API keys against the request without changing anything
    Verify(RequestArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    #[arg(long)]
    pub source_org_id: String,

    #[arg(long)]
    pub source_org_name: String,

    #[arg(long)]
    pub source_network_id: String,

    #[arg(long)]
    pub source_network_name: String,

    #[arg(long)]
    pub target_org_id: String,

    #[arg(long)]
    pub target_org_name: String,

    /// Name for the new network (default: source name plus the configured suffix)
    #[arg(long)]
    pub target_network_name: Option<String>,
}

impl RequestArgs {
    pub fn to_request(&self) -> MigrationRequest {
        MigrationRequest {
            source_org: OrgRef {
                id: self.source_org_id.clone(),
                name: self.source_org_name.clone(),
            },
            source_network: NetworkRef {
                id: self.source_network_id.clone(),
                name: self.source_network_name.clone(),
            },
            target_org: OrgRef {
                id: self.target_org_id.clone(),
                name: self.target_org_name.clone(),
            },
            target_network_name: self.target_network_name.clone(),
        }
    }
}

/// UI driver used for remove, unclaim and claim
#[derive(Args, Debug, Clone)]
pub struct DriverArgs {
    /// Browser automation executable
    #[arg(long, env = "MERAKI_UI_DRIVER")]
    pub driver: PathBuf,

    #[arg(long, env = "DASHBOARD_USERNAME")]
    pub username: String,

    #[arg(long, env = "DASHBOARD_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    #[command(flatten)]
    pub driver: DriverArgs,
}

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// State file written by an earlier run
    #[arg(long)]
    pub state: PathBuf,

    #[command(flatten)]
    pub driver: DriverArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: [&str; 12] = [
        "--source-org-id",
        "100",
        "--source-org-name",
        "Source Org",
        "--source-network-id",
        "N_SRC",
        "--source-network-name",
        "Branch",
        "--target-org-id",
        "200",
        "--target-org-name",
        "Target Org",
    ];

    const DRIVER: [&str; 6] = [
        "--driver",
        "/opt/driver",
        "--username",
        "ops@example.com",
        "--password",
        "pw",
    ];

    #[test]
    fn test_run_builds_request() {
        let mut argv = vec!["meraki-migrate", "run"];
        argv.extend(REQUEST);
        argv.extend(DRIVER);
        argv.extend(["--headless", "--target-network-name", "Branch (new)"]);

        let cli = Cli::try_parse_from(argv).unwrap();
        let Command::Run(run) = cli.command else {
            panic!("expected run");
        };
        let request = run.request.to_request();
        assert_eq!(request.source_network.name, "Branch");
        assert_eq!(request.target_org.id, "200");
        assert_eq!(request.target_network_name.as_deref(), Some("Branch (new)"));
        assert!(run.driver.headless);
    }

    #[test]
    fn test_resume_requires_state_file() {
        let mut argv = vec!["meraki-migrate", "resume"];
        argv.extend(DRIVER);
        assert!(Cli::try_parse_from(argv.clone()).is_err());

        argv.extend(["--state", "migration_state_N_SRC.json"]);
        let cli = Cli::try_parse_from(argv).unwrap();
        assert!(matches!(cli.command, Command::Resume(ResumeArgs { ref state, .. })
            if state == &PathBuf::from("migration_state_N_SRC.json")));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let mut argv = vec!["meraki-migrate", "verify"];
        argv.extend(REQUEST);
        argv.extend(["--json", "--work-dir", "/tmp/migration"]);

        let cli = Cli::try_parse_from(argv).unwrap();
        assert!(cli.json);
        assert_eq!(cli.work_dir, Some(PathBuf::from("/tmp/migration")));
    }
}
