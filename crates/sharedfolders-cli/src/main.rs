use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use sharedfolders_cli::commands;
use sharedfolders_cli::commands::policy::PolicyAction;
use sharedfolders_cli::logging;
use sharedfolders_core::error::FAILURE_EXIT;
use sharedfolders_core::Fingerprint;

#[derive(Parser, Debug)]
#[command(
    name = "qvm-shared-folders",
    version,
    about = "Authorize and serve folders shared between qubes"
)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// dom0 service: a qube asks to mount a folder of another qube
    AuthorizeFolderAccess,
    /// dom0 service: an exporting qube checks a fingerprint
    QueryFolderForAuthorization,
    /// Qube service: serve a folder after dom0 confirms the request
    ConnectToFolder,
    /// Inspect and edit recorded decisions
    Policy {
        #[command(subcommand)]
        action: PolicyCommand,
    },
    Init {
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    Config {
        #[arg(long)]
        print: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PolicyCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Show {
        fingerprint: Fingerprint,
    },
    Revoke {
        fingerprint: Fingerprint,
    },
    /// Rewrite qrexec grants from the policy file
    Sync,
}

fn main() {
    let cli = Cli::parse();
    logging::init();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            FAILURE_EXIT
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::AuthorizeFolderAccess => {
            let config = commands::load_config(cli.config)?;
            Ok(commands::service::authorize_folder_access(&config))
        }
        Commands::QueryFolderForAuthorization => {
            let config = commands::load_config(cli.config)?;
            Ok(commands::service::query_folder_for_authorization(&config))
        }
        Commands::ConnectToFolder => {
            let config = commands::load_config(cli.config)?;
            Ok(commands::service::connect_to_folder(&config))
        }
        Commands::Policy { action } => {
            let config = commands::load_config(cli.config)?;
            let action = match action {
                PolicyCommand::List { json } => PolicyAction::List { json },
                PolicyCommand::Show { fingerprint } => PolicyAction::Show { fingerprint },
                PolicyCommand::Revoke { fingerprint } => PolicyAction::Revoke { fingerprint },
                PolicyCommand::Sync => PolicyAction::Sync,
            };
            commands::policy::execute(&config, action)?;
            Ok(0)
        }
        Commands::Init { path, force } => {
            commands::config::init(path.or(cli.config), force)?;
            Ok(0)
        }
        Commands::Config { print } => {
            if print {
                commands::config::print_effective(cli.config)?;
            }
            Ok(0)
        }
    }
}
