use std::path::PathBuf;

use clap::Parser;

use sharedfolders_cli::commands;
use sharedfolders_cli::commands::mount::MountInputs;
use sharedfolders_cli::logging;
use sharedfolders_core::error::FAILURE_EXIT;

const EX_USAGE: i32 = 64;

/// Mount a folder exported by another qube.
#[derive(Parser, Debug)]
#[command(name = "qvm-mount-folder", version)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Qube that exports the folder
    vm: String,
    /// Absolute path of the folder inside that qube
    folder: String,
    /// Local directory to mount it on
    mountpoint: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EX_USAGE } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logging::init();
    let code = match commands::load_config(cli.config) {
        Ok(config) => commands::mount::execute(
            &config,
            MountInputs {
                vm: cli.vm,
                folder: cli.folder,
                mountpoint: cli.mountpoint,
            },
        ),
        Err(err) => {
            eprintln!("error: {err:#}");
            FAILURE_EXIT
        }
    };
    std::process::exit(code);
}
