//! qrexec service entry points. Each reads its request from stdin, answers
//! on stdout and reports the outcome through the exit status.

use std::fs::File;
use std::io;
use std::os::fd::AsFd;
use std::os::unix::process::CommandExt;

use tracing::error;

use authority::{AuthorizeFolderAccess, ExternalPrompt, QueryFolderForAuthorization, ServiceError};
use mount_client::{ConnectToFolder, QrexecClient};
use policy_engine::PolicyStore;
use sharedfolders_core::config::Config;
use sharedfolders_core::error::FAILURE_EXIT;
use sharedfolders_core::{QrexecContext, QvmLsRegistry};

pub fn authorize_folder_access(config: &Config) -> i32 {
    let store = PolicyStore::new(&config.policy);
    let registry = QvmLsRegistry::new(&config.registry);
    let consent = ExternalPrompt::new(&config.consent);
    let service = AuthorizeFolderAccess::new(&store, &registry, &consent);
    let outcome = service.serve(&QrexecContext::from_env(), io::stdin().lock(), io::stdout().lock());
    exit_code(outcome.map(|_| ()))
}

pub fn query_folder_for_authorization(config: &Config) -> i32 {
    let store = PolicyStore::new(&config.policy);
    let service = QueryFolderForAuthorization::new(&store);
    let outcome = service.serve(&QrexecContext::from_env(), io::stdin().lock(), io::stdout().lock());
    exit_code(outcome.map(|_| ()))
}

/// Runs the handshake, then becomes the file server. Only returns on
/// failure.
pub fn connect_to_folder(config: &Config) -> i32 {
    let transport = QrexecClient::new(config.client.qrexec_client.clone());
    let service = ConnectToFolder::new(&transport, &config.client, &config.server);
    // unbuffered, so nothing meant for the file server is read here
    let input = match io::stdin().as_fd().try_clone_to_owned() {
        Ok(fd) => File::from(fd),
        Err(err) => {
            eprintln!("error: cannot read stdin: {err}");
            return FAILURE_EXIT;
        }
    };
    let folder = match service.serve(&QrexecContext::from_env(), input, io::stdout().lock()) {
        Ok(folder) => folder,
        Err(err) => {
            eprintln!("error: {err}");
            return err.exit_code();
        }
    };
    let mut command = service.server_command(&folder);
    let err = command.exec();
    error!(server = %config.server.command.display(), error = %err, "cannot start file server");
    eprintln!("error: cannot start {}: {err}", config.server.command.display());
    FAILURE_EXIT
}

fn exit_code(outcome: Result<(), ServiceError>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(err) => {
            match &err {
                ServiceError::Refused => eprintln!("{err}"),
                ServiceError::Malformed(_) => eprintln!("error: {err}"),
                ServiceError::Failure(cause) => eprintln!("error: {cause:#}"),
            }
            err.exit_code()
        }
    }
}
