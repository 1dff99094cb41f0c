use std::path::PathBuf;

use mount_client::{MountError, MountFlow, MountIdentity, MountRequest, QrexecClient};
use sharedfolders_core::config::Config;
use sharedfolders_core::error::FAILURE_EXIT;

#[derive(Debug)]
pub struct MountInputs {
    pub vm: String,
    pub folder: String,
    pub mountpoint: PathBuf,
}

/// Mounts the folder and returns the exit status for the process.
pub fn execute(config: &Config, inputs: MountInputs) -> i32 {
    match mount(config, inputs) {
        Ok(status) => status.unwrap_or(FAILURE_EXIT),
        Err(err) => {
            match err {
                MountError::Denied | MountError::InvalidParameters | MountError::Unknown(_) => {
                    eprintln!("{err}")
                }
                _ => eprintln!("error: {err:#}"),
            }
            err.exit_code()
        }
    }
}

fn mount(config: &Config, inputs: MountInputs) -> Result<Option<i32>, MountError> {
    let request = MountRequest::new(&inputs.vm, &inputs.folder, &inputs.mountpoint)?;
    let identity = MountIdentity::current()?;
    let transport = QrexecClient::new(config.client.qrexec_client.clone());
    MountFlow::new(&transport, &config.client, identity, request).run()
}
