use thiserror::Error;

use sharedfolders_core::error::FAILURE_EXIT;
use sharedfolders_core::{FolderPath, QubeName};

/// Exit status qrexec reports when its own policy refused the call.
pub const POLICY_DENIED_EXIT: i32 = 126;

#[derive(Debug, Error)]
pub enum MountError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0} does not exist or is not a directory")]
    MissingDirectory(String),
    #[error("Request denied")]
    Denied,
    #[error("Invalid parameters")]
    InvalidParameters,
    #[error("Unknown error")]
    Unknown(Option<i32>),
    #[error("directory {folder} does not exist in qube {vm}")]
    NotFound { vm: QubeName, folder: FolderPath },
    #[error("qube {vm} has denied the mount request for directory {folder}")]
    RemoteDenied { vm: QubeName, folder: FolderPath },
    #[error("qrexec policy has denied the mount request to {vm} for directory {folder}")]
    PolicyDenied { vm: QubeName, folder: FolderPath },
    #[error("unknown exit status {}", describe_status(.0))]
    UnknownExit(Option<i32>),
    #[error("unexpected reply from {peer}: {reply:?}")]
    ProtocolViolation { peer: String, reply: String },
    #[error("Request refused")]
    Refused,
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl MountError {
    pub fn exit_code(&self) -> i32 {
        match self {
            MountError::InvalidRequest(_) | MountError::InvalidParameters => libc::EINVAL,
            MountError::MissingDirectory(_) | MountError::NotFound { .. } => libc::ENOENT,
            MountError::Denied | MountError::RemoteDenied { .. } | MountError::Refused => {
                libc::EACCES
            }
            MountError::PolicyDenied { .. } => POLICY_DENIED_EXIT,
            MountError::Unknown(status) | MountError::UnknownExit(status) => {
                status.unwrap_or(FAILURE_EXIT)
            }
            MountError::ProtocolViolation { .. } | MountError::Transport(_) => FAILURE_EXIT,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "(killed by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_remote_status() {
        let vm = QubeName::new("vault").unwrap();
        let folder = FolderPath::new("/home/user").unwrap();
        assert_eq!(MountError::Denied.exit_code(), 13);
        assert_eq!(MountError::InvalidParameters.exit_code(), 22);
        assert_eq!(MountError::Unknown(Some(5)).exit_code(), 5);
        assert_eq!(
            MountError::NotFound { vm: vm.clone(), folder: folder.clone() }.exit_code(),
            libc::ENOENT
        );
        assert_eq!(
            MountError::PolicyDenied { vm, folder }.exit_code(),
            POLICY_DENIED_EXIT
        );
        assert_eq!(MountError::UnknownExit(None).exit_code(), FAILURE_EXIT);
    }

    #[test]
    fn test_messages() {
        let vm = QubeName::new("vault").unwrap();
        let folder = FolderPath::new("/srv").unwrap();
        assert_eq!(
            MountError::RemoteDenied { vm, folder }.to_string(),
            "qube vault has denied the mount request for directory /srv"
        );
        assert_eq!(MountError::UnknownExit(Some(9)).to_string(), "unknown exit status 9");
    }
}
