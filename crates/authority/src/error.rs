use thiserror::Error;

use policy_engine::PolicyError;
use sharedfolders_core::error::FAILURE_EXIT;
use sharedfolders_core::SharedFoldersError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Malformed(String),
    #[error("Request refused")]
    Refused,
    #[error(transparent)]
    Failure(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ServiceError::Malformed(_) => libc::EINVAL,
            ServiceError::Refused => libc::EACCES,
            ServiceError::Failure(_) => FAILURE_EXIT,
        }
    }
}

impl From<SharedFoldersError> for ServiceError {
    fn from(err: SharedFoldersError) -> Self {
        match err {
            SharedFoldersError::UnknownQube(_) => ServiceError::Refused,
            other => ServiceError::Malformed(other.to_string()),
        }
    }
}

impl From<PolicyError> for ServiceError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Invalid(err) => err.into(),
            PolicyError::Persistence(err) => ServiceError::Failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ServiceError::Malformed("x".to_string()).exit_code(), 22);
        assert_eq!(ServiceError::Refused.exit_code(), 13);
        assert_eq!(ServiceError::Failure(anyhow::anyhow!("disk full")).exit_code(), 4);
    }

    #[test]
    fn test_unknown_qube_is_a_refusal() {
        let err: ServiceError = SharedFoldersError::UnknownQube("vault".to_string()).into();
        assert!(matches!(err, ServiceError::Refused));
        assert_eq!(err.to_string(), "Request refused");

        let err: ServiceError = SharedFoldersError::DisposableGrant.into();
        assert!(matches!(err, ServiceError::Malformed(_)));
    }

    #[test]
    fn test_persistence_is_a_failure() {
        let err: ServiceError = PolicyError::Persistence(anyhow::anyhow!("read-only fs")).into();
        assert_eq!(err.exit_code(), FAILURE_EXIT);
    }
}
