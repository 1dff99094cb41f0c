pub mod config;
pub mod error;
pub mod fingerprint;
pub mod folder;
pub mod qrexec;
pub mod qube;
pub mod registry;
pub mod response;
pub mod wire;

pub use config::{Config, ConfigPaths};
pub use error::SharedFoldersError;
pub use fingerprint::{fingerprint, Fingerprint};
pub use folder::{FolderPath, PATH_MAX};
pub use qrexec::QrexecContext;
pub use qube::{QubeName, VM_NAME_MAX};
pub use registry::{QubeRegistry, QvmLsRegistry, StaticRegistry};
pub use response::Response;
