//! Qube side of shared folders: mounting a folder from another qube, and
//! answering such a request for a folder this qube exports.

pub mod command;
pub mod connect;
pub mod error;
pub mod flow;
pub mod transport;

pub use command::{MountCommand, MountIdentity};
pub use connect::ConnectToFolder;
pub use error::MountError;
pub use flow::{MountFlow, MountRequest, MountState};
pub use transport::{CallOutput, QrexecClient, QrexecStream, ServiceStream, Transport};
