//! dom0 side of the shared folders handshake.
//!
//! Two qrexec services live here. `AuthorizeFolderAccess` is called by the
//! qube that wants to mount a folder and answers with a fingerprint;
//! `QueryFolderForAuthorization` is called by the qube exporting the folder
//! to check that fingerprint before it starts serving.

mod authorize;
mod consent;
mod error;
mod query;
mod request;

pub use authorize::AuthorizeFolderAccess;
pub use consent::{ConsentPrompt, ExternalPrompt, FixedConsent};
pub use error::ServiceError;
pub use query::QueryFolderForAuthorization;
pub use request::read_bounded;
