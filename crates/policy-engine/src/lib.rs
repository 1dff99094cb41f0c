//! Decision matrix, persistence and grant propagation for shared folders.
//!
//! [`PolicyStore`] is the entry point for the dom0 services: it loads the
//! matrix fresh for every call, applies one change, saves it atomically and
//! re-derives the qrexec grants.

mod atomic;
mod decision;
mod enforcement;
mod error;
mod lock;
mod matrix;
mod store;

pub use atomic::{write_atomically, SHARED_FILE_MODE};
pub use decision::Decision;
pub use enforcement::GrantPropagator;
pub use error::{PolicyError, Result};
pub use lock::PolicyLock;
pub use matrix::DecisionMatrix;
pub use store::PolicyStore;
