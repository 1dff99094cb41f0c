use std::io::{Read, Write};

use anyhow::Context;
use tracing::info;

use policy_engine::PolicyStore;
use sharedfolders_core::wire::{decode_field, MAX_FOLDER_REQUEST};
use sharedfolders_core::{Fingerprint, FolderPath, QrexecContext};

use crate::error::ServiceError;
use crate::request::read_bounded;

/// `QueryFolderForAuthorization+<fingerprint>`: the exporting qube checks
/// that a mount request it received is covered by a decision in dom0.
///
/// The caller here is the qube that owns the folder, not the one that wants
/// to mount it. The fingerprint is the requester's bearer token and is only
/// ever used as an opaque lookup key.
pub struct QueryFolderForAuthorization<'a> {
    store: &'a PolicyStore,
}

impl<'a> QueryFolderForAuthorization<'a> {
    pub fn new(store: &'a PolicyStore) -> Self {
        Self { store }
    }

    /// On success echoes the requested folder, newline terminated.
    pub fn serve(
        &self,
        context: &QrexecContext,
        input: impl Read,
        mut output: impl Write,
    ) -> Result<FolderPath, ServiceError> {
        let body = read_bounded(input, MAX_FOLDER_REQUEST)?;
        let requested = self.handle(context, &body)?;
        writeln!(output, "{requested}")
            .and_then(|()| output.flush())
            .context("write requested folder")?;
        Ok(requested)
    }

    /// Returns the requested folder once it is known to lie inside an
    /// authorized one.
    pub fn handle(&self, context: &QrexecContext, body: &[u8]) -> Result<FolderPath, ServiceError> {
        if !context.targets_admin_vm() {
            return Err(ServiceError::Malformed(format!(
                "unexpected target for this RPC ({})",
                context.requested_target()
            )));
        }
        let argument = context.service_argument.as_deref().ok_or_else(|| {
            ServiceError::Malformed("this RPC call requires an argument".to_string())
        })?;
        let requested = decode_field(body)
            .and_then(FolderPath::new)
            .map_err(|_| {
                ServiceError::Malformed(
                    "the requested folder is malformed, is not a proper absolute path, or has invalid characters"
                        .to_string(),
                )
            })?;
        let fingerprint: Fingerprint = argument.parse()?;

        info!(%fingerprint, %requested, "looking up fingerprint for requested folder");
        match self.store.lookup_decision_folder(&fingerprint, &requested)? {
            Some(authorized) => {
                info!(%requested, %authorized, "folder access confirmed");
                Ok(requested)
            }
            None => Err(ServiceError::Refused),
        }
    }
}
