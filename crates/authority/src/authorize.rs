use std::io::{Read, Write};

use anyhow::Context;
use tracing::info;

use policy_engine::PolicyStore;
use sharedfolders_core::wire::{decode_field, AuthorizationRequest, MAX_AUTHORIZATION_REQUEST};
use sharedfolders_core::{Fingerprint, FolderPath, QrexecContext, QubeName, QubeRegistry};

use crate::consent::ConsentPrompt;
use crate::error::ServiceError;
use crate::request::read_bounded;

/// `AuthorizeFolderAccess`: a qube asks dom0 for permission to mount a
/// folder of another qube and gets back a fingerprint on success.
pub struct AuthorizeFolderAccess<'a> {
    store: &'a PolicyStore,
    registry: &'a dyn QubeRegistry,
    consent: &'a dyn ConsentPrompt,
}

impl<'a> AuthorizeFolderAccess<'a> {
    pub fn new(
        store: &'a PolicyStore,
        registry: &'a dyn QubeRegistry,
        consent: &'a dyn ConsentPrompt,
    ) -> Self {
        Self {
            store,
            registry,
            consent,
        }
    }

    /// Reads the request from `input` and writes the bare fingerprint to
    /// `output` if access is granted. Nothing is written otherwise.
    pub fn serve(
        &self,
        context: &QrexecContext,
        input: impl Read,
        mut output: impl Write,
    ) -> Result<Fingerprint, ServiceError> {
        let body = read_bounded(input, MAX_AUTHORIZATION_REQUEST)?;
        let fingerprint = self.handle(context, &body)?;
        output
            .write_all(fingerprint.as_str().as_bytes())
            .and_then(|()| output.flush())
            .context("write fingerprint")?;
        Ok(fingerprint)
    }

    pub fn handle(&self, context: &QrexecContext, body: &[u8]) -> Result<Fingerprint, ServiceError> {
        if !context.targets_admin_vm() {
            return Err(ServiceError::Malformed(format!(
                "unexpected target for this RPC ({})",
                context.requested_target()
            )));
        }
        let source = context
            .remote_domain
            .as_deref()
            .ok_or_else(|| ServiceError::Malformed("no source VM".to_string()))?;
        let source = QubeName::new(source)?;

        let request = AuthorizationRequest::split(body)?;
        let target = decode_field(request.target)
            .and_then(QubeName::new)
            .map_err(|_| {
                ServiceError::Malformed(
                    "the target VM is malformed or has invalid characters".to_string(),
                )
            })?;
        if !self.registry.exists(&target)? {
            info!(%source, %target, "request names an unknown target qube");
            return Err(ServiceError::Refused);
        }
        if source == target {
            return Err(ServiceError::Malformed(
                "cannot request file share to and from the same VM".to_string(),
            ));
        }
        let folder = decode_field(request.folder)
            .and_then(FolderPath::new)
            .map_err(|_| {
                ServiceError::Malformed(
                    "the requested folder is malformed, is not a proper absolute path, or has invalid characters"
                        .to_string(),
                )
            })?;

        let (prior, fingerprint) = self
            .store
            .lookup_prior_authorization(&source, &target, &folder)?;
        let (response, fingerprint) = match prior {
            Some(response) => {
                info!(%source, %target, %folder, %response, %fingerprint, "response already registered");
                (response, fingerprint)
            }
            None => {
                info!(%source, %target, %folder, "no durable response yet, asking the user");
                let response = self.consent.ask(&source, &target, &folder)?;
                let fingerprint =
                    self.store
                        .record_decision(self.registry, &source, &target, &folder, response)?;
                info!(%response, %fingerprint, "recorded response");
                (response, fingerprint)
            }
        };

        if !response.is_allow() {
            return Err(ServiceError::Refused);
        }
        Ok(fingerprint)
    }
}
