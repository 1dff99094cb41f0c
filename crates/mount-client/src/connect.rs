use std::io::{ErrorKind, Read, Write};
use std::process::Command;

use anyhow::Context;
use tracing::info;

use sharedfolders_core::config::{ClientConfig, ServerConfig};
use sharedfolders_core::wire::{decode_field, encode_folder_line, ACK, MAX_FOLDER_REQUEST};
use sharedfolders_core::{Fingerprint, FolderPath, QrexecContext};

use crate::error::MountError;
use crate::transport::Transport;

/// `ConnectToFolder+<fingerprint>` in the qube that exports the folder.
///
/// The requester's word is never taken for anything: the fingerprint and
/// folder it sends are checked with dom0 before a single byte of the folder
/// is served.
pub struct ConnectToFolder<'a, T: Transport> {
    transport: &'a T,
    client: &'a ClientConfig,
    server: &'a ServerConfig,
}

impl<'a, T: Transport> ConnectToFolder<'a, T> {
    pub fn new(transport: &'a T, client: &'a ClientConfig, server: &'a ServerConfig) -> Self {
        Self {
            transport,
            client,
            server,
        }
    }

    /// Runs the handshake and acknowledges on `output`. The caller then
    /// replaces itself with [`ConnectToFolder::server_command`] so the file
    /// server inherits the connection.
    pub fn serve(
        &self,
        context: &QrexecContext,
        mut input: impl Read,
        mut output: impl Write,
    ) -> Result<FolderPath, MountError> {
        let argument = context.service_argument.as_deref().ok_or_else(|| {
            MountError::InvalidRequest("this RPC call requires an argument".to_string())
        })?;
        let fingerprint = argument
            .parse::<Fingerprint>()
            .map_err(|e| MountError::InvalidRequest(e.to_string()))?;
        let line = read_line(&mut input, MAX_FOLDER_REQUEST).context("read folder request")?;
        let requested = decode_field(&line)
            .and_then(FolderPath::new)
            .map_err(|e| MountError::InvalidRequest(e.to_string()))?;

        let service = format!("{}+{}", self.client.query_service, fingerprint);
        info!(%fingerprint, %requested, "asking dom0 to confirm mount request");
        let reply = self
            .transport
            .call("dom0", &service, &encode_folder_line(requested.as_str()))?;
        if !reply.success() {
            info!(%requested, status = ?reply.status, "dom0 refused mount request");
            return Err(MountError::Refused);
        }
        let confirmed = String::from_utf8_lossy(&reply.stdout);
        let folder = confirmed
            .strip_suffix('\n')
            .and_then(|folder| FolderPath::new(folder).ok())
            .filter(|folder| *folder == requested)
            .ok_or_else(|| MountError::ProtocolViolation {
                peer: "dom0".to_string(),
                reply: confirmed.to_string(),
            })?;

        if !folder.as_path().is_dir() {
            return Err(MountError::MissingDirectory(folder.to_string()));
        }
        output
            .write_all(ACK)
            .and_then(|()| output.flush())
            .context("acknowledge mount request")?;
        info!(%folder, "serving folder");
        Ok(folder)
    }

    /// The file server for `folder`, talking 9P over this process's stdin
    /// and stdout.
    pub fn server_command(&self, folder: &FolderPath) -> Command {
        let mut command = Command::new(&self.server.command);
        command.arg("0").arg("1").arg(folder.as_str());
        command
    }
}

/// Reads a single line without reading past it; whatever follows belongs to
/// the file server.
fn read_line(input: &mut impl Read, limit: usize) -> std::io::Result<Vec<u8>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    while line.len() < limit {
        match input.read(&mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => line.push(byte[0]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(line)
}
