//! The requesting side of a folder mount.
//!
//! ```text
//! Idle --authorize--> Authorized --connect--> Connecting --confirm--> Confirmed --attach--> Streaming
//! ```
//!
//! Each transition consumes the state it starts from, so a fingerprint is
//! used for one connection and a confirmed stream is attached once.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use sharedfolders_core::config::ClientConfig;
use sharedfolders_core::wire::{encode_folder_line, AuthorizationRequest, ACK};
use sharedfolders_core::{Fingerprint, FolderPath, QubeName};

use crate::command::{MountCommand, MountIdentity};
use crate::error::{MountError, POLICY_DENIED_EXIT};
use crate::transport::{ServiceStream, Transport};

/// What to mount and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub vm: QubeName,
    pub folder: FolderPath,
    pub mountpoint: PathBuf,
}

impl MountRequest {
    pub fn new(vm: &str, folder: &str, mountpoint: &Path) -> Result<Self, MountError> {
        let vm = QubeName::new(vm).map_err(|e| MountError::InvalidRequest(e.to_string()))?;
        let folder = FolderPath::new(folder).map_err(|e| MountError::InvalidRequest(e.to_string()))?;
        // the folder ends up inside a comma separated option list
        if folder.as_str().contains(',') {
            return Err(MountError::InvalidRequest(format!(
                "the folder {folder} cannot contain commas"
            )));
        }
        if !mountpoint.is_dir() {
            return Err(MountError::MissingDirectory(mountpoint.display().to_string()));
        }
        Ok(Self {
            vm,
            folder,
            mountpoint: mountpoint.to_path_buf(),
        })
    }
}

pub enum MountState<S> {
    Idle,
    Authorized { fingerprint: Fingerprint },
    Connecting { fingerprint: Fingerprint, stream: S },
    Confirmed { stream: S },
    Streaming { status: Option<i32> },
}

impl<S> MountState<S> {
    pub fn name(&self) -> &'static str {
        match self {
            MountState::Idle => "idle",
            MountState::Authorized { .. } => "authorized",
            MountState::Connecting { .. } => "connecting",
            MountState::Confirmed { .. } => "confirmed",
            MountState::Streaming { .. } => "streaming",
        }
    }
}

pub struct MountFlow<'a, T: Transport> {
    transport: &'a T,
    config: &'a ClientConfig,
    identity: MountIdentity,
    request: MountRequest,
}

impl<'a, T: Transport> MountFlow<'a, T> {
    pub fn new(
        transport: &'a T,
        config: &'a ClientConfig,
        identity: MountIdentity,
        request: MountRequest,
    ) -> Self {
        Self {
            transport,
            config,
            identity,
            request,
        }
    }

    /// Drives the flow from `Idle` to `Streaming` and returns the exit
    /// status of the mount command.
    pub fn run(&self) -> Result<Option<i32>, MountError> {
        let mut state = MountState::Idle;
        loop {
            state = self.step(state)?;
            if let MountState::Streaming { status } = state {
                return Ok(status);
            }
        }
    }

    /// Performs the single transition out of `state`. `Streaming` is final
    /// and is returned unchanged.
    pub fn step(&self, state: MountState<T::Stream>) -> Result<MountState<T::Stream>, MountError> {
        let next = match state {
            MountState::Idle => MountState::Authorized {
                fingerprint: self.authorize()?,
            },
            MountState::Authorized { fingerprint } => MountState::Connecting {
                stream: self.connect(&fingerprint)?,
                fingerprint,
            },
            MountState::Connecting { fingerprint, stream } => MountState::Confirmed {
                stream: self.confirm(&fingerprint, stream)?,
            },
            MountState::Confirmed { stream } => MountState::Streaming {
                status: self.attach(stream)?,
            },
            done @ MountState::Streaming { .. } => done,
        };
        Ok(next)
    }

    fn authorize(&self) -> Result<Fingerprint, MountError> {
        let MountRequest { vm, folder, .. } = &self.request;
        info!(%vm, %folder, "requesting authorization for qvm://{vm}{folder}");
        let body = AuthorizationRequest::encode(vm.as_str(), folder.as_str());
        let output = self
            .transport
            .call("dom0", &self.config.authorize_service, &body)?;
        if !output.success() {
            return Err(match output.status {
                Some(code) if code == libc::EACCES => MountError::Denied,
                Some(code) if code == libc::EINVAL => MountError::InvalidParameters,
                status => MountError::Unknown(status),
            });
        }
        let reply = String::from_utf8_lossy(&output.stdout);
        reply.trim().parse().map_err(|_| MountError::ProtocolViolation {
            peer: "dom0".to_string(),
            reply: reply.into_owned(),
        })
    }

    fn connect(&self, fingerprint: &Fingerprint) -> Result<T::Stream, MountError> {
        let MountRequest { vm, folder, .. } = &self.request;
        info!(%vm, %folder, %fingerprint, "connecting to qvm://{vm}{folder}");
        let service = format!("{}+{}", self.config.connect_service, fingerprint);
        let mut stream = self.transport.open(vm.as_str(), &service)?;
        // may be a subfolder of what was authorized; the exporting qube
        // checks that with dom0
        stream
            .write_all(&encode_folder_line(folder.as_str()))
            .and_then(|()| stream.flush())
            .context("send folder to exporting qube")?;
        Ok(stream)
    }

    fn confirm(&self, fingerprint: &Fingerprint, mut stream: T::Stream) -> Result<T::Stream, MountError> {
        let reply = read_ack(&mut stream).context("read acknowledgment")?;
        if reply == ACK {
            info!(%fingerprint, "exporting qube accepted the connection");
            return Ok(stream);
        }
        let MountRequest { vm, folder, .. } = &self.request;
        if reply.is_empty() {
            let (vm, folder) = (vm.clone(), folder.clone());
            return Err(match stream.wait()? {
                Some(code) if code == libc::ENOENT => MountError::NotFound { vm, folder },
                Some(code) if code == libc::EACCES => MountError::RemoteDenied { vm, folder },
                Some(POLICY_DENIED_EXIT) => MountError::PolicyDenied { vm, folder },
                status => MountError::UnknownExit(status),
            });
        }
        stream.kill()?;
        Err(MountError::ProtocolViolation {
            peer: vm.to_string(),
            reply: String::from_utf8_lossy(&reply).into_owned(),
        })
    }

    fn attach(&self, stream: T::Stream) -> Result<Option<i32>, MountError> {
        let MountRequest {
            vm,
            folder,
            mountpoint,
        } = &self.request;
        info!(%vm, %folder, mountpoint = %mountpoint.display(), "mounting qvm://{vm}{folder}");
        let command = MountCommand::for_share(self.config, &self.identity, vm, folder, mountpoint);
        Ok(stream.attach(&command)?)
    }
}

/// Reads up to the length of the acknowledgment, stopping early at EOF.
fn read_ack(stream: &mut impl Read) -> std::io::Result<Vec<u8>> {
    let mut reply = vec![0u8; ACK.len()];
    let mut filled = 0;
    while filled < reply.len() {
        match stream.read(&mut reply[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    reply.truncate(filled);
    Ok(reply)
}
