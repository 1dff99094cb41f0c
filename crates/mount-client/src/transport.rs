//! qrexec calls made from inside a qube.

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use anyhow::{Context, Result};
use nix::fcntl::OFlag;
use nix::unistd::pipe2;
use tracing::debug;

use crate::command::MountCommand;

/// Result of a service call that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutput {
    /// `None` when the client was killed by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
}

impl CallOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait Transport {
    type Stream: ServiceStream;

    /// Calls `service` on `target`, sends `input` and collects the reply.
    fn call(&self, target: &str, service: &str, input: &[u8]) -> Result<CallOutput>;

    /// Starts a call whose stdin and stdout stay open to the caller.
    fn open(&self, target: &str, service: &str) -> Result<Self::Stream>;
}

/// A running service call.
pub trait ServiceStream: Read + Write {
    /// Waits for the call to end and returns its exit status.
    fn wait(&mut self) -> Result<Option<i32>>;

    fn kill(&mut self) -> Result<()>;

    /// Hands both ends of the stream to `command` and returns its exit
    /// status once it finishes.
    fn attach(self, command: &MountCommand) -> Result<Option<i32>>;
}

/// Transport backed by `qrexec-client-vm`.
#[derive(Debug, Clone)]
pub struct QrexecClient {
    client: PathBuf,
}

impl QrexecClient {
    pub fn new(client: PathBuf) -> Self {
        Self { client }
    }
}

impl Transport for QrexecClient {
    type Stream = QrexecStream;

    fn call(&self, target: &str, service: &str, input: &[u8]) -> Result<CallOutput> {
        debug!(%target, %service, "calling service");
        let mut child = Command::new(&self.client)
            .arg(target)
            .arg(service)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("start {}", self.client.display()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .with_context(|| format!("send request to {service}"))?;
        }
        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for {service}"))?;
        Ok(CallOutput {
            status: output.status.code(),
            stdout: output.stdout,
        })
    }

    fn open(&self, target: &str, service: &str) -> Result<QrexecStream> {
        debug!(%target, %service, "opening service stream");
        let (remote_stdin, to_remote) = pipe2(OFlag::O_CLOEXEC).context("create pipe")?;
        let (from_remote, remote_stdout) = pipe2(OFlag::O_CLOEXEC).context("create pipe")?;
        // The command keeps the child's ends open until it is dropped.
        let child = {
            let mut command = Command::new(&self.client);
            command
                .arg(target)
                .arg(service)
                .stdin(Stdio::from(remote_stdin))
                .stdout(Stdio::from(remote_stdout));
            command
                .spawn()
                .with_context(|| format!("start {}", self.client.display()))?
        };
        Ok(QrexecStream {
            child,
            to_remote: File::from(to_remote),
            from_remote: File::from(from_remote),
        })
    }
}

pub struct QrexecStream {
    child: Child,
    to_remote: File,
    from_remote: File,
}

impl Read for QrexecStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.from_remote.read(buf)
    }
}

impl Write for QrexecStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.to_remote.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.to_remote.flush()
    }
}

impl ServiceStream for QrexecStream {
    fn wait(&mut self) -> Result<Option<i32>> {
        let status = self.child.wait().context("wait for service call")?;
        Ok(status.code())
    }

    fn kill(&mut self) -> Result<()> {
        self.child.kill().context("kill service call")?;
        let _ = self.child.wait();
        Ok(())
    }

    fn attach(self, command: &MountCommand) -> Result<Option<i32>> {
        let QrexecStream {
            child: _child,
            to_remote,
            from_remote,
        } = self;
        let status = command
            .to_command()
            .stdin(Stdio::from(from_remote))
            .stdout(Stdio::from(to_remote))
            .status()
            .with_context(|| format!("run {}", command.executable.display()))?;
        Ok(status.code())
    }
}
