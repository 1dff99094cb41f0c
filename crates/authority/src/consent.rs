use std::io::{self, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};
use wait_timeout::ChildExt;

use sharedfolders_core::config::ConsentConfig;
use sharedfolders_core::{FolderPath, QubeName, Response};

/// Only the tail of the program's output is kept; the answer is printed last.
const MAX_ANSWER: usize = 4096;

/// Asks the user whether `source` may mount `folder` from `target`.
pub trait ConsentPrompt {
    fn ask(&self, source: &QubeName, target: &QubeName, folder: &FolderPath) -> Result<Response>;
}

/// Runs the graphical consent program and reads back the response name it
/// prints. A prompt left unanswered past the timeout counts as a one-time
/// deny.
#[derive(Debug, Clone)]
pub struct ExternalPrompt {
    program: PathBuf,
    timeout: Duration,
    display: String,
}

impl ExternalPrompt {
    pub fn new(config: &ConsentConfig) -> Self {
        Self {
            program: config.program.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            display: config.display.clone(),
        }
    }
}

impl ConsentPrompt for ExternalPrompt {
    fn ask(&self, source: &QubeName, target: &QubeName, folder: &FolderPath) -> Result<Response> {
        let mut command = Command::new(&self.program);
        command
            .arg(source.as_str())
            .arg(target.as_str())
            .arg(folder.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped());
        if std::env::var_os("DISPLAY").map_or(true, |value| value.is_empty()) {
            command.env("DISPLAY", &self.display);
        }
        let mut child = command
            .spawn()
            .with_context(|| format!("start consent program {}", self.program.display()))?;

        // drained while waiting, so a chatty program never stalls on a full pipe
        let reader = child
            .stdout
            .take()
            .map(|stdout| thread::spawn(move || read_answer(stdout)));

        // a timeout too large to represent means no deadline
        let finished = match Instant::now().checked_add(self.timeout) {
            Some(_) => child
                .wait_timeout(self.timeout)
                .context("wait for consent program")?,
            None => Some(child.wait().context("wait for consent program")?),
        };
        let Some(status) = finished else {
            warn!(%source, %target, %folder, "consent prompt timed out, denying once");
            let _ = child.kill();
            let _ = child.wait();
            // the reader is left to finish on its own; descendants may still hold the pipe
            return Ok(Response::DenyOnce);
        };
        if !status.success() {
            return Err(anyhow!("consent program exited with {status}"));
        }

        let output = match reader {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("consent output reader panicked"))?
                .context("read consent program output")?,
            None => Vec::new(),
        };
        let answer = String::from_utf8_lossy(&output);
        let response: Response = answer.trim().parse()?;
        info!(%source, %target, %folder, %response, "user answered consent prompt");
        Ok(response)
    }
}

/// Test double: a prompt that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedConsent(pub Response);

impl ConsentPrompt for FixedConsent {
    fn ask(&self, _source: &QubeName, _target: &QubeName, _folder: &FolderPath) -> Result<Response> {
        Ok(self.0)
    }
}

/// Reads to end of stream, keeping the last [`MAX_ANSWER`] bytes.
fn read_answer(mut stdout: impl Read) -> io::Result<Vec<u8>> {
    let mut answer = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        answer.extend_from_slice(&chunk[..n]);
        if answer.len() > MAX_ANSWER {
            let excess = answer.len() - MAX_ANSWER;
            answer.drain(..excess);
        }
    }
    Ok(answer)
}
