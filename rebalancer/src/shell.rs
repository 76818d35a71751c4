//! Remote command execution on bot machines.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::debug;

use crate::config::BotConfig;
use crate::error::{Error, Result};

/// Heredoc delimiter used when a script has to be embedded in another.
pub const HEREDOC_TAG: &str = "FREQKEEPER_EOF";

/// Runs shell scripts on a remote machine.
pub trait RemoteShell {
    /// Run `script` and wait for it. Returns stdout.
    fn exec(&self, script: &str) -> Result<String>;

    /// Start `script` in the background so it outlives the session.
    fn spawn_detached(&self, script: &str) -> Result<()>;
}

/// Wrap `script` so that it runs under `nohup`, detached from the session.
pub fn detached(script: &str) -> String {
    format!("nohup bash -s > freqkeeper-detached.log 2>&1 <<'{HEREDOC_TAG}' &\n{script}\n{HEREDOC_TAG}\n")
}

/// [`RemoteShell`] over the system `ssh` client.
///
/// Scripts are fed to `bash -s` on stdin, so nothing in them needs quoting
/// for the local side.
#[derive(Debug, Clone)]
pub struct OpenSsh {
    host: String,
    user: String,
    private_key: PathBuf,
}

impl OpenSsh {
    pub fn new(host: &str, user: &str, private_key: PathBuf) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            private_key,
        }
    }

    pub fn for_bot(bot: &BotConfig) -> Self {
        Self::new(&bot.host, &bot.user, bot.private_key.clone())
    }

    /// Arguments passed to `ssh`.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.private_key.display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            format!("{}@{}", self.user, self.host),
            "bash".to_string(),
            "-s".to_string(),
        ]
    }
}

impl RemoteShell for OpenSsh {
    fn exec(&self, script: &str) -> Result<String> {
        debug!("ssh {}@{}: {}", self.user, self.host, first_line(script));

        let mut child = Command::new("ssh")
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Shell(format!("failed to launch ssh: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .map_err(|e| Error::Shell(format!("failed to send script to {}: {e}", self.host)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Shell(format!("ssh to {} failed: {e}", self.host)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Shell(format!(
                "{} exited with {}: {}",
                self.host,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn spawn_detached(&self, script: &str) -> Result<()> {
        self.exec(&detached(script)).map(|_| ())
    }
}

fn first_line(script: &str) -> &str {
    script.lines().next().unwrap_or_default()
}
