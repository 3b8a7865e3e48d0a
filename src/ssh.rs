// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use crate::error::{Error, Result};
use async_trait::async_trait;
use log::debug;
#[cfg(test)]
use mockall::automock;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Output of one remote command. Both streams are captured and trimmed; the
/// caller decides what a non-empty stderr means.
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Provides an interface for the authenticated channel to one node.
///
/// This trait exists for unit testing: it enables testing the restart state
/// machine without actually calling the ssh process.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SshClientInterface: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn run_command(&self, command: &str) -> Result<CommandOutput>;
    async fn disconnect(&self) -> Result<()>;
}

/// SSH channel to a single node, driven through the OpenSSH client binary.
///
/// `connect` establishes a multiplexed master connection (ControlMaster) so
/// that subsequent commands reuse one authenticated session and `disconnect`
/// is a real teardown. Authentication uses only the configured private key:
/// no agent, no keys from the user's `.ssh` directory, no host key prompt.
pub struct SshClient {
    host: String,
    user: String,
    private_key_path: PathBuf,
    command_timeout: Duration,
    control_path: PathBuf,
}

impl SshClient {
    pub fn new(
        host: &str,
        user: &str,
        private_key_path: PathBuf,
        command_timeout: Duration,
    ) -> SshClient {
        SshClient {
            host: host.to_string(),
            user: user.to_string(),
            private_key_path,
            command_timeout,
            control_path: std::env::temp_dir().join(format!("xrootdrestart-{host}.ctl")),
        }
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.private_key_path.to_string_lossy().to_string(),
            "-q".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "IdentitiesOnly=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
        ]
    }

    async fn run_ssh(&self, args: Vec<String>) -> Result<std::process::Output> {
        debug!("Running ssh with args {args:?}");
        let child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let output = timeout(self.command_timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::CommandTimeout {
                command: args.join(" "),
                timeout_secs: self.command_timeout.as_secs(),
            })??;
        Ok(output)
    }
}

#[async_trait]
impl SshClientInterface for SshClient {
    async fn connect(&self) -> Result<()> {
        debug!("Connecting to {}", self.host);
        let mut args = self.base_args();
        args.extend([
            "-o".to_string(),
            "ControlMaster=yes".to_string(),
            "-o".to_string(),
            "ControlPersist=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.command_timeout.as_secs()),
            "-N".to_string(),
            "-f".to_string(),
            self.destination(),
        ]);
        let output = self.run_ssh(args).await.map_err(|e| match e {
            Error::CommandTimeout { timeout_secs, .. } => Error::SshConnectionFailed {
                host: self.host.clone(),
                reason: format!("connection attempt timed out after {timeout_secs}s"),
            },
            other => other,
        })?;
        if !output.status.success() {
            return Err(Error::SshConnectionFailed {
                host: self.host.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!("Connected to {}", self.host);
        Ok(())
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput> {
        // The exit status is deliberately ignored: `systemctl is-active`
        // answers through stdout and exits non-zero for inactive units.
        let mut args = self.base_args();
        args.push(self.destination());
        args.push(command.to_string());
        let output = self.run_ssh(args).await.map_err(|e| match e {
            Error::CommandTimeout { timeout_secs, .. } => Error::CommandTimeout {
                command: command.to_string(),
                timeout_secs,
            },
            other => other,
        })?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        debug!("Closing the master connection to {}", self.host);
        let mut args = self.base_args();
        args.extend(["-O".to_string(), "exit".to_string(), self.destination()]);
        let output = self.run_ssh(args).await?;
        if !output.status.success() {
            return Err(Error::SshCommandFailed(format!(
                "could not close the connection to {}: {}",
                self.host,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}
