// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
/// Internal error.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error("Failed to send alert: {status} {body}")]
    AlertPostFailed { status: u16, body: String },
    #[error("Error running command: {stderr}")]
    CommandStderr { command: String, stderr: String },
    #[error("Timeout running command: {command}")]
    CommandTimeout { command: String, timeout_secs: u64 },
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("The home config directory could not be retrieved")]
    CouldNotRetrieveConfigDirectory,
    #[error("Insufficient servers running: {ok} ok, minimum is {min}")]
    InsufficientServers { ok: usize, min: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Could not configure logging: {0}")]
    LoggingConfiguration(String),
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
    #[error("The private key {0} doesn't exist")]
    PrivateKeyNotFound(String),
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error("{0} already active before starting")]
    ServiceAlreadyActive(String),
    #[error("{0} failed to start")]
    ServiceFailedToStart(String),
    #[error("{0} failed to stop")]
    ServiceFailedToStop(String),
    #[error("Error starting {service}: {reason}")]
    ServiceStartFailed { service: String, reason: String },
    #[error("Error stopping {service}: {reason}")]
    ServiceStopFailed { service: String, reason: String },
    #[error("Could not connect to {host}: {reason}")]
    SshConnectionFailed { host: String, reason: String },
    #[error("SSH command failed: {0}")]
    SshCommandFailed(String),
    #[error("Program termination detected. Exiting restart")]
    Terminate,
}
