// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use crate::alert::Alerter;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ssh::SshClientInterface;
use crate::ShutdownFlag;
use log::{debug, error, info};
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeStatus {
    Ok,
    Err,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeError {
    Connect,
    Restart,
}

/// One node of the cluster and its restart state machine.
///
/// `restart` is the only operation. It stops the membership service, waits,
/// stops the data service, then starts them again in reverse order, verifying
/// each step over the SSH channel. Failures are recorded on the node and
/// reported through the alerter; only an interruption propagates to the
/// caller.
pub struct RemoteNode {
    name: String,
    cmsd_svc: String,
    xrootd_svc: String,
    cmsd_wait: u64,
    status: NodeStatus,
    errors: HashSet<NodeError>,
    ssh: Box<dyn SshClientInterface>,
    shutdown: ShutdownFlag,
}

impl RemoteNode {
    pub fn new(
        name: &str,
        config: &Config,
        ssh: Box<dyn SshClientInterface>,
        shutdown: ShutdownFlag,
    ) -> RemoteNode {
        RemoteNode {
            name: name.to_string(),
            cmsd_svc: config.cmsd_svc.clone(),
            xrootd_svc: config.xrootd_svc.clone(),
            cmsd_wait: config.cmsd_wait,
            status: NodeStatus::Ok,
            // Assume the node is in error at the start. If it isn't it won't
            // matter; if it is, the first good pass will clear any alerts.
            errors: HashSet::from([NodeError::Connect, NodeError::Restart]),
            ssh,
            shutdown,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn has_error(&self, error: NodeError) -> bool {
        self.errors.contains(&error)
    }

    /// Restart the services on this node, recording metrics for the attempt.
    ///
    /// Returns `Err(Terminate)` when a shutdown signal interrupted the
    /// restart; every other failure is recorded on the node and reported via
    /// the alerter, and `Ok(())` is returned.
    pub async fn restart(&mut self, alerter: &Alerter) -> Result<()> {
        info!("Restarting {}", self.name);
        alerter.restart_begin(&self.name);
        alerter.set_restart_time(&self.name);
        let timer = alerter.restart_timer(&self.name);
        let result = self.do_restart(alerter).await;
        timer.observe_duration();
        alerter.restart_end(&self.name);
        result
    }

    async fn do_restart(&mut self, alerter: &Alerter) -> Result<()> {
        if let Err(e) = self.ssh.connect().await {
            error!("Error connecting to {}", self.name);
            error!("ERROR: {e}");
            self.errors.insert(NodeError::Connect);
            self.status = NodeStatus::Err;
            alerter
                .connect_failure(
                    &self.name,
                    &format!("xrootdrestart is unable to connect to {}", self.name),
                    &e.to_string(),
                )
                .await;
            return Ok(());
        }
        let mut cmsd_stopped = false;
        let mut xrootd_stopped = false;
        match self.run_sequence(&mut cmsd_stopped, &mut xrootd_stopped).await {
            Ok(()) => {
                self.close_connection().await;
                self.status = NodeStatus::Ok;
                // Stale errors are only cleared once the whole restart has
                // gone through; a connect that worked but a restart that
                // failed keeps both alerts meaningful.
                if self.errors.remove(&NodeError::Restart) {
                    alerter.clear_restart_alert(&self.name).await;
                }
                if self.errors.remove(&NodeError::Connect) {
                    alerter.clear_connect_alert(&self.name).await;
                }
                info!("Restarting {} complete", self.name);
                Ok(())
            }
            Err(Error::Terminate) => {
                info!(
                    "Restarting services as needed and closing the connection to {}",
                    self.name
                );
                self.rollback(cmsd_stopped, xrootd_stopped).await;
                Err(Error::Terminate)
            }
            Err(e) => {
                error!("Error restarting {}", self.name);
                error!("ERROR: {e}");
                self.status = NodeStatus::Err;
                self.errors.insert(NodeError::Restart);
                alerter
                    .restart_failure(
                        &self.name,
                        &format!("Unable to restart the services on {}", self.name),
                        &e.to_string(),
                    )
                    .await;
                self.close_connection().await;
                Ok(())
            }
        }
    }

    async fn run_sequence(
        &self,
        cmsd_stopped: &mut bool,
        xrootd_stopped: &mut bool,
    ) -> Result<()> {
        self.stop_service(&self.cmsd_svc).await?;
        *cmsd_stopped = true;

        self.wait_between_stops().await;

        self.stop_service(&self.xrootd_svc).await?;
        *xrootd_stopped = true;

        self.start_service(&self.xrootd_svc, true).await?;
        *xrootd_stopped = false;

        self.start_service(&self.cmsd_svc, true).await?;
        *cmsd_stopped = false;

        Ok(())
    }

    /// Try to start any services that were stopped before the interruption,
    /// in the reverse of the stop order, then close the channel. Errors here
    /// must not mask the termination, so they are only logged.
    async fn rollback(&self, cmsd_stopped: bool, xrootd_stopped: bool) {
        let result: Result<()> = async {
            if xrootd_stopped {
                self.start_service(&self.xrootd_svc, false).await?;
            }
            if cmsd_stopped {
                self.start_service(&self.cmsd_svc, false).await?;
            }
            Ok(())
        }
        .await;
        if let Err(e) = result {
            error!("Error while resolving termination of the restart: {e}");
            info!("Please verify the state of {} is ok", self.name);
        }
        self.close_connection().await;
    }

    /// Sleep for `cmsd_wait` seconds between stopping cmsd and stopping
    /// xrootd, polling the shutdown flag once a second. The following stop
    /// raises the termination if the flag was set.
    async fn wait_between_stops(&self) {
        if self.cmsd_wait == 0 {
            return;
        }
        info!(
            "Pausing for {} seconds before stopping {}",
            self.cmsd_wait, self.xrootd_svc
        );
        let mut remaining = self.cmsd_wait;
        while remaining > 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            remaining -= 1;
            if self.shutdown.is_set() {
                debug!("The wait before stopping {} was terminated because a signal has been set", self.xrootd_svc);
                break;
            }
        }
    }

    async fn stop_service(&self, service: &str) -> Result<()> {
        if self.shutdown.is_set() {
            return Err(Error::Terminate);
        }
        let started = Instant::now();
        info!("Stopping service {service} on {}", self.name);
        let result = self.stop_and_verify(service).await;
        debug!(
            "Stopping {service} took {:.1}s",
            started.elapsed().as_secs_f64()
        );
        match result {
            Ok(()) => {
                info!("{service} stopped successfully");
                Ok(())
            }
            Err(Error::Terminate) => Err(Error::Terminate),
            Err(e) => Err(Error::ServiceStopFailed {
                service: service.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn stop_and_verify(&self, service: &str) -> Result<()> {
        self.execute_command(&format!("sudo systemctl stop {service}"))
            .await?;
        info!("Checking the state of {service}");
        let stdout = self
            .execute_command(&format!("sudo systemctl is-active {service}"))
            .await?;
        if stdout.trim() == "active" {
            return Err(Error::ServiceFailedToStop(service.to_string()));
        }
        Ok(())
    }

    async fn start_service(&self, service: &str, check_signal: bool) -> Result<()> {
        if check_signal && self.shutdown.is_set() {
            return Err(Error::Terminate);
        }
        let started = Instant::now();
        info!("Starting service {service} on {}", self.name);
        let result = self.start_and_verify(service).await;
        debug!(
            "Starting {service} took {:.1}s",
            started.elapsed().as_secs_f64()
        );
        match result {
            Ok(()) => {
                info!("{service} started successfully");
                Ok(())
            }
            Err(Error::Terminate) => Err(Error::Terminate),
            Err(e) => Err(Error::ServiceStartFailed {
                service: service.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn start_and_verify(&self, service: &str) -> Result<()> {
        // Double check the service is actually stopped before starting it.
        // If it's already active something else is managing it.
        let stdout = self
            .execute_command(&format!("sudo systemctl is-active {service}"))
            .await?;
        if stdout.trim() == "active" {
            return Err(Error::ServiceAlreadyActive(service.to_string()));
        }

        self.execute_command(&format!("sudo systemctl start {service}"))
            .await?;

        info!("Checking the state of {service}");
        let stdout = self
            .execute_command(&format!("sudo systemctl is-active {service}"))
            .await?;
        if stdout.trim() == "inactive" {
            return Err(Error::ServiceFailedToStart(service.to_string()));
        }
        Ok(())
    }

    async fn execute_command(&self, command: &str) -> Result<String> {
        debug!("Executing command ({}): {command}", self.name);
        let output = self.ssh.run_command(command).await?;
        debug!("stdout: {}", output.stdout);
        debug!("stderr: {}", output.stderr);
        if !output.stderr.is_empty() {
            return Err(Error::CommandStderr {
                command: command.to_string(),
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }

    async fn close_connection(&self) {
        info!("Closing connection to {}", self.name);
        if let Err(e) = self.ssh.disconnect().await {
            error!("Error closing connection to {}: {e}", self.name);
        }
    }
}
