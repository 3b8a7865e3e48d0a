// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use crate::alert::Alerter;
use crate::config::{Config, MetricsMethod};
use crate::error::{Error, Result};
use crate::node::RemoteNode;
use crate::ring::NodeRing;
use crate::ssh::SshClient;
use crate::{ShutdownFlag, HEARTBEAT_INTERVAL};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

pub const EXIT_CLEAN: i32 = 0;
pub const EXIT_KEY_MISSING: i32 = 1;
pub const EXIT_EXCEPTION: i32 = 2;
pub const EXIT_SIGNAL: i32 = 3;

const SCHEDULER_POLL: Duration = Duration::from_secs(5);

/// Owns the periodic scheduler: wires the alerter, the heartbeat and the node
/// ring together and walks the ring until shutdown or a fatal condition.
pub struct Supervisor {
    config: Config,
}

impl Supervisor {
    pub fn new(config: Config) -> Supervisor {
        Supervisor { config }
    }

    /// Run until shutdown. Returns the process exit code.
    pub async fn run(&self) -> i32 {
        let shutdown = ShutdownFlag::new();
        if let Err(e) = spawn_signal_listeners(shutdown.clone()) {
            error!("Could not install the signal handlers: {e}");
            return EXIT_EXCEPTION;
        }
        self.run_with_shutdown(shutdown).await
    }

    pub async fn run_with_shutdown(&self, shutdown: ShutdownFlag) -> i32 {
        match self.run_inner(shutdown).await {
            Ok(code) => code,
            Err(Error::Terminate) => {
                info!("Program terminating");
                EXIT_SIGNAL
            }
            Err(e) => {
                error!("Program terminating because of an exception: {e}");
                EXIT_EXCEPTION
            }
        }
    }

    async fn run_inner(&self, shutdown: ShutdownFlag) -> Result<i32> {
        let config = &self.config;

        info!("Starting Alerter");
        let alerter = Arc::new(Alerter::new(config)?);
        if config.metrics_method == MetricsMethod::Pull {
            Alerter::serve_metrics(Arc::clone(&alerter)).await?;
        }

        info!("Starting heartbeat task");
        spawn_heartbeat(Arc::clone(&alerter), shutdown.clone());

        if config.servers.is_empty() {
            info!("No servers specified. Program exit");
            return Ok(EXIT_CLEAN);
        }

        let nodes = config
            .servers
            .iter()
            .map(|name| {
                let ssh = SshClient::new(
                    name,
                    &config.ssh_user,
                    config.private_key_file(),
                    Duration::from_secs(config.service_timeout),
                );
                RemoteNode::new(name, config, Box::new(ssh), shutdown.clone())
            })
            .collect();
        let mut ring = NodeRing::new(nodes, config.min_ok, &alerter).await;
        info!("Processing server list: {}", ring.names());

        let interval = restart_interval(config.cmsd_period, ring.len());
        info!(
            "A server will be restarted every {} seconds",
            interval.as_secs_f64()
        );

        // The first restart runs immediately; the schedule starts after it.
        let mut next_tick = Instant::now();
        loop {
            if shutdown.is_set() {
                info!("Received signal to stop");
                info!("Program terminated. Exit gracefully");
                return Ok(EXIT_SIGNAL);
            }
            if Instant::now() >= next_tick {
                ring.restart_next(&alerter).await?;
                next_tick += interval;
            }
            let now = Instant::now();
            if now < next_tick {
                sleep((next_tick - now).min(SCHEDULER_POLL)).await;
            }
        }
    }
}

/// The interval between restarts across the ring, sized so that each node is
/// restarted once per `cmsd_period`.
pub fn restart_interval(cmsd_period: u64, server_count: usize) -> Duration {
    Duration::from_secs_f64(cmsd_period as f64 / server_count as f64)
}

fn spawn_signal_listeners(shutdown: ShutdownFlag) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received. Setting flag to abort the restart process");
            }
            _ = sigint.recv() => {
                info!("SIGINT received. Setting flag to abort the restart process");
            }
        }
        shutdown.set();
    });
    Ok(())
}

/// Write the heartbeat gauge every `HEARTBEAT_INTERVAL` seconds. A failure
/// to set or push the heartbeat disables the task but never the supervisor.
fn spawn_heartbeat(alerter: Arc<Alerter>, shutdown: ShutdownFlag) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            ticker.tick().await;
            if shutdown.is_set() {
                info!("Stopping heartbeat");
                break;
            }
            if let Err(e) = alerter.set_heartbeat().await {
                error!("Error generating the heartbeat: {e}");
                error!("Heartbeat disabled");
                break;
            }
        }
    })
}
