// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use crate::alert::Alerter;
use crate::error::{Error, Result};
use crate::node::{NodeStatus, RemoteNode};
use log::{debug, info};

/// Ordered ring of the cluster's nodes.
///
/// The ring tracks how many nodes are healthy and refuses to restart anything
/// once that count drops below the availability floor. The cursor advances
/// before selection and wraps; it starts on the last slot so that the first
/// tick selects the first configured server.
pub struct NodeRing {
    nodes: Vec<RemoteNode>,
    cursor: usize,
    num_ok: usize,
    min_ok: usize,
    insufficient_alert_active: bool,
}

impl NodeRing {
    pub async fn new(nodes: Vec<RemoteNode>, min_ok: usize, alerter: &Alerter) -> NodeRing {
        debug!("Creating the node ring");
        for node in &nodes {
            // Prime the alert gauges from what was active on the last run.
            alerter.reset_alerts(node.name()).await;
        }
        let num_ok = nodes.len();
        let cursor = nodes.len().saturating_sub(1);
        NodeRing {
            nodes,
            cursor,
            num_ok,
            min_ok,
            insufficient_alert_active: true,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_ok(&self) -> usize {
        self.num_ok
    }

    pub fn names(&self) -> String {
        self.nodes
            .iter()
            .map(RemoteNode::name)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Restart the next node in the ring.
    ///
    /// The availability floor is checked first: once too few nodes are
    /// healthy, the insufficient alert is re-raised and `InsufficientServers`
    /// is returned for the caller to exit on. The check happens at the start
    /// of the tick rather than when the count drops, so the scrape window
    /// between the failing restart and termination sees the breach.
    pub async fn restart_next(&mut self, alerter: &Alerter) -> Result<()> {
        if self.num_ok < self.min_ok {
            info!(
                "There are {} nodes ok. There are insufficient to continue restarting",
                self.num_ok
            );
            alerter
                .insufficient_servers(&format!(
                    "Insufficient servers running. There are {} servers ok. \
                     No more servers will be restarted",
                    self.num_ok
                ))
                .await;
            return Err(Error::InsufficientServers {
                ok: self.num_ok,
                min: self.min_ok,
            });
        }

        debug!("Doing next node");
        self.cursor = (self.cursor + 1) % self.nodes.len();
        let node = &mut self.nodes[self.cursor];
        let status_before = node.status();
        let result = node.restart(alerter).await;
        let status_after = self.nodes[self.cursor].status();
        match (status_before, status_after) {
            (NodeStatus::Ok, NodeStatus::Err) => self.adjust_ok(-1, alerter).await,
            (NodeStatus::Err, NodeStatus::Ok) => self.adjust_ok(1, alerter).await,
            _ => {}
        }
        result
    }

    /// Fold one node's status transition into the healthy count. Dropping
    /// below the floor raises the insufficient alert immediately; the process
    /// exit is left to the next `restart_next` call.
    async fn adjust_ok(&mut self, amount: i64, alerter: &Alerter) {
        self.num_ok = (self.num_ok as i64 + amount) as usize;
        debug!(
            "Adjusting num_ok in the ring by {amount}. num_ok now {}. min_ok={}",
            self.num_ok, self.min_ok
        );
        if self.num_ok < self.min_ok {
            info!(
                "Number of working nodes ({}) dropped below the minimum ({})",
                self.num_ok, self.min_ok
            );
            self.insufficient_alert_active = true;
            alerter
                .insufficient_servers(&format!(
                    "Insufficient servers running. There are {} servers ok. \
                     No more servers will be restarted",
                    self.num_ok
                ))
                .await;
        } else if self.insufficient_alert_active {
            self.insufficient_alert_active = false;
            alerter.clear_insufficient_alert().await;
        }
    }

    #[cfg(test)]
    fn node(&self, index: usize) -> &RemoteNode {
        &self.nodes[index]
    }
}
