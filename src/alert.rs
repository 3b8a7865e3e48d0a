// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use crate::config::{Config, MetricsMethod};
use crate::error::{Error, Result};
use crate::HEARTBEAT_INTERVAL;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use chrono::Utc;
use log::{debug, error, info};
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramTimer, HistogramVec, Opts, Registry, TextEncoder,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

pub const ALERT_CONNECT_ERROR: &str = "XROOTDRESTART_CONNECT_ERROR";
pub const ALERT_RESTART_ERROR: &str = "XROOTDRESTART_RESTART_ERROR";
pub const ALERT_INSUFFICIENT_SERVERS: &str = "XROOTDRESTART_INSUFFICIENT_SERVERS";

const BUCKET_WIDTH: u64 = 15;

/// Alert document POSTed to the alert sink. Alerts fetched back from the sink
/// are handled as raw JSON so that fields added by the sink survive the
/// clear round-trip.
#[derive(Debug, Serialize)]
struct Alert {
    labels: AlertLabels,
    annotations: AlertAnnotations,
    #[serde(rename = "startsAt")]
    starts_at: String,
}

#[derive(Debug, Serialize)]
struct AlertLabels {
    alertname: String,
    severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    node: Option<String>,
}

#[derive(Debug, Serialize)]
struct AlertAnnotations {
    summary: String,
    description: String,
}

impl Alert {
    fn new(alert_type: &str, node: Option<&str>, summary: &str, description: &str) -> Alert {
        Alert {
            labels: AlertLabels {
                alertname: alert_type.to_string(),
                severity: "critical".to_string(),
                node: node.map(String::from),
            },
            annotations: AlertAnnotations {
                summary: summary.to_string(),
                description: description.to_string(),
            },
            starts_at: now_rfc3339(),
        }
    }
}

/// Owns the metric registry and the alert lifecycle.
///
/// Gauges always update; traffic to the alert sink is skipped entirely when
/// `alert_url` is empty. The sink is the source of truth for what is active:
/// raising checks for an equal active alert first, and clearing fetches the
/// active alert and posts it back with `endsAt` set.
pub struct Alerter {
    method: MetricsMethod,
    cluster_id: String,
    hostname: String,
    alert_url: String,
    pushgw_url: String,
    metrics_port: u16,
    http: reqwest::Client,
    registry: Registry,
    heartbeat: GaugeVec,
    restart_active: GaugeVec,
    start_time: GaugeVec,
    restart_alert_state: GaugeVec,
    connect_alert_state: GaugeVec,
    insufficient_alert_state: GaugeVec,
    restart_duration: HistogramVec,
}

impl Alerter {
    pub fn new(config: &Config) -> Result<Alerter> {
        let alerts_on = !config.alert_url.is_empty();
        info!(
            "Alerts are {}",
            if alerts_on { "enabled" } else { "disabled" }
        );

        let labels: &[&str] = match config.metrics_method {
            MetricsMethod::Pull => &["node"],
            MetricsMethod::Push => &["node", "cluster"],
        };
        let registry = Registry::new();

        let heartbeat = GaugeVec::new(
            Opts::new(
                "xrootdrestart_heartbeat",
                format!(
                    "xrootdrestart heartbeat generated every {} seconds",
                    HEARTBEAT_INTERVAL.as_secs()
                ),
            ),
            labels,
        )?;
        registry.register(Box::new(heartbeat.clone()))?;
        let restart_active = GaugeVec::new(
            Opts::new(
                "xrootdrestart_restart_active",
                "State of the service restart on an XRootD node. 1=Restart Active, 0=Idle",
            ),
            labels,
        )?;
        registry.register(Box::new(restart_active.clone()))?;
        let start_time = GaugeVec::new(
            Opts::new(
                "xrootdrestart_start_time",
                "Time when xrootdrestart started restarting a server",
            ),
            labels,
        )?;
        registry.register(Box::new(start_time.clone()))?;
        let restart_alert_state = GaugeVec::new(
            Opts::new(
                "xrootdrestart_restart_alert_state",
                "State of the restart alert for a node. 1=Alert, 0=No Alert",
            ),
            labels,
        )?;
        registry.register(Box::new(restart_alert_state.clone()))?;
        let connect_alert_state = GaugeVec::new(
            Opts::new(
                "xrootdrestart_connect_alert_state",
                "Unable to connect alert state. 1=Alert, 0=No Alert",
            ),
            labels,
        )?;
        registry.register(Box::new(connect_alert_state.clone()))?;
        let insufficient_alert_state = GaugeVec::new(
            Opts::new(
                "xrootdrestart_insufficient_alert_state",
                "State of the alert indicating there are insufficient servers to allow \
                 restarting to continue. 1=Alert, 0=No Alert",
            ),
            labels,
        )?;
        registry.register(Box::new(insufficient_alert_state.clone()))?;
        let restart_duration = HistogramVec::new(
            HistogramOpts::new(
                "xrootdrestart_restart_duration_seconds",
                "How long it took to restart a server",
            )
            .buckets(duration_buckets(config.cmsd_wait, config.service_timeout)),
            labels,
        )?;
        registry.register(Box::new(restart_duration.clone()))?;

        let alerter = Alerter {
            method: config.metrics_method,
            cluster_id: config.cluster_id.clone(),
            hostname: config.hostname.clone(),
            alert_url: config.alert_url.clone(),
            pushgw_url: config.pushgw_url.clone(),
            metrics_port: config.metrics_port,
            http: reqwest::Client::new(),
            registry,
            heartbeat,
            restart_active,
            start_time,
            restart_alert_state,
            connect_alert_state,
            insufficient_alert_state,
            restart_duration,
        };
        let hostname = alerter.hostname.clone();
        alerter
            .insufficient_alert_state
            .with_label_values(&alerter.label_values(&hostname))
            .set(0.0);
        Ok(alerter)
    }

    /// Serve the registry over HTTP for the scrape path. Pull mode only.
    pub async fn serve_metrics(alerter: Arc<Alerter>) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], alerter.metrics_port));
        debug!("Creating metrics endpoint on port {}", alerter.metrics_port);
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(Arc::clone(&alerter));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("The metrics endpoint failed: {e}");
            }
        });
        Ok(())
    }

    pub fn render_metrics(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn alerts_on(&self) -> bool {
        !self.alert_url.is_empty()
    }

    fn label_values<'a>(&'a self, node: &'a str) -> Vec<&'a str> {
        match self.method {
            MetricsMethod::Pull => vec![node],
            MetricsMethod::Push => vec![node, &self.cluster_id],
        }
    }

    pub fn restart_begin(&self, node: &str) {
        self.restart_active
            .with_label_values(&self.label_values(node))
            .set(1.0);
    }

    pub fn restart_end(&self, node: &str) {
        self.restart_active
            .with_label_values(&self.label_values(node))
            .set(0.0);
    }

    /// Set the last restart time metric for a node.
    pub fn set_restart_time(&self, node: &str) {
        self.start_time
            .with_label_values(&self.label_values(node))
            .set(unix_now());
    }

    /// Start timing a restart. The duration is observed when the returned
    /// timer is finished or dropped.
    pub fn restart_timer(&self, node: &str) -> HistogramTimer {
        self.restart_duration
            .with_label_values(&self.label_values(node))
            .start_timer()
    }

    /// Set the heartbeat gauge to the current time, pushing the registry to
    /// the gateway when metrics are being pushed.
    pub async fn set_heartbeat(&self) -> Result<()> {
        debug!("heartbeat");
        let hostname = self.hostname.clone();
        self.heartbeat
            .with_label_values(&self.label_values(&hostname))
            .set(unix_now());
        if self.method == MetricsMethod::Push {
            self.push_metrics().await?;
        }
        Ok(())
    }

    async fn push_metrics(&self) -> Result<()> {
        let url = format!("{}/metrics/job/xrootdrestart", self.pushgw_url);
        debug!("Pushing metrics to {url}");
        let body = self.render_metrics()?;
        self.http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn connect_failure(&self, node: &str, summary: &str, description: &str) {
        if self.alerts_on() {
            debug!("Sending {ALERT_CONNECT_ERROR} alert for {node}");
            self.raise_alert(ALERT_CONNECT_ERROR, Some(node), summary, description)
                .await;
        }
        self.connect_alert_state
            .with_label_values(&self.label_values(node))
            .set(1.0);
    }

    pub async fn clear_connect_alert(&self, node: &str) {
        if self.alerts_on() {
            debug!("Clearing {ALERT_CONNECT_ERROR} alert for {node}");
            self.clear_alert(ALERT_CONNECT_ERROR, Some(node)).await;
        }
        self.connect_alert_state
            .with_label_values(&self.label_values(node))
            .set(0.0);
    }

    pub async fn restart_failure(&self, node: &str, summary: &str, description: &str) {
        if self.alerts_on() {
            debug!("Sending {ALERT_RESTART_ERROR} alert for {node}");
            self.raise_alert(ALERT_RESTART_ERROR, Some(node), summary, description)
                .await;
        }
        self.restart_alert_state
            .with_label_values(&self.label_values(node))
            .set(1.0);
    }

    pub async fn clear_restart_alert(&self, node: &str) {
        if self.alerts_on() {
            debug!("Clearing {ALERT_RESTART_ERROR} alert for {node}");
            self.clear_alert(ALERT_RESTART_ERROR, Some(node)).await;
        }
        self.restart_alert_state
            .with_label_values(&self.label_values(node))
            .set(0.0);
    }

    pub async fn insufficient_servers(&self, description: &str) {
        if self.alerts_on() {
            self.raise_alert(
                ALERT_INSUFFICIENT_SERVERS,
                None,
                "Too many servers down",
                description,
            )
            .await;
        }
        let hostname = self.hostname.clone();
        self.insufficient_alert_state
            .with_label_values(&self.label_values(&hostname))
            .set(1.0);
    }

    pub async fn clear_insufficient_alert(&self) {
        if self.alerts_on() {
            debug!("Clearing {ALERT_INSUFFICIENT_SERVERS} alert");
            self.clear_alert(ALERT_INSUFFICIENT_SERVERS, None).await;
        }
        let hostname = self.hostname.clone();
        self.insufficient_alert_state
            .with_label_values(&self.label_values(&hostname))
            .set(0.0);
    }

    /// Prime the per-node alert gauges from whatever is currently active on
    /// the sink. Recovers observable state across supervisor restarts.
    pub async fn reset_alerts(&self, node: &str) {
        let connect_active = self.find_alert(ALERT_CONNECT_ERROR, Some(node)).await;
        self.connect_alert_state
            .with_label_values(&self.label_values(node))
            .set(if connect_active.is_some() { 1.0 } else { 0.0 });

        let restart_active = self.find_alert(ALERT_RESTART_ERROR, Some(node)).await;
        self.restart_alert_state
            .with_label_values(&self.label_values(node))
            .set(if restart_active.is_some() { 1.0 } else { 0.0 });
    }

    async fn raise_alert(
        &self,
        alert_type: &str,
        node: Option<&str>,
        summary: &str,
        description: &str,
    ) {
        if self.find_alert(alert_type, node).await.is_some() {
            debug!("{alert_type} alert is already active, not re-raising");
            return;
        }
        let alert = Alert::new(alert_type, node, summary, description);
        if let Err(e) = self.post_alert(&alert).await {
            error!("Error sending alert {alert_type}: {e}");
        }
    }

    async fn clear_alert(&self, alert_type: &str, node: Option<&str>) {
        if let Some(alert) = self.find_alert(alert_type, node).await {
            if let Err(e) = self.end_alert(alert).await {
                error!("Error ending alert {alert_type}: {e}");
            }
        }
    }

    /// Find an active alert of the given type on the sink, optionally for one
    /// node.
    async fn find_alert(&self, alert_type: &str, node: Option<&str>) -> Option<Value> {
        let alerts = self.get_active_alerts(&[alert_type]).await;
        alerts.into_iter().find(|alert| match node {
            Some(node) => {
                alert.pointer("/labels/node").and_then(Value::as_str) == Some(node)
            }
            None => true,
        })
    }

    /// Return the active alerts on the sink matching the given alert types.
    async fn get_active_alerts(&self, alert_types: &[&str]) -> Vec<Value> {
        if !self.alerts_on() {
            return Vec::new();
        }
        let url = format!("{}/api/v2/alerts", self.alert_url);
        debug!("Requesting alerts from {url}");
        match self.fetch_alerts(&url).await {
            Ok(alerts) => {
                let matching: Vec<Value> = alerts
                    .into_iter()
                    .filter(|alert| {
                        alert
                            .pointer("/labels/alertname")
                            .and_then(Value::as_str)
                            .map(|name| alert_types.contains(&name))
                            .unwrap_or(false)
                    })
                    .collect();
                debug!("{} alerts read", matching.len());
                matching
            }
            Err(e) => {
                error!("Error fetching active alerts: {e}");
                Vec::new()
            }
        }
    }

    async fn fetch_alerts(&self, url: &str) -> Result<Vec<Value>> {
        let alerts = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(alerts)
    }

    /// Set the end time of the alert and post it back to the sink.
    async fn end_alert(&self, mut alert: Value) -> Result<()> {
        info!("Ending alert: {alert}");
        alert["endsAt"] = Value::String(now_rfc3339());
        self.post_alert(&alert).await
    }

    async fn post_alert<T: Serialize>(&self, alert: &T) -> Result<()> {
        let url = format!("{}/api/v2/alerts", self.alert_url);
        debug!("Sending alert to {url}");
        let response = self.http.post(url).json(&[alert]).send().await?;
        if !response.status().is_success() {
            return Err(Error::AlertPostFailed {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        debug!("Alert sent successfully");
        Ok(())
    }
}

async fn metrics_handler(State(alerter): State<Arc<Alerter>>) -> (StatusCode, String) {
    match alerter.render_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Histogram buckets sized from the expected restart duration: the wait
/// between the two stops plus up to two command deadlines, in 15 s steps.
fn duration_buckets(cmsd_wait: u64, service_timeout: u64) -> Vec<f64> {
    let start = (cmsd_wait / BUCKET_WIDTH) * BUCKET_WIDTH;
    let end = ((cmsd_wait + 2 * service_timeout + BUCKET_WIDTH) / BUCKET_WIDTH) * BUCKET_WIDTH;
    (start..end)
        .step_by(BUCKET_WIDTH as usize)
        .map(|bucket| bucket as f64)
        .collect()
}

fn now_rfc3339() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn unix_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_alerter(alert_url: &str) -> Alerter {
        let mut config = Config::for_tests();
        config.alert_url = alert_url.to_string();
        Alerter::new(&config).unwrap()
    }

    fn gauge_value(alerter: &Alerter, gauge: &GaugeVec, node: &str) -> f64 {
        gauge.with_label_values(&alerter.label_values(node)).get()
    }

    fn active_alert(alert_type: &str, node: &str) -> Value {
        json!({
            "labels": {"alertname": alert_type, "severity": "critical", "node": node},
            "annotations": {"summary": "s", "description": "d"},
            "startsAt": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn connect_failure_posts_an_alert_and_sets_the_gauge() {
        let server = MockServer::start_async().await;
        let get_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200).json_body(json!([]));
            })
            .await;
        let post_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/alerts")
                    .body_contains(ALERT_CONNECT_ERROR)
                    .body_contains("se01")
                    .body_contains("critical");
                then.status(200);
            })
            .await;

        let alerter = test_alerter(&server.base_url());
        alerter
            .connect_failure("se01", "cannot connect", "connection refused")
            .await;

        get_mock.assert_async().await;
        post_mock.assert_async().await;
        assert_eq!(gauge_value(&alerter, &alerter.connect_alert_state, "se01"), 1.0);
    }

    #[tokio::test]
    async fn raising_is_idempotent_against_the_sink() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200)
                    .json_body(json!([active_alert(ALERT_CONNECT_ERROR, "se01")]));
            })
            .await;
        let post_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/alerts");
                then.status(200);
            })
            .await;

        let alerter = test_alerter(&server.base_url());
        alerter
            .connect_failure("se01", "cannot connect", "connection refused")
            .await;

        assert_eq!(post_mock.hits_async().await, 0);
        assert_eq!(gauge_value(&alerter, &alerter.connect_alert_state, "se01"), 1.0);
    }

    #[tokio::test]
    async fn clearing_posts_the_fetched_alert_back_with_an_end_time() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200)
                    .json_body(json!([active_alert(ALERT_RESTART_ERROR, "se02")]));
            })
            .await;
        let post_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/alerts")
                    .body_contains("endsAt")
                    .body_contains(ALERT_RESTART_ERROR);
                then.status(200);
            })
            .await;

        let alerter = test_alerter(&server.base_url());
        alerter.restart_alert_state
            .with_label_values(&alerter.label_values("se02"))
            .set(1.0);
        alerter.clear_restart_alert("se02").await;

        post_mock.assert_async().await;
        assert_eq!(gauge_value(&alerter, &alerter.restart_alert_state, "se02"), 0.0);
    }

    #[tokio::test]
    async fn clearing_without_an_active_alert_posts_nothing() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200).json_body(json!([]));
            })
            .await;
        let post_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/alerts");
                then.status(200);
            })
            .await;

        let alerter = test_alerter(&server.base_url());
        alerter.clear_connect_alert("se01").await;

        assert_eq!(post_mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn alerts_for_other_nodes_do_not_match() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200)
                    .json_body(json!([active_alert(ALERT_CONNECT_ERROR, "se02")]));
            })
            .await;
        let post_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/alerts");
                then.status(200);
            })
            .await;

        let alerter = test_alerter(&server.base_url());
        alerter
            .connect_failure("se01", "cannot connect", "connection refused")
            .await;

        // The active alert belongs to se02, so se01 still raises.
        assert_eq!(post_mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn disabled_alerting_still_updates_the_gauges() {
        let alerter = test_alerter("");
        alerter.connect_failure("se01", "s", "d").await;
        assert_eq!(gauge_value(&alerter, &alerter.connect_alert_state, "se01"), 1.0);
        alerter.clear_connect_alert("se01").await;
        assert_eq!(gauge_value(&alerter, &alerter.connect_alert_state, "se01"), 0.0);
        alerter.insufficient_servers("too few").await;
        assert_eq!(
            gauge_value(&alerter, &alerter.insufficient_alert_state, "testhost"),
            1.0
        );
    }

    #[tokio::test]
    async fn reset_alerts_primes_the_gauges_from_the_sink() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200)
                    .json_body(json!([active_alert(ALERT_CONNECT_ERROR, "se01")]));
            })
            .await;

        let alerter = test_alerter(&server.base_url());
        alerter.reset_alerts("se01").await;

        assert_eq!(gauge_value(&alerter, &alerter.connect_alert_state, "se01"), 1.0);
        assert_eq!(gauge_value(&alerter, &alerter.restart_alert_state, "se01"), 0.0);
    }

    #[tokio::test]
    async fn insufficient_alert_carries_no_node_label() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/alerts");
                then.status(200).json_body(json!([]));
            })
            .await;
        let post_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v2/alerts")
                    .body_contains(ALERT_INSUFFICIENT_SERVERS)
                    .body_contains("Too many servers down");
                then.status(200);
            })
            .await;

        let alerter = test_alerter(&server.base_url());
        alerter.insufficient_servers("only 1 server ok").await;

        post_mock.assert_async().await;
        assert_eq!(
            gauge_value(&alerter, &alerter.insufficient_alert_state, "testhost"),
            1.0
        );
    }

    #[tokio::test]
    async fn pull_mode_labels_metrics_with_node_only() {
        let alerter = test_alerter("");
        let families = alerter.registry.gather();
        let insufficient = families
            .iter()
            .find(|f| f.get_name() == "xrootdrestart_insufficient_alert_state")
            .unwrap();
        let labels: Vec<&str> = insufficient.get_metric()[0]
            .get_label()
            .iter()
            .map(|l| l.get_name())
            .collect();
        assert_eq!(labels, vec!["node"]);
    }

    #[tokio::test]
    async fn push_mode_labels_metrics_with_node_and_cluster() {
        let mut config = Config::for_tests();
        config.metrics_method = MetricsMethod::Push;
        let alerter = Alerter::new(&config).unwrap();
        let families = alerter.registry.gather();
        let insufficient = families
            .iter()
            .find(|f| f.get_name() == "xrootdrestart_insufficient_alert_state")
            .unwrap();
        let mut labels: Vec<&str> = insufficient.get_metric()[0]
            .get_label()
            .iter()
            .map(|l| l.get_name())
            .collect();
        labels.sort();
        assert_eq!(labels, vec!["cluster", "node"]);
    }

    #[tokio::test]
    async fn heartbeat_pushes_the_registry_in_push_mode() {
        let server = MockServer::start_async().await;
        let push_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/metrics/job/xrootdrestart")
                    .body_contains("xrootdrestart_heartbeat");
                then.status(200);
            })
            .await;

        let mut config = Config::for_tests();
        config.metrics_method = MetricsMethod::Push;
        config.pushgw_url = server.base_url();
        let alerter = Alerter::new(&config).unwrap();
        alerter.set_heartbeat().await.unwrap();

        push_mock.assert_async().await;
    }

    #[tokio::test]
    async fn a_failing_gateway_surfaces_as_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/metrics/job/xrootdrestart");
                then.status(502);
            })
            .await;

        let mut config = Config::for_tests();
        config.metrics_method = MetricsMethod::Push;
        config.pushgw_url = server.base_url();
        let alerter = Alerter::new(&config).unwrap();

        assert!(alerter.set_heartbeat().await.is_err());
    }

    #[tokio::test]
    async fn pull_mode_heartbeat_does_not_touch_the_gateway() {
        let alerter = test_alerter("");
        alerter.set_heartbeat().await.unwrap();
        let rendered = alerter.render_metrics().unwrap();
        assert!(rendered.contains("xrootdrestart_heartbeat"));
    }

    #[test]
    fn buckets_cover_the_wait_plus_two_command_deadlines() {
        let buckets = duration_buckets(300, 120);
        assert_eq!(buckets.first(), Some(&300.0));
        assert_eq!(buckets.last(), Some(&540.0));
        assert_eq!(buckets.len(), 17);
        assert!(buckets.windows(2).all(|w| w[1] - w[0] == 15.0));
    }

    #[test]
    fn buckets_start_at_zero_for_a_zero_wait() {
        let buckets = duration_buckets(0, 30);
        assert_eq!(buckets.first(), Some(&0.0));
        assert_eq!(buckets.last(), Some(&60.0));
    }

    #[test]
    fn timestamps_use_rfc3339_utc() {
        let stamp = now_rfc3339();
        assert!(stamp.ends_with('Z'));
        assert_eq!(stamp.len(), "2024-01-01T00:00:00Z".len());
    }
}
