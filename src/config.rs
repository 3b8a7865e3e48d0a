// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use crate::error::{Error, Result};
use config::{Config as Settings, File, FileFormat};
use log::{info, warn};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE_NAME: &str = "xrootdrestart.conf";

const DEFAULT_CLUSTER_ID: &str = "production";
const DEFAULT_SSH_USER: &str = "xrootdrestart";
// Each node is restarted every three days.
const DEFAULT_CMSD_PERIOD: u64 = 3 * 24 * 3600;
const DEFAULT_CMSD_WAIT: u64 = 300;
const DEFAULT_SERVICE_TIMEOUT: u64 = 120;
const DEFAULT_MIN_OK: usize = 1;
const DEFAULT_PKEY_NAME: &str = "xrootdrestartkey";
const DEFAULT_XROOTD_SVC: &str = "xrootd@cluster";
const DEFAULT_CMSD_SVC: &str = "cmsd@cluster";
const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";
const DEFAULT_ALERTMANAGER_URL: &str = "http://localhost:9093";
const DEFAULT_PUSHGW_URL: &str = "http://localhost:9091";
const DEFAULT_METRICS_PORT: u16 = 8000;
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MetricsMethod {
    #[default]
    Pull,
    Push,
}

impl std::fmt::Display for MetricsMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsMethod::Pull => write!(f, "PULL"),
            MetricsMethod::Push => write!(f, "PUSH"),
        }
    }
}

impl std::str::FromStr for MetricsMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PULL" => Ok(MetricsMethod::Pull),
            "PUSH" => Ok(MetricsMethod::Push),
            _ => Err(format!("Invalid metrics method: {s}")),
        }
    }
}

/// Operator-visible settings, loaded once at startup and not reloaded.
///
/// All keys live in the `[general]` section of an INI file. Unknown keys are
/// ignored; values that fail to parse fall back to the defaults with a
/// warning rather than aborting the supervisor.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub cluster_id: String,
    pub servers: Vec<String>,
    pub ssh_user: String,
    pub pkey_path: PathBuf,
    pub pkey_name: String,
    pub xrootd_svc: String,
    pub cmsd_svc: String,
    pub cmsd_period: u64,
    pub cmsd_wait: u64,
    pub service_timeout: u64,
    pub min_ok: usize,
    pub metrics_method: MetricsMethod,
    pub metrics_port: u16,
    pub pushgw_url: String,
    pub alert_url: String,
    pub prom_url: String,
    pub log_level: log::LevelFilter,
    /// Hostname of the machine running the supervisor. Derived, not persisted.
    pub hostname: String,
    pub config_file: PathBuf,
}

impl Config {
    /// The standard configuration directory for the current user: a system
    /// path when running as the superuser, otherwise under the home config
    /// directory.
    pub fn default_config_dir() -> Result<PathBuf> {
        if unsafe { libc::geteuid() } == 0 {
            Ok(PathBuf::from("/etc/xrootdrestart"))
        } else {
            Ok(dirs_next::config_dir()
                .ok_or_else(|| Error::CouldNotRetrieveConfigDirectory)?
                .join("xrootdrestart"))
        }
    }

    pub fn default_config_file() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Read the settings from the config file, writing a default file first
    /// if none exists. Fails if the private key file is missing.
    pub fn load(config_file: Option<PathBuf>) -> Result<Config> {
        Self::load_inner(config_file, true)
    }

    /// As `load`, but tolerates a missing private key. Used by flows that run
    /// before the key pair has been distributed.
    pub fn load_without_key_check(config_file: Option<PathBuf>) -> Result<Config> {
        Self::load_inner(config_file, false)
    }

    fn load_inner(config_file: Option<PathBuf>, fail_no_key: bool) -> Result<Config> {
        let config_file = match config_file {
            Some(path) => path,
            None => Self::default_config_file()?,
        };
        let mut config = Self::with_defaults(config_file.clone())?;

        if !config_file.exists() {
            info!("Create a default config file: {}", config_file.display());
            config.save()?;
        }

        let settings = Settings::builder()
            .add_source(File::from(config_file).format(FileFormat::Ini))
            .build()?;
        let get = |key: &str| settings.get_string(&format!("general.{key}")).ok();

        if let Some(value) = get("cluster_id") {
            config.cluster_id = value;
        }
        if let Some(value) = get("servers") {
            config.servers = value
                .split(',')
                .map(|server| server.trim().to_string())
                .filter(|server| !server.is_empty())
                .collect();
        }
        if let Some(value) = get("ssh_user") {
            config.ssh_user = value;
        }
        if let Some(value) = get("pkey_path") {
            config.pkey_path = expand_user(&value);
        }
        if let Some(value) = get("pkey_name") {
            config.pkey_name = value;
        }
        if let Some(value) = get("xrootd_svc") {
            config.xrootd_svc = value;
        }
        if let Some(value) = get("cmsd_svc") {
            config.cmsd_svc = value;
        }
        config.cmsd_period = parse_or("cmsd_period", get("cmsd_period"), DEFAULT_CMSD_PERIOD);
        if config.cmsd_period == 0 {
            warn!("cmsd_period must be greater than zero. Using the default");
            config.cmsd_period = DEFAULT_CMSD_PERIOD;
        }
        config.cmsd_wait = parse_or("cmsd_wait", get("cmsd_wait"), DEFAULT_CMSD_WAIT);
        config.service_timeout = parse_or(
            "service_timeout",
            get("service_timeout"),
            DEFAULT_SERVICE_TIMEOUT,
        );
        if config.service_timeout == 0 {
            warn!("service_timeout must be greater than zero. Using the default");
            config.service_timeout = DEFAULT_SERVICE_TIMEOUT;
        }
        config.min_ok = parse_or("min_ok", get("min_ok"), DEFAULT_MIN_OK);
        config.metrics_port = parse_or("metrics_port", get("metrics_port"), DEFAULT_METRICS_PORT);
        if let Some(value) = get("pushgw_url") {
            config.pushgw_url = value;
        }
        if let Some(value) = get("alert_url") {
            config.alert_url = value;
        }
        if let Some(value) = get("prom_url") {
            config.prom_url = value;
        }
        if let Some(value) = get("metrics_method") {
            config.metrics_method = value.parse().unwrap_or_else(|_| {
                warn!("{value} is not a valid metrics method. Changing to PULL");
                MetricsMethod::Pull
            });
        }
        if let Some(value) = get("log_level") {
            config.log_level = log::LevelFilter::from_str(&value).unwrap_or_else(|_| {
                warn!("{value} is not a valid log level. Changing to INFO");
                DEFAULT_LOG_LEVEL
            });
        }

        if fail_no_key && !config.pkey_name.is_empty() {
            let priv_file = config.private_key_file();
            if !priv_file.is_file() {
                return Err(Error::PrivateKeyNotFound(
                    priv_file.to_string_lossy().to_string(),
                ));
            }
        }

        Ok(config)
    }

    fn with_defaults(config_file: PathBuf) -> Result<Config> {
        let config_dir = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Config {
            cluster_id: DEFAULT_CLUSTER_ID.to_string(),
            servers: Vec::new(),
            ssh_user: DEFAULT_SSH_USER.to_string(),
            pkey_path: config_dir,
            pkey_name: DEFAULT_PKEY_NAME.to_string(),
            xrootd_svc: DEFAULT_XROOTD_SVC.to_string(),
            cmsd_svc: DEFAULT_CMSD_SVC.to_string(),
            cmsd_period: DEFAULT_CMSD_PERIOD,
            cmsd_wait: DEFAULT_CMSD_WAIT,
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
            min_ok: DEFAULT_MIN_OK,
            metrics_method: MetricsMethod::Pull,
            metrics_port: DEFAULT_METRICS_PORT,
            pushgw_url: DEFAULT_PUSHGW_URL.to_string(),
            alert_url: DEFAULT_ALERTMANAGER_URL.to_string(),
            prom_url: DEFAULT_PROMETHEUS_URL.to_string(),
            log_level: DEFAULT_LOG_LEVEL,
            hostname: hostname::get()?.to_string_lossy().to_string(),
            config_file,
        })
    }

    /// Full path to the private key used for the SSH connections.
    pub fn private_key_file(&self) -> PathBuf {
        self.pkey_path.join(&self.pkey_name)
    }

    /// Write the settings back to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.config_file, self.render())?;
        Ok(())
    }

    fn render(&self) -> String {
        let mut out = String::from("[general]\n");
        let _ = writeln!(out, "cluster_id = {}", self.cluster_id);
        let _ = writeln!(out, "cmsd_period = {}", self.cmsd_period);
        let _ = writeln!(out, "cmsd_wait = {}", self.cmsd_wait);
        let _ = writeln!(out, "service_timeout = {}", self.service_timeout);
        let _ = writeln!(out, "pkey_name = {}", self.pkey_name);
        let _ = writeln!(out, "pkey_path = {}", self.pkey_path.display());
        let _ = writeln!(out, "servers = {}", self.servers.join(","));
        let _ = writeln!(out, "ssh_user = {}", self.ssh_user);
        let _ = writeln!(out, "min_ok = {}", self.min_ok);
        let _ = writeln!(out, "xrootd_svc = {}", self.xrootd_svc);
        let _ = writeln!(out, "cmsd_svc = {}", self.cmsd_svc);
        let _ = writeln!(out, "log_level = {}", self.log_level);
        let _ = writeln!(out, "prom_url = {}", self.prom_url);
        let _ = writeln!(out, "alert_url = {}", self.alert_url);
        let _ = writeln!(out, "pushgw_url = {}", self.pushgw_url);
        let _ = writeln!(out, "metrics_port = {}", self.metrics_port);
        let _ = writeln!(out, "metrics_method = {}", self.metrics_method);
        out
    }

    /// Dump every setting to the log at startup.
    pub fn log_settings(&self) {
        info!("cluster_id: {}", self.cluster_id);
        info!("cmsd_period: {}", self.cmsd_period);
        info!("cmsd_wait: {}", self.cmsd_wait);
        info!("service_timeout: {}", self.service_timeout);
        info!("pkey_name: {}", self.pkey_name);
        info!("pkey_path: {}", self.pkey_path.display());
        info!("servers: {}", self.servers.join(","));
        info!("ssh_user: {}", self.ssh_user);
        info!("min_ok: {}", self.min_ok);
        info!("xrootd_svc: {}", self.xrootd_svc);
        info!("cmsd_svc: {}", self.cmsd_svc);
        info!("log_level: {}", self.log_level);
        info!("prom_url: {}", self.prom_url);
        info!("alert_url: {}", self.alert_url);
        info!("pushgw_url: {}", self.pushgw_url);
        info!("metrics_port: {}", self.metrics_port);
        info!("metrics_method: {}", self.metrics_method);
    }
}

fn parse_or<T: FromStr + std::fmt::Display + Copy>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{raw} is not a valid value for {key}. Using the default {default}");
            default
        }),
        None => default,
    }
}

fn expand_user(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
impl Config {
    /// A config suitable for unit tests: no servers, alerting disabled, pull
    /// metrics, short timings.
    pub fn for_tests() -> Config {
        Config {
            cluster_id: "testcluster".to_string(),
            servers: Vec::new(),
            ssh_user: "xrootdrestart".to_string(),
            pkey_path: PathBuf::from("/tmp"),
            pkey_name: String::new(),
            xrootd_svc: "xrootd@cluster".to_string(),
            cmsd_svc: "cmsd@cluster".to_string(),
            cmsd_period: 90,
            cmsd_wait: 0,
            service_timeout: 5,
            min_ok: 1,
            metrics_method: MetricsMethod::Pull,
            metrics_port: 0,
            pushgw_url: String::new(),
            alert_url: String::new(),
            prom_url: String::new(),
            log_level: log::LevelFilter::Debug,
            hostname: "testhost".to_string(),
            config_file: PathBuf::from("/tmp/xrootdrestart-test.conf"),
        }
    }
}
