// Copyright (c) 2023, MaidSafe.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use clap::{Parser, Subcommand};
use color_eyre::Result;
use log::{error, info};
use std::path::{Path, PathBuf};
use xrootdrestart::{
    config::Config,
    error::Error,
    logging::DedupLogger,
    supervisor::{Supervisor, EXIT_EXCEPTION, EXIT_KEY_MISSING},
    LOG_FILE,
};

#[derive(Parser, Debug)]
#[clap(name = "xrootdrestart", version = env!("CARGO_PKG_VERSION"))]
struct Opt {
    /// Path to the configuration file. Defaults to the standard location for
    /// the current user.
    #[clap(long, short, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the rolling-restart supervisor. This is the default command.
    Run,
    /// Inspect or create the configuration file.
    #[clap(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the resolved configuration.
    Show,
    /// Create a default configuration file if none exists.
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::parse();
    match opt.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let code = run_supervisor(opt.config).await;
            std::process::exit(code);
        }
        Commands::Config(ConfigCommands::Show) => {
            env_logger::init();
            let config = Config::load_without_key_check(opt.config)?;
            print!("{}", config_listing(&config));
            Ok(())
        }
        Commands::Config(ConfigCommands::Init) => {
            env_logger::init();
            let config = Config::load_without_key_check(opt.config)?;
            println!("Configuration file: {}", config.config_file.display());
            Ok(())
        }
    }
}

async fn run_supervisor(config_path: Option<PathBuf>) -> i32 {
    if let Err(e) = DedupLogger::init(Path::new(LOG_FILE), log::LevelFilter::Debug) {
        // The daemon normally logs to the file; without it, stderr will do.
        eprintln!("Could not open {LOG_FILE}: {e}. Logging to stderr instead.");
        env_logger::init();
    }

    info!("===========================================================================");
    info!("=============================  PROGRAM START ==============================");
    info!("===========================================================================");

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(Error::PrivateKeyNotFound(path)) => {
            info!("The private key {path} doesn't exist");
            return EXIT_KEY_MISSING;
        }
        Err(e) => {
            error!("Error reading the configuration: {e}");
            return EXIT_EXCEPTION;
        }
    };
    info!("Config file: {}", config.config_file.display());
    info!("Setting log level to {}", config.log_level);
    log::set_max_level(config.log_level);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    config.log_settings();

    Supervisor::new(config).run().await
}

fn config_listing(config: &Config) -> String {
    format!(
        "config_file: {}\n\
         cluster_id: {}\n\
         cmsd_period: {}\n\
         cmsd_wait: {}\n\
         service_timeout: {}\n\
         pkey_name: {}\n\
         pkey_path: {}\n\
         servers: {}\n\
         ssh_user: {}\n\
         min_ok: {}\n\
         xrootd_svc: {}\n\
         cmsd_svc: {}\n\
         log_level: {}\n\
         prom_url: {}\n\
         alert_url: {}\n\
         pushgw_url: {}\n\
         metrics_port: {}\n\
         metrics_method: {}\n",
        config.config_file.display(),
        config.cluster_id,
        config.cmsd_period,
        config.cmsd_wait,
        config.service_timeout,
        config.pkey_name,
        config.pkey_path.display(),
        config.servers.join(","),
        config.ssh_user,
        config.min_ok,
        config.xrootd_svc,
        config.cmsd_svc,
        config.log_level,
        config.prom_url,
        config.alert_url,
        config.pushgw_url,
        config.metrics_port,
        config.metrics_method,
    )
}
