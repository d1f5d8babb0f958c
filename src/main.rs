//! Certificate analysis service - CLI entry point.
//!
//! Builds the composition root (configuration, recognition engine, logo
//! gallery, reachability probe), wires the pipeline, and serves the HTTP
//! surface.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, Command, ValueEnum};
use tracing::{error, info};

use certscan::analyzer::logo::LogoGallery;
use certscan::analyzer::qr::HttpProbe;
use certscan::api::{app, AppState};
use certscan::config::PipelineConfig;
use certscan::pipeline::Pipeline;
use certscan::recognize::DisabledRecognizer;

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages (default)
    Info,
    /// Debug and all messages
    Debug,
    /// Trace and all messages (most verbose)
    Trace,
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let log_level = matches.get_one::<LogLevel>("verbose").unwrap_or(&LogLevel::Info);
    init_logging(log_level);

    let mut config = if let Some(config_path) = matches.get_one::<String>("config") {
        match load_config_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Failed to load config file: {}", e);
                process::exit(1);
            }
        }
    } else {
        PipelineConfig::default()
    };

    if let Some(bind) = matches.get_one::<String>("bind") {
        config.server.bind_addr = bind.clone();
    }
    if let Some(logos) = matches.get_one::<String>("logos") {
        config.logo.gallery_dir = PathBuf::from(logos);
    }

    // Composition root: heavyweight collaborators are constructed once
    // here and injected, never lazily initialized inside the pipeline.
    let gallery = Arc::new(LogoGallery::load(
        &config.logo.gallery_dir,
        config.logo.max_gallery_size,
    ));
    let probe = match HttpProbe::new(Duration::from_secs(config.qr.probe_timeout_secs)) {
        Ok(probe) => Arc::new(probe),
        Err(e) => {
            error!("Failed to build reachability probe: {}", e);
            process::exit(1);
        }
    };
    let recognizer = Arc::new(DisabledRecognizer);

    let bind_addr = config.server.bind_addr.clone();
    let pipeline = match Pipeline::new(config, recognizer, probe, gallery) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let state = Arc::new(AppState { pipeline });
    let router = app(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_addr, e);
            process::exit(1);
        }
    };

    info!("Certificate analysis service listening on {}", bind_addr);
    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        process::exit(1);
    }
}

fn build_cli() -> Command {
    Command::new("certscan")
        .version("0.1.0")
        .about("Multi-signal authenticity analysis for scanned PDF certificates")
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDR")
                .help("Bind address, e.g. 127.0.0.1:8080"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (JSON/YAML)"),
        )
        .arg(
            Arg::new("logos")
                .short('l')
                .long("logos")
                .value_name("DIR")
                .help("Reference logo gallery directory"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .value_parser(clap::builder::EnumValueParser::<LogLevel>::new())
                .default_value("info")
                .help("Set logging verbosity"),
        )
}

fn init_logging(level: &LogLevel) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let filter_level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(format!("certscan={}", filter_level)))
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

fn load_config_file(path: &str) -> Result<PipelineConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file: {}", e))?;

    // Try JSON first, then YAML
    serde_json::from_str(&content)
        .or_else(|_| serde_yaml::from_str(&content))
        .map_err(|e| format!("Config parsing error: {}", e))
}
