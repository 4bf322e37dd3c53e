mod cli;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

use sr_av::FfmpegTranscoder;
use sr_core::config::Config;
use sr_core::LogSink;
use sr_hls::{HttpFetcher, VariantSelector};

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "streamrelay.json";

/// Resolve which config file to read: the explicit path, else the default
/// file if it exists.
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    })
}

/// Load the effective configuration: file (or defaults) plus environment.
fn load_config(explicit: Option<&Path>) -> Config {
    let path = config_path(explicit);
    let mut config = Config::load_or_default(path.as_deref());
    config.apply_env();
    config
}

async fn start_server(host: Option<String>, port: Option<u16>, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path);

    // CLI flags win over file and environment.
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting streamrelay");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    sr_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    // A missing .env file is not an error.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            // Verbose mode: trace for streamrelay (including ffmpeg output), debug for HTTP
            "streamrelay=trace,sr_core=trace,sr_hls=trace,sr_av=trace,sr_relay=trace,sr_server=trace,tower_http=debug".to_string()
        } else {
            "streamrelay=info,sr_core=info,sr_hls=info,sr_av=info,sr_relay=info,sr_server=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command() {
        Commands::Serve { host, port } => {
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::CheckTools => rt.block_on(check_tools(cli.config.as_deref())),
        Commands::Resolve { url } => rt.block_on(resolve(&url, cli.config.as_deref())),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("streamrelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path);
    let tool = FfmpegTranscoder::discover(&config.tools).tool_info().await;

    let status = if tool.available { "✓" } else { "✗" };
    print!("{} {}", status, tool.name);

    if let Some(ref version) = tool.version {
        print!(" ({})", version);
    }

    if let Some(ref path) = tool.path {
        print!(" - {}", path.display());
    }

    println!();
    println!();
    if tool.available {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it or set tools.ffmpeg_path to relay streams.");
    }

    Ok(())
}

async fn resolve(url: &str, config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path);
    let timeout = Duration::from_secs(config.relay.manifest_timeout_secs);
    let fetcher = HttpFetcher::new(timeout).context("failed to build HTTP client")?;

    let log = Arc::new(LogSink::new());
    let selector = VariantSelector::new(Arc::new(fetcher), log.clone());
    let resolved = selector.resolve(url.trim()).await;

    for entry in log.all() {
        let level = if entry.is_error { "ERROR" } else { "INFO" };
        eprintln!("[{level}] {}", entry.message);
    }
    println!("{resolved}");

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let mut config = match config_path(path) {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(&p)
                .with_context(|| format!("failed to load config {}", p.display()))?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };
    config.apply_env();

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Ingest: {}", config.relay.redacted_destination());
    println!(
        "  Stream key: {}",
        if config.relay.stream_key.is_some() {
            "configured"
        } else {
            "missing"
        }
    );
    println!("  Manifest timeout: {}s", config.relay.manifest_timeout_secs);

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
