//! QrShare
//!
//! Share local files and folders with any browser on the network.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use server::auth::AuthConfig;
use server::config::Config;
use server::http::{router, AppState};
use server::network::access_urls;
use server::share::ShareRoot;
use server::ui::qr::{generate_png_qr, generate_terminal_qr};

/// QrShare - share local folders over HTTP with a QR code.
#[derive(Parser, Debug)]
#[command(name = "qrshare")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Files and directories to share
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Refuse uploads, deletes, moves, and creation
    #[arg(long)]
    pub readonly: bool,

    /// Access token (random when not set anywhere)
    #[arg(long)]
    pub token: Option<String>,

    /// Address to listen on
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write the access QR code to a PNG file
    #[arg(long, value_name = "FILE")]
    pub qr_png: Option<PathBuf>,
}

impl Cli {
    /// Apply command-line values on top of `config`.
    fn apply_overrides(&self, config: &mut Config) {
        if !self.paths.is_empty() {
            config.share.paths = self.paths.clone();
        }
        if self.readonly {
            config.share.readonly = true;
        }
        if let Some(token) = &self.token {
            config.security.token = Some(token.clone());
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.verbose {
            config.server.log_level = "debug".to_string();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };

    // Environment first, then the command line
    let env_notes = config.apply_env_overrides();
    cli.apply_overrides(&mut config);

    // Validate configuration
    config.validate()?;

    let _log_guard = server::logging::init(&config.server.log_level, config.server.log_dir.as_deref())?;
    tracing::info!("QrShare starting...");
    for note in &env_notes {
        tracing::info!("{note}");
    }

    let share = ShareRoot::new(&config.share.paths)?;
    let auth = AuthConfig::from_config(config.security.token.as_deref(), &config.security.users);

    let bind: IpAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.bind))?;
    let listener = tokio::net::TcpListener::bind((bind, config.server.port))
        .await
        .with_context(|| format!("Failed to listen on {}:{}", bind, config.server.port))?;

    println!("Readonly: {}", config.share.readonly);
    println!("Upload folder set to {}", share.path().display());

    let urls = access_urls(bind, config.server.port, auth.token());
    for url in &urls {
        println!("Accessible on {url}");
        println!("{}", generate_terminal_qr(url)?);
    }

    if let (Some(png_path), Some(url)) = (&cli.qr_png, urls.first()) {
        generate_png_qr(url, png_path)
            .with_context(|| format!("Failed to write QR code to {}", png_path.display()))?;
        println!("QR code saved to: {}", png_path.display());
    }

    let state = Arc::new(AppState::from_config(share.path(), &config, auth));
    tracing::info!(root = %share.path().display(), readonly = config.share.readonly, "serving");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down");
    share.close()?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
