use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

mod api;
mod client;
mod config;
mod models;
mod normalize;
mod report;
mod service;

use crate::client::{AnalyzeApi, SslLabsClient};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    setup_console();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config_path = "config.json";
    let config = match std::fs::read_to_string(config_path) {
        Ok(contents) => serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("{} not found, using defaults", config_path);
            AppConfig::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", config_path));
        }
    };

    tokio::fs::create_dir_all(&config.files_dir)
        .await
        .with_context(|| format!("Failed to create report directory {}", config.files_dir))?;

    let client: Arc<dyn AnalyzeApi> = Arc::new(
        SslLabsClient::new(&config.api_base_url, &config.info_url)
            .context("Failed to build HTTP client")?,
    );

    // Startup probe: the probe itself only reports; exiting is main's call.
    let service_info = client
        .service_info()
        .await
        .context("SSL Labs API service is not available")?;
    info!(
        engine = %service_info.engine_version,
        criteria = %service_info.criteria_version,
        "assessment service online"
    );
    for message in &service_info.messages {
        info!("{}", message);
    }

    let state = api::AppState { client, config };
    tokio::spawn(async move {
        if let Err(e) = api::start_server(state).await {
            tracing::error!("HTTP server failed: {:#}", e);
        }
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Closing report service...");

    Ok(())
}

/// Switches the Windows console to UTF-8 with VT sequences so tracing's ANSI
/// colors come through.
#[cfg(windows)]
fn setup_console() {
    use windows_sys::Win32::System::Console::{
        GetConsoleMode, GetStdHandle, SetConsoleMode, SetConsoleOutputCP,
        ENABLE_VIRTUAL_TERMINAL_PROCESSING, STD_OUTPUT_HANDLE,
    };
    unsafe {
        SetConsoleOutputCP(65001);
        let stdout = GetStdHandle(STD_OUTPUT_HANDLE);
        let mut mode = 0;
        if GetConsoleMode(stdout, &mut mode) == 0 {
            return;
        }
        SetConsoleMode(stdout, mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING);
    }
}

#[cfg(not(windows))]
fn setup_console() {}
