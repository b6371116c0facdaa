//! crop-server binary.
//!
//! Resolves the configuration, loads the source image and serves crops of it
//! until the process is killed.
//!
//! # Environment Variables
//!
//! - `IMAGE_FILE` — image to serve (default: `image.png`, flag `-file`)
//! - `URL_PATH` — crop endpoint path (default: `/testimage`, flag `-url`)
//! - `LISTEN_PORT` — HTTP port (default: 8080, flag `-port`)
//! - `RUST_LOG` — Tracing filter (default: "info,crop_server=debug")
//!
//! Flags override environment variables.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin crop-server -- -file photo.jpg -port 9000
//! ```

use std::process::ExitCode;

use anyhow::Context;
use crop_server::{bootstrap, ConfigError, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,crop_server=debug".into()),
        )
        .init();

    let program = std::env::args_os()
        .next()
        .map(|arg| arg.to_string_lossy().into_owned())
        .unwrap_or_else(|| "crop-server".to_string());

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::HelpRequested) => {
            eprint!("{}", ServerConfig::usage(&program));
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{e}");
            eprint!("{}", ServerConfig::usage(&program));
            return ExitCode::from(2);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!(
        version = crop_server::VERSION,
        file = %config.image_file.display(),
        url = %config.url_path,
        port = config.port,
        "crop-server starting"
    );

    let app = bootstrap(&config)
        .with_context(|| format!("Cannot load {}", config.image_file.display()))?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;

    tracing::info!("Listening on :{}", config.port);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  {}?w=&h= — crop", config.url_path);
    tracing::info!("  GET  /healthz — liveness check");

    crop_server::server::serve(listener, app).await;
    Ok(())
}
