mod api;
mod config;
mod extract_cmd;
mod status_cmd;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use meterline_channels::{ChannelAdapter, TwilioAdapter};
use meterline_config::MeterlineConfig;

use api::AppState;

#[derive(Parser)]
#[command(name = "meterline")]
#[command(about = "Meterline: meter readings from photos sent over SMS and WhatsApp")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.meterline/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run reading extraction on a JSON file of detected lines
    Extract {
        /// Array of {text, confidence}, or a raw OCR response
        file: PathBuf,
    },
    /// Show current server status
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = meterline_config::load_and_prepare(cli.config.as_deref()).await?;
            if let Some(port) = port {
                config.server.port = port;
            }
            let _guard = logging::init_logger(
                config.logging.dir.as_deref().map(Path::new),
                &config.logging.level,
                config.logging.json,
            )?;
            // Loading ran before the subscriber existed.
            for warning in meterline_config::validate(&config).warnings {
                warn!(path = %warning.path, message = %warning.message, "Config warning");
            }
            run_server(config).await?;
        }
        Commands::Extract { file } => {
            extract_cmd::run(&file).await?;
        }
        Commands::Status { port } => {
            let port = match port {
                Some(port) => port,
                None => meterline_config::load_and_prepare(cli.config.as_deref())
                    .await
                    .map(|c| c.server.port)
                    .unwrap_or(8080),
            };
            status_cmd::run(port).await?;
        }
    }

    Ok(())
}

async fn run_server(config: MeterlineConfig) -> Result<()> {
    info!(
        port = config.server.port,
        bind = %config.server.bind_address,
        db = %config.storage.db_path,
        "Starting Meterline"
    );

    let services = config::build_services(&config)?;

    let twilio = TwilioAdapter::new(config::twilio_config(&config), services.pipeline.clone());
    info!(adapter = twilio.name(), "Registered channel adapter");

    let app_state = Arc::new(AppState {
        store: services.store.clone(),
    });
    let app = api::build_router(app_state, vec![twilio.build_router()], services.media_dir)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    info!(addr = %addr, "HTTP API listening");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
