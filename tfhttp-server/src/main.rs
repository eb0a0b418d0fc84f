//! The tfhttp entry point

mod config;
mod server;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::Config;
use server::AppState;

#[derive(Parser)]
#[command(name = "tfhttp")]
#[command(about = "HTTP state backend for Terraform and OpenTofu")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, bind } => serve(&config, bind).await,
    }
}

async fn serve(config_path: &str, bind: Option<String>) {
    let mut config = match Config::load(config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Errors occurred while loading the application config:");
            eprintln!(" - {error}");
            eprintln!(
                "Please configure the application via {config_path} or TFHTTP_* \
                 environment variables and restart the HTTP server."
            );
            std::process::exit(1);
        }
    };

    if let Some(bind) = bind {
        config.bind_addr = bind;
    }

    init_tracing(&config.log_level);
    tracing::info!("Starting HTTP backend.");

    let settings = match config.backend_settings() {
        Ok(settings) => settings,
        Err(error) => {
            tracing::error!("Invalid backend configuration: {error}");
            std::process::exit(1);
        }
    };

    let (storage, locks) = match tfhttp_state::create_backends(&settings).await {
        Ok(backends) => backends,
        Err(error) => {
            tracing::error!("Failed to construct backends: {error}");
            std::process::exit(1);
        }
    };

    let auth_token = config
        .username
        .as_deref()
        .zip(config.password.as_deref())
        .map(|(username, password)| server::basic_auth_token(username, password));

    let state = Arc::new(AppState {
        storage,
        locks,
        auth_token,
    });

    if let Err(error) = server::run_server(&config, state).await {
        tracing::error!("Server error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "tfhttp_server={level},tfhttp_state={level}"
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
