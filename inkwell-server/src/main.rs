use clap::Parser;
use inkwell_core::InkwellConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use inkwell_server::http::{self, HttpState};
use inkwell_server::subsystems::{assist, relay};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "inkwell.toml")]
    config: String,

    /// Print the resolved setup and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match InkwellConfig::load_or_default(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging: RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let assistant = match assist::create_backend_from_config(&config) {
        Ok(backend) => Some(backend),
        Err(e) => {
            tracing::warn!("Assistant disabled: {}", e);
            None
        }
    };

    if args.health {
        println!("✅ Config loaded from {}", args.config);
        println!("✅ Relay scope: {:?}", config.relay.scope);
        match &assistant {
            Some(backend) => println!("✅ Assistant backend: {}", backend.name()),
            None => println!("⚠️  Assistant backend: not configured (OPENAI_API_KEY unset)"),
        }
        if !config.http.enabled {
            println!("❌ HTTP server disabled in config");
            std::process::exit(1);
        }
        println!("✅ Inkwell health check passed");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    // Chat relay
    let (relay_handle, relay_task) = relay::spawn_relay(&config.relay, tx.subscribe());

    if !config.http.enabled {
        tracing::warn!("HTTP server disabled in config, nothing to serve");
        return Ok(());
    }

    let state = HttpState {
        config,
        relay: relay_handle,
        assistant,
    };
    http::start_http_server(state, tx.subscribe()).await?;

    relay_task.await?;
    Ok(())
}
