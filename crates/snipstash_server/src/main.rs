//! SnipStash API server entrypoint.

use snipstash_core::{store, DEFAULT_PORT};
use snipstash_server::{resolve_bind_address, serve_router, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CliFlags {
    help: bool,
}

fn parse_cli_flags(args: &[String]) -> anyhow::Result<CliFlags> {
    let mut flags = CliFlags::default();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => flags.help = true,
            value if value.starts_with('-') => {
                anyhow::bail!(
                    "Unknown option: '{}'. Use --help to see supported options.",
                    value
                );
            }
            value => {
                anyhow::bail!(
                    "Unexpected positional argument: '{}'. Use --help to see supported options.",
                    value
                );
            }
        }
    }
    Ok(flags)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snipstash=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if parse_cli_flags(&args)?.help {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    let current = store::connect(&config.store_url).await?;
    let legacy = match config.legacy_store_url.as_deref() {
        Some(url) => {
            tracing::info!("Legacy snippets will be migrated from {}", url);
            Some(store::connect(url).await?)
        }
        None => None,
    };
    tracing::info!(
        "Compression: {}; guard TTL: {:?}; limits: {:?}",
        config.compression.as_str(),
        config.guard_ttl,
        config.rate_limits
    );

    let bind_addr = resolve_bind_address(&config, std::env::var("BIND").ok().as_deref());
    let state = AppState::new(config, current, legacy);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("SnipStash running at http://{}", actual_addr);

    serve_router(listener, state, shutdown_signal()).await?;
    tracing::info!("Server stopped");
    Ok(())
}

fn print_help() {
    println!("SnipStash Server\n");
    println!("Usage: snipstash [OPTIONS]\n");
    println!("Options:");
    println!("  --help            Show this help message");
    println!("\nEnvironment variables:");
    println!("  STORE_URL         Current store, redis://host:port or memory:// (alias: REDIS_ADDR)");
    println!("  LEGACY_STORE_URL  Store holding snippets to migrate lazily");
    println!("  PORT              Server port (default: {})", DEFAULT_PORT);
    println!(
        "  BIND              Override bind address (e.g. 127.0.0.1:{})",
        DEFAULT_PORT
    );
    println!("  COMPRESSION       snappy, gzip or identity (default: identity)");
    println!("  LIMIT_HITS        Request ceiling per client (default: unlimited)");
    println!("  LIMIT_BYTES       Payload byte ceiling per client (default: unlimited)");
    println!("  CACHING_TIME      Migration guard lifetime, e.g. 90s, 15m, 1h (default: 1h)");
    println!("  BCRYPT_COST       Password hashing cost (default: 10)");
    println!("  MAX_BODY_SIZE     Maximum request body in bytes (default: 1MB)");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
