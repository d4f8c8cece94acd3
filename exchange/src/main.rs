use clap::Parser;
use exchange::config::RuntimeConfig;
use exchange::server::Server;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about = "spot exchange matching daemon")]
struct Args {
    /// Path to the runtime config
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
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
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::try_init().unwrap_or_default();
    let args = Args::parse();
    RuntimeConfig::from_toml(&args.config);

    let mut server = Server::builder();
    server.start().await?;
    shutdown_signal().await;
    server.stop();
    Ok(())
}
