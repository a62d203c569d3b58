use clap::Parser;
use env_logger::Builder;
use log::{info, warn, LevelFilter};
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use mst_server::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listen address from the config file
    #[arg(short, long)]
    address: Option<String>,

    /// Override the worker pool size from the config file
    #[arg(short, long)]
    workers: Option<usize>,
}

fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Resolves when the operator asks for shutdown: SIGINT/SIGTERM, or an
/// `exit` line typed on the server console.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to install ctrl-c handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let console_exit = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim() == "exit" => break,
                Ok(Some(_)) => continue,
                // Console closed (e.g. running detached): wait on signals only.
                Ok(None) | Err(_) => std::future::pending::<()>().await,
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
        _ = console_exit => info!("operator requested exit"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(address) = args.address {
        config.server.address = address;
    }
    if let Some(workers) = args.workers {
        config.pool.workers = workers;
    }

    let server = Server::bind(config).await?;
    server.run_until(shutdown_signal()).await?;

    Ok(())
}
