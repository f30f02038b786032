use std::env;
use std::fs;
use std::future::IntoFuture;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tabula_store::server::{self, AppState, Registry};
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on, e.g. 0.0.0.0:4050
    #[arg(short, long)]
    addr: Option<String>,

    /// Directory for registry snapshots
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Snapshot filename (relative to the data dir) to load at boot and
    /// write back on shutdown
    #[arg(short, long)]
    snapshot: Option<String>,

    /// Password for an encrypted snapshot
    #[arg(long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let addr = args
        .addr
        .or_else(|| env::var("TABULA_ADDR").ok())
        .unwrap_or_else(|| "0.0.0.0:4050".to_string());

    let data_dir = args
        .data_dir
        .or_else(|| env::var("TABULA_DATA_DIR").ok())
        .unwrap_or_else(|| "data".to_string());
    if !Path::new(&data_dir).exists() {
        fs::create_dir_all(&data_dir)?;
    }

    let snapshot_path = args
        .snapshot
        .as_ref()
        .map(|name| Path::new(&data_dir).join(name));

    let registry = match &snapshot_path {
        Some(path) if path.exists() => {
            let registry = Registry::load_snapshot(path, args.password.as_deref())?;
            println!(
                "Loaded {} collections from {}",
                registry.names().len(),
                path.display()
            );
            Arc::new(registry)
        }
        _ => Arc::new(Registry::new()),
    };

    let app = server::app(AppState::new(registry.clone(), &data_dir));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("Starting Tabula Store Daemon...");
    println!("Tabula listening on {addr} (HTTP)");

    tokio::select! {
        res = axum::serve(listener, app).into_future() => {
            if let Err(e) = res {
                eprintln!("HTTP server failed: {e}");
            }
        }
        _ = signal::ctrl_c() => {
            if let Some(path) = &snapshot_path {
                println!("\nShutdown signal received. Writing snapshot...");
                registry.persist_all(path, args.password.as_deref())?;
                println!("Snapshot written to {}. Exiting.", path.display());
            }
        }
    }

    Ok(())
}
