//! hbi gRPC Server
//!
//! A standalone server binary exposing the in-memory host inventory over gRPC.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tonic::transport::Server;
use tracing::info;

use hbi::transport::HostInventoryService;
use hbi::{HostStore, InMemoryHostStore, StoreConfig};

/// Server command line arguments.
#[derive(Parser, Debug)]
#[command(name = "hbi-server")]
#[command(about = "Host-based inventory gRPC server", version)]
struct Args {
    /// Address to bind to
    #[arg(long, env = "HBI_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 50051)]
    port: u16,

    /// JSON store configuration (resolution policy, merge reindexing)
    #[arg(short, long, env = "HBI_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("hbi=debug,info")
        } else {
            EnvFilter::new("hbi=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let store_config = match &args.config {
        Some(path) => StoreConfig::from_json_file(path)?,
        None => StoreConfig::default(),
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        resolution = ?store_config.resolution,
        reindex_attributes_on_merge = store_config.reindex_attributes_on_merge,
        "starting hbi-server"
    );

    let store: Arc<dyn HostStore> = Arc::new(InMemoryHostStore::with_config(store_config));
    let svc = HostInventoryService::new(Arc::clone(&store)).into_server();

    let addr = SocketAddr::new(args.host, args.port);
    info!(%addr, "serving gRPC; press Ctrl+C to stop");

    Server::builder()
        .add_service(svc)
        .serve_with_shutdown(addr, async {
            let _ = signal::ctrl_c().await;
        })
        .await?;

    info!(hosts = store.len()?, "shut down; in-memory inventory discarded");
    Ok(())
}
