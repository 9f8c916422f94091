mod alias_registry;
mod config;
mod connection;
mod demo_source;
mod error;
mod fanout_sink;
mod node;
mod transport;

use clap::Parser;
use node::Node;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "streammesh-node", about = "Hosts the subscription-stream dispatch core over a WebSocket")]
struct Opt {
    /// Path to a YAML or JSON config file describing the node's services.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the config file's listen address.
    #[arg(long)]
    bind_addr: Option<SocketAddr>,

    /// Dispatch tick period in milliseconds (liveness/aggregation safety net).
    #[arg(long, default_value_t = 200)]
    tick_interval_ms: u64,
}

fn setup_logger() {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logger();
    let opt = Opt::parse();

    let mut cfg = config::load_config(opt.config.as_deref())?;
    if let Some(bind_addr) = opt.bind_addr {
        cfg.bind_addr = bind_addr;
    }
    let bind_addr = cfg.bind_addr;
    let tick_interval = Duration::from_millis(opt.tick_interval_ms);

    let node = Arc::new(Node::build(cfg, tick_interval));
    let routes = transport::routes(node);

    tracing::info!(%bind_addr, "starting streammesh node");
    warp::serve(routes).run(bind_addr).await;
    Ok(())
}
