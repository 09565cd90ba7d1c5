//! peervisor server binary.
//!
//! # Environment Variables
//!
//! - `PEERVISOR_BIND`: listen address (default `0.0.0.0:5000`)
//! - `PEERVISOR_EXPECT_TIMEOUT_MS`: wait bound for expected responses (`0` = default 5000)
//! - `PEERVISOR_SUBSCRIBER_CAPACITY`: per-subscriber event queue size
//! - `PEERVISOR_HISTORY`: recent-events ring size (`0` disables `/messages`)
//! - `PEERVISOR_PRIMARY_PEER`, `PEERVISOR_SECONDARY_PEER`: handshake counterparties
//! - `PEERVISOR_FEATURE_BITS`: comma-separated extra feature bits for the second `init`
//! - `RUST_LOG`: log filter (default `info`)

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use peervisor::{Config, Orchestrator, PeerIdentity, server};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Sequence orchestrator and live event broadcaster for simulated peer handshakes.
#[derive(Parser, Debug)]
#[command(name = "peervisor")]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PEERVISOR_BIND", default_value = "0.0.0.0:5000")]
    bind: SocketAddr,

    /// Wait bound for expected responses, in milliseconds (0 = default)
    #[arg(long, env = "PEERVISOR_EXPECT_TIMEOUT_MS", default_value_t = 5_000)]
    expect_timeout_ms: u64,

    /// Per-subscriber event queue size
    #[arg(long, env = "PEERVISOR_SUBSCRIBER_CAPACITY", default_value_t = 256)]
    subscriber_capacity: usize,

    /// Recent-events ring size (0 disables it)
    #[arg(long, env = "PEERVISOR_HISTORY", default_value_t = 512)]
    history: usize,

    /// First handshake counterparty
    #[arg(long, env = "PEERVISOR_PRIMARY_PEER", default_value = "03")]
    primary_peer: String,

    /// Second handshake counterparty
    #[arg(long, env = "PEERVISOR_SECONDARY_PEER", default_value = "02")]
    secondary_peer: String,

    /// Extra feature bits advertised in the second init
    #[arg(long, env = "PEERVISOR_FEATURE_BITS", value_delimiter = ',', default_value = "99")]
    feature_bits: Vec<u32>,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            subscriber_capacity: self.subscriber_capacity,
            expect_timeout: Duration::from_millis(self.expect_timeout_ms),
            primary_peer: PeerIdentity::new(self.primary_peer.as_str()),
            secondary_peer: PeerIdentity::new(self.secondary_peer.as_str()),
            additional_feature_bits: self.feature_bits.clone(),
            history_capacity: self.history,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug,hyper=warn,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    let cfg = args.config();
    info!(
        bind = %args.bind,
        expect_timeout_ms = cfg.expect_timeout_ms(),
        primary = %cfg.primary_peer,
        secondary = %cfg.secondary_peer,
        "peervisor v{}",
        env!("CARGO_PKG_VERSION")
    );

    let orch = Orchestrator::builder(cfg).build();
    server::serve(orch, args.bind, CancellationToken::new())
        .await
        .with_context(|| format!("server on {} failed", args.bind))?;

    info!("bye");
    Ok(())
}
