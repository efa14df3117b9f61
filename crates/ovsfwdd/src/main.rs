//! ovsfwdd - OVS forwarder daemon.
//!
//! Boots the bridges and composes the forwarder endpoint. The RPC
//! transport and registry integration attach through the library's
//! `Downstream` trait and request/close entry points.

use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use ovsfwd_common::{FwdError, FwdResult, ShellRunner};
use ovsfwdd::chain::Ctx;
use ovsfwdd::config::{self, Config};
use ovsfwdd::elements::connect::Downstream;
use ovsfwdd::model::{Connection, Request};
use ovsfwdd::Forwarder;

/// OVS dataplane forwarder
#[derive(Parser, Debug)]
#[command(name = "ovsfwdd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Forwarder name (defaults to forwarder-ovs-<uuid>)
    #[arg(long)]
    name: Option<String>,

    /// Name of the main bridge
    #[arg(long, default_value = config::DEFAULT_BRIDGE_NAME)]
    bridge_name: String,

    /// URL of the local connection manager socket
    #[arg(long, default_value = config::DEFAULT_CLIENT_URL)]
    client_url: String,

    /// Timeout for dialing the next hop, in milliseconds
    #[arg(long, default_value = "200")]
    dial_timeout_ms: u64,

    /// Host IP, or CIDR network address, selecting the tunnel endpoint
    #[arg(long)]
    tunnel_ip: IpAddr,

    /// Non-default VXLAN destination port
    #[arg(long)]
    vxlan_port: Option<u16>,

    /// YAML file with the L2 egress table (selector -> interface/bridge)
    #[arg(long)]
    l2_connections_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: Level,
}

/// Placeholder downstream until the transport is attached.
struct UnconnectedDownstream;

#[async_trait]
impl Downstream for UnconnectedDownstream {
    async fn request(&self, _ctx: &Ctx, _request: &Request) -> FwdResult<Connection> {
        Err(FwdError::internal("no downstream transport attached"))
    }

    async fn close(&self, _ctx: &Ctx, _conn: &Connection) -> FwdResult<()> {
        Err(FwdError::internal("no downstream transport attached"))
    }
}

fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    info!("--- Starting ovsfwdd ---");

    let mut cfg = Config::new(args.tunnel_ip);
    if let Some(name) = args.name {
        cfg.name = name;
    }
    cfg.bridge_name = args.bridge_name;
    cfg.client_url = args.client_url;
    cfg.dial_timeout = Duration::from_millis(args.dial_timeout_ms);
    cfg.vxlan_port = args.vxlan_port;

    if let Some(path) = args.l2_connections_file {
        let yaml = match std::fs::read_to_string(&path) {
            Ok(yaml) => yaml,
            Err(e) => {
                error!(path = %path, error = %e, "cannot read L2 connections file");
                return ExitCode::FAILURE;
            }
        };
        cfg.l2_connections = match config::parse_l2_connections(&yaml) {
            Ok(table) => table,
            Err(e) => {
                error!(path = %path, error = %e, "cannot parse L2 connections file");
                return ExitCode::FAILURE;
            }
        };
    }

    let forwarder = match Forwarder::new_kernel_server(
        cfg,
        Arc::new(ShellRunner),
        Arc::new(UnconnectedDownstream),
    )
    .await
    {
        Ok(forwarder) => forwarder,
        Err(e) => {
            error!(error = %e, "forwarder initialization failed");
            return ExitCode::FAILURE;
        }
    };

    info!(name = forwarder.name(), "forwarder ready");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to wait for shutdown signal");
        return ExitCode::FAILURE;
    }
    info!(
        active_connections = forwarder.active_connections(),
        "shutting down"
    );
    ExitCode::SUCCESS
}
