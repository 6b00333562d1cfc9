//! Chassis inventory tool.
//!
//! Connects to a simulated lab chassis, discovers its cards and ports and
//! prints an inventory as tables or JSON.

mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ixe_sim::{topologies, SimulatedDevice, Topology};
use ixe_topology::{Chassis, ClientConfig};
use tracing::{error, info, warn};

use crate::report::InventoryReport;

/// Discover the cards and ports of a test chassis
#[derive(Parser, Debug)]
#[command(name = "ixe-discover")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Client configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Lab topology served by the simulated chassis (TOML); a built-in
    /// three-slot lab is used when omitted
    #[arg(short = 't', long)]
    topology: Option<PathBuf>,

    /// Chassis host name, defaults to the topology's host
    #[arg(long)]
    host: Option<String>,

    /// Login name used for port ownership
    #[arg(short = 'o', long)]
    owner: Option<String>,

    /// Maximum discovery requests in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the inventory as JSON
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "warn")]
    log_level: String,
}

/// Logs go to stderr so stdout carries only the inventory.
fn init_logging(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Configuration file (or defaults) with command-line overrides applied.
fn client_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClientConfig::default(),
    };

    if let Some(owner) = &args.owner {
        config.session.owner = Some(owner.clone());
    }
    if let Some(concurrency) = args.concurrency {
        config.discovery.max_concurrent_probes = concurrency;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn lab_topology(args: &Args) -> anyhow::Result<Topology> {
    match &args.topology {
        Some(path) => Topology::from_toml_file(path)
            .with_context(|| format!("Failed to load topology {}", path.display())),
        None => Ok(topologies::sparse_three_slot()),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = client_config(&args)?;
    let topology = lab_topology(&args)?;
    let host = args.host.clone().unwrap_or_else(|| topology.host.clone());

    info!(
        host = %host,
        chassis_id = config.session.chassis_id,
        concurrency = config.discovery.max_concurrent_probes,
        "Starting discovery"
    );

    let device = Arc::new(SimulatedDevice::new(topology).concurrent(true));
    let mut chassis = Chassis::connect(device, &host, config.session_params())
        .await
        .with_context(|| format!("Failed to connect to {}", host))?;

    let inventory = async {
        chassis.discover().await?;
        InventoryReport::collect(&chassis).await
    }
    .await;

    // Disconnect regardless of the discovery outcome.
    let closed = chassis.disconnect().await;
    let report = inventory.with_context(|| format!("Discovery of {} failed", host))?;
    if let Err(e) = closed {
        warn!(error = %e, "Disconnect from {} failed", host);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("ixe-discover: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["ixe-discover"]).unwrap();
        assert!(args.config.is_none());
        assert!(args.topology.is_none());
        assert!(!args.json);
        assert_eq!(args.log_level, "warn");
    }

    #[test]
    fn test_cli_overrides_config_defaults() {
        let args = Args::try_parse_from([
            "ixe-discover",
            "--owner",
            "alice",
            "--concurrency",
            "4",
            "--json",
        ])
        .unwrap();
        let config = client_config(&args).unwrap();
        assert_eq!(config.session.owner.as_deref(), Some("alice"));
        assert_eq!(config.discovery.max_concurrent_probes, 4);
        assert_eq!(config.session.chassis_id, 1);
        assert!(args.json);
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let args = Args::try_parse_from(["ixe-discover", "--concurrency", "0"]).unwrap();
        assert!(client_config(&args).is_err());
    }

    #[test]
    fn test_builtin_topology_host() {
        let args = Args::try_parse_from(["ixe-discover"]).unwrap();
        assert_eq!(lab_topology(&args).unwrap().host, "sparse-lab");
    }
}
