use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use waypoint::records::RecordTable;
use waypoint::server::{self, ServerConfig};
use waypoint::transport::{DEFAULT_PORT, ListenerConfig};

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Minimal authoritative DNS server", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Extra A record to serve (repeatable)
    #[arg(short, long = "record", value_name = "NAME=IPV4", value_parser = parse_record)]
    records: Vec<(String, Ipv4Addr)>,

    /// Start with an empty record table instead of the built-in records
    #[arg(long)]
    no_seed: bool,

    /// Maximum queries handled at once (unbounded when unset)
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Seconds between statistics reports (0 disables)
    #[arg(long, default_value_t = 60)]
    stats_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn parse_record(s: &str) -> Result<(String, Ipv4Addr), String> {
    let (name, addr) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=IPV4, got `{s}`"))?;
    if name.is_empty() {
        return Err("record name must not be empty".to_string());
    }
    let addr = addr
        .parse()
        .map_err(|e| format!("invalid IPv4 address `{addr}`: {e}"))?;
    Ok((name.to_string(), addr))
}

fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    let table = if args.no_seed {
        RecordTable::new()
    } else {
        RecordTable::seeded()
    };
    for (name, addr) in &args.records {
        table.add_address(name, *addr);
    }

    let config = ServerConfig {
        listener: ListenerConfig {
            bind_addr: SocketAddr::new(args.bind, args.port),
            max_in_flight: args.max_in_flight,
        },
        stats_interval: (args.stats_interval > 0).then(|| Duration::from_secs(args.stats_interval)),
    };

    let handle = server::run(config, Arc::new(table)).await?;

    shutdown_signal().await?;
    info!("Shutting down DNS server...");
    handle.stop().await;

    Ok(())
}
