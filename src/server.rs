//! DNS server orchestration.
//!
//! Binds the transport and runs the server together with its periodic
//! statistics report.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::records::RecordTable;
use crate::resolver::Resolver;
use crate::stats::Stats;
use crate::transport::{ListenerConfig, ListenerHandle, ServerError, UdpListener};

/// Configuration for the DNS server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listener: ListenerConfig,
    /// How often to log statistics. `None` disables the report.
    pub stats_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            stats_interval: Some(Duration::from_secs(60)),
        }
    }
}

/// Handle to a running server.
pub struct ServerHandle {
    listener: ListenerHandle,
    stats_task: Option<JoinHandle<()>>,
    stats: Arc<Stats>,
    table: Arc<RecordTable>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// The live record table; changes apply to the next query.
    pub fn table(&self) -> &Arc<RecordTable> {
        &self.table
    }

    /// Stop receiving queries and the statistics report.
    pub async fn stop(self) {
        if let Some(task) = self.stats_task {
            task.abort();
        }
        self.listener.stop().await;
        info!("DNS server stopped");
    }
}

/// Start the DNS server with the given configuration.
///
/// Binds the UDP socket on `config.listener.bind_addr` and answers queries
/// from `table` until the returned handle is stopped.
pub async fn run(config: ServerConfig, table: Arc<RecordTable>) -> Result<ServerHandle, ServerError> {
    let resolver = Arc::new(Resolver::new(table.clone()));
    let stats = Arc::new(Stats::new());

    let listener = UdpListener::bind(&config.listener, resolver, stats.clone()).await?;
    info!(
        bind_address = %listener.local_addr()?,
        records = table.len(),
        "Serving DNS records"
    );
    let listener = listener.start()?;

    let stats_task = config
        .stats_interval
        .map(|period| tokio::spawn(report_stats(stats.clone(), table.clone(), period)));

    Ok(ServerHandle {
        listener,
        stats_task,
        stats,
        table,
    })
}

async fn report_stats(stats: Arc<Stats>, table: Arc<RecordTable>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // Skip first immediate tick
    loop {
        interval.tick().await;
        let snapshot = stats.snapshot_and_reset();
        info!(
            uptime_secs = snapshot.uptime_secs,
            records = table.len(),
            received = snapshot.received,
            answered = snapshot.answered,
            nxdomain = snapshot.nxdomain,
            malformed = snapshot.malformed,
            dropped = snapshot.dropped,
            send_errors = snapshot.send_errors,
            oversized = snapshot.oversized,
            in_flight = snapshot.in_flight,
            peak_in_flight = snapshot.peak_in_flight,
            avg_response_ms = snapshot.avg_response_ms,
            "stats"
        );
    }
}
