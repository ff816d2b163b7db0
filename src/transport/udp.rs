//! UDP transport for DNS queries.
//!
//! One task owns the socket and runs the receive loop. Every datagram is
//! handed to its own spawned task, so responses may go out in a different
//! order than the queries arrived.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::resolver::{QueryAction, Resolver};
use crate::stats::Stats;

use super::{ListenerConfig, MAX_MESSAGE_SIZE, ServerError};

/// A bound UDP listener that is not yet receiving.
pub struct UdpListener {
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
    stats: Arc<Stats>,
    limit: Option<Arc<Semaphore>>,
}

impl UdpListener {
    /// Bind the listening socket.
    ///
    /// Failing to bind is fatal and returned to the caller; there is no retry.
    pub async fn bind(
        config: &ListenerConfig,
        resolver: Arc<Resolver>,
        stats: Arc<Stats>,
    ) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        Ok(Self {
            socket: Arc::new(socket),
            resolver,
            stats,
            limit: config.max_in_flight.map(|n| Arc::new(Semaphore::new(n))),
        })
    }

    /// The address the socket is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    /// Start the receive loop on the current tokio runtime.
    pub fn start(self) -> Result<ListenerHandle, ServerError> {
        let local_addr = self.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(
            bind_address = %local_addr,
            max_message_size = MAX_MESSAGE_SIZE,
            max_in_flight = ?self.limit.as_ref().map(|s| s.available_permits()),
            "DNS server started"
        );

        let task = tokio::spawn(run(self, shutdown_rx));

        Ok(ListenerHandle {
            local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

/// Handle to a running listener.
///
/// Dropping the handle without calling [`ListenerHandle::stop`] also ends the
/// receive loop.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop receiving and wait for the receive loop to exit.
    ///
    /// Datagrams already dispatched keep running and may still send their
    /// responses.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            error!(error = %e, "UDP receive loop panicked");
        }
    }
}

/// Main receive loop.
///
/// Runs until the shutdown signal fires. Receive errors are logged and the
/// loop keeps going.
async fn run(listener: UdpListener, mut shutdown: oneshot::Receiver<()>) {
    let UdpListener {
        socket,
        resolver,
        stats,
        limit,
    } = listener;
    let mut buf = [0u8; MAX_MESSAGE_SIZE];

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("DNS server stopping");
                break;
            }
            result = socket.recv_from(&mut buf) => {
                let (len, src) = match result {
                    Ok(r) => r,
                    Err(e) => {
                        error!(error = %e, "Error reading from UDP");
                        continue;
                    }
                };
                stats.record_received();

                let permit = match &limit {
                    Some(semaphore) => match semaphore.clone().try_acquire_owned() {
                        Ok(permit) => Some(permit),
                        Err(_) => {
                            stats.record_dropped();
                            debug!(client_addr = %src, "In-flight limit reached, dropping query");
                            continue;
                        }
                    },
                    None => None,
                };

                let datagram = buf[..len].to_vec();
                let span = info_span!("query", client_addr = %src, query_size = len);
                let socket = socket.clone();
                let resolver = resolver.clone();
                let stats = stats.clone();

                tokio::spawn(
                    async move {
                        let _permit = permit;
                        handle_datagram(&socket, &resolver, &stats, &datagram, src).await;
                    }
                    .instrument(span),
                );
            }
        }
    }
}

/// Decode, answer and reply to one datagram.
///
/// Queries are read into a [`MAX_MESSAGE_SIZE`] buffer but responses are not
/// truncated to it: every question is echoed and may gain an answer, so a
/// small query carrying many compressed questions can draw a reply several
/// times its size. Such replies are still sent, logged at `warn` and counted
/// in [`Stats::oversized`].
async fn handle_datagram(
    socket: &UdpSocket,
    resolver: &Resolver,
    stats: &Stats,
    datagram: &[u8],
    src: SocketAddr,
) {
    let _in_flight = stats.enter();
    let start_time = Instant::now();

    debug!("Received DNS query");
    trace!(data_hex = %hex(datagram), "Raw DNS query");

    match resolver.process_query(datagram) {
        QueryAction::Drop { error } => {
            stats.record_malformed();
            warn!(error = %error, "Failed to parse DNS message");
        }
        QueryAction::Respond {
            response,
            domain,
            answer_count,
        } => {
            if response.len() > MAX_MESSAGE_SIZE {
                stats.record_oversized();
                warn!(
                    domain = %domain,
                    query_size = datagram.len(),
                    response_size = response.len(),
                    max_message_size = MAX_MESSAGE_SIZE,
                    "Response exceeds UDP message size"
                );
            }

            if let Err(e) = socket.send_to(&response, src).await {
                stats.record_send_error();
                error!(error = %e, "Failed to send DNS response");
                return;
            }

            let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
            stats.record_response(answer_count, elapsed_ms);
            info!(
                domain = %domain,
                response_size = response.len(),
                answer_count,
                elapsed_ms,
                "Query handled successfully"
            );
        }
    }
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{Message, Question, decode_response};
    use crate::records::RecordTable;
    use std::time::Duration;

    fn loopback_config(max_in_flight: Option<usize>) -> ListenerConfig {
        ListenerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_in_flight,
        }
    }

    async fn start(max_in_flight: Option<usize>) -> (ListenerHandle, Arc<Stats>) {
        let resolver = Arc::new(Resolver::new(Arc::new(RecordTable::seeded())));
        let stats = Arc::new(Stats::new());
        let listener = UdpListener::bind(&loopback_config(max_in_flight), resolver, stats.clone())
            .await
            .unwrap();
        (listener.start().unwrap(), stats)
    }

    async fn exchange(server: SocketAddr, query: &[u8]) -> Option<Vec<u8>> {
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(query, server).await.unwrap();

        let mut buf = vec![0u8; 65535];
        match tokio::time::timeout(Duration::from_millis(500), client.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
            _ => None,
        }
    }

    #[test]
    fn hex_formats_lowercase_pairs() {
        assert_eq!(hex(&[0x12, 0xab, 0x00]), "12ab00");
    }

    #[tokio::test]
    async fn answers_query() {
        let (handle, stats) = start(None).await;
        let query = Message::query(0x1234)
            .with_question(Question::a("test.com"))
            .unwrap();

        let response = exchange(handle.local_addr(), &query.to_bytes())
            .await
            .expect("no response");
        let response = decode_response(&response).unwrap();

        assert_eq!(response.id, 0x1234);
        assert_eq!(response.answers()[0].rdata(), &[10, 0, 0, 1]);
        assert_eq!(stats.received.load(std::sync::atomic::Ordering::Relaxed), 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn malformed_datagram_gets_no_reply() {
        let (handle, stats) = start(None).await;

        assert!(exchange(handle.local_addr(), &[0x12, 0x34, 0x01]).await.is_none());
        assert_eq!(stats.snapshot_and_reset().malformed, 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let (handle, _) = start(None).await;
        let taken = ListenerConfig {
            bind_addr: handle.local_addr(),
            max_in_flight: None,
        };
        let resolver = Arc::new(Resolver::new(Arc::new(RecordTable::new())));

        let result = UdpListener::bind(&taken, resolver, Arc::new(Stats::new())).await;

        assert!(matches!(result, Err(ServerError::Bind { .. })));
        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_receive_loop() {
        let (handle, _) = start(None).await;
        let addr = handle.local_addr();

        tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop did not complete");

        let query = Message::query(1)
            .with_question(Question::a("test.com"))
            .unwrap();
        assert!(exchange(addr, &query.to_bytes()).await.is_none());
    }

    #[tokio::test]
    async fn zero_limit_drops_everything() {
        let (handle, stats) = start(Some(0)).await;
        let query = Message::query(1)
            .with_question(Question::a("test.com"))
            .unwrap();

        assert!(exchange(handle.local_addr(), &query.to_bytes()).await.is_none());
        assert_eq!(stats.snapshot_and_reset().dropped, 1);

        handle.stop().await;
    }

    #[tokio::test]
    async fn oversized_response_is_counted() {
        let (handle, stats) = start(None).await;

        // 80 questions, all but the first a two-byte pointer back to test.com
        let count: u16 = 80;
        let mut query = vec![0x12, 0x34, 0x01, 0x00];
        query.extend_from_slice(&count.to_be_bytes());
        query.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        query.extend_from_slice(b"\x04test\x03com\x00\x00\x01\x00\x01");
        for _ in 1..count {
            query.extend_from_slice(&[0xC0, 0x0C, 0x00, 0x01, 0x00, 0x01]);
        }
        assert!(query.len() <= MAX_MESSAGE_SIZE);

        let response = exchange(handle.local_addr(), &query)
            .await
            .expect("no response");
        let decoded = decode_response(&response).unwrap();

        assert!(response.len() > MAX_MESSAGE_SIZE);
        assert_eq!(decoded.answers().len(), usize::from(count));
        assert_eq!(stats.snapshot_and_reset().oversized, 1);

        handle.stop().await;
    }
}
