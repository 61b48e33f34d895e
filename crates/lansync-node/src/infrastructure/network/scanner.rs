//! Bounded-concurrency subnet discovery.
//!
//! Enumerates the /24 around the local IPv4 address and probes every
//! candidate with `GET /` on the sync port.  Probes run as independent
//! tasks behind a counting semaphore, so no more than [`MAX_IN_FLIGHT`]
//! connection attempts are outstanding at once regardless of subnet size
//! (this bounds file descriptors and ephemeral ports).  Discovered peers
//! stream out of an `mpsc` channel as soon as they answer, out of numeric
//! order; failed probes are dropped silently and never abort the scan.
//!
//! Each [`DiscoveryScanner::scan`] call is an independent scan.  Dropping
//! the receiver abandons it: in-flight probes run to completion and their
//! results are discarded.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use lansync_core::Device;
use tokio::sync::{mpsc, Semaphore};
use tokio::time;
use tracing::{debug, info, warn};

use super::client::SyncClient;
use super::SYNC_PORT;
use crate::infrastructure::identity;

/// Cap on simultaneously in-flight probes.
pub const MAX_IN_FLIGHT: usize = 50;

/// Default per-probe budget covering connect plus request/response.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const CHANNEL_CAPACITY: usize = 64;

/// Configuration for one scanner instance.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// TCP port probed on every candidate address.
    pub port: u16,
    /// Budget per probe; a probe exceeding it is discarded.
    pub probe_timeout: Duration,
    /// Local address override; `None` auto-detects the primary interface.
    pub local_addr: Option<Ipv4Addr>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            port: SYNC_PORT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            local_addr: None,
        }
    }
}

/// Probes the local subnet for live peers.
pub struct DiscoveryScanner {
    config: ScannerConfig,
}

impl DiscoveryScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Starts one scan of the local /24 and returns the result stream.
    ///
    /// Returns immediately; probes run in the background.  When the local
    /// address cannot be determined the stream ends without emitting
    /// anything (a warning is logged), which callers cannot distinguish
    /// from an empty subnet.  That is the intended degraded mode.
    pub fn scan(&self) -> mpsc::Receiver<Device> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let Some(local) = self.config.local_addr.or_else(identity::primary_ipv4) else {
            warn!("could not determine local IPv4 address; scan yields no peers");
            return rx; // sender dropped here, stream ends immediately
        };

        let port = self.config.port;
        let targets: Vec<SocketAddr> = candidate_addresses(local)
            .into_iter()
            .map(|ip| SocketAddr::new(IpAddr::V4(ip), port))
            .collect();

        info!(
            "scanning {} candidate addresses around {local} on port {port}",
            targets.len()
        );
        tokio::spawn(run_probes(targets, self.config.probe_timeout, tx));
        rx
    }
}

/// All probe candidates on `local`'s /24: `prefix.1 ..= prefix.254`,
/// excluding `local` itself.
pub fn candidate_addresses(local: Ipv4Addr) -> Vec<Ipv4Addr> {
    let [a, b, c, d] = local.octets();
    (1..=254u8)
        .filter(|i| *i != d)
        .map(|i| Ipv4Addr::new(a, b, c, i))
        .collect()
}

/// Drives all probes behind the admission gate.
async fn run_probes(targets: Vec<SocketAddr>, timeout: Duration, tx: mpsc::Sender<Device>) {
    let gate = Arc::new(Semaphore::new(MAX_IN_FLIGHT));

    for addr in targets {
        if tx.is_closed() {
            debug!("scan consumer went away, stopping probe fan-out");
            break;
        }
        // Suspends here once MAX_IN_FLIGHT probes are outstanding.
        let permit = match Arc::clone(&gate).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break, // gate closed, nothing left to do
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            let _permit = permit; // held for the probe's full lifetime
            if let Some(device) = probe(addr, timeout).await {
                debug!("discovered peer {} ({}) at {}", device.name, device.id, addr.ip());
                let _ = tx.send(device).await;
            }
        });
    }
}

/// One discovery attempt against a single candidate address.
///
/// Every failure mode (connect refused, timeout, non-2xx status,
/// missing or undecodable body) collapses to `None`.
async fn probe(addr: SocketAddr, timeout: Duration) -> Option<Device> {
    let attempt = async {
        let mut client = SyncClient::connect_addr(addr).await.ok()?;
        let response = client.get("/").await.ok()?;
        if !response.is_success() {
            return None;
        }
        let body = response.body?;
        let mut device: Device = serde_json::from_str(&body).ok()?;
        // a discovered peer is addressed by the address that answered,
        // never by whatever it believes its own address to be
        device.ip = addr.ip().to_string();
        Some(device)
    };

    match time::timeout(timeout, attempt).await {
        Ok(found) => found,
        Err(_) => {
            debug!("probe of {addr} timed out");
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_candidate_addresses_cover_the_subnet_minus_local() {
        let candidates = candidate_addresses("192.168.1.42".parse().unwrap());
        assert_eq!(candidates.len(), 253);
        assert!(!candidates.contains(&"192.168.1.42".parse().unwrap()));
        assert!(candidates.contains(&"192.168.1.1".parse().unwrap()));
        assert!(candidates.contains(&"192.168.1.254".parse().unwrap()));
    }

    #[test]
    fn test_candidate_addresses_share_the_local_prefix() {
        let candidates = candidate_addresses("10.1.2.3".parse().unwrap());
        assert!(candidates
            .iter()
            .all(|ip| ip.octets()[..3] == [10, 1, 2]));
    }

    #[test]
    fn test_candidate_addresses_exclude_network_and_broadcast() {
        let candidates = candidate_addresses("172.16.0.9".parse().unwrap());
        assert!(!candidates.contains(&"172.16.0.0".parse().unwrap()));
        assert!(!candidates.contains(&"172.16.0.255".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_probe_decodes_peer_and_overwrites_ip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let body = r#"{"id":"peer-1","name":"den-pc","ip":"0.0.0.0"}"#;
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
        });

        let device = probe(addr, Duration::from_secs(1)).await.expect("probe");
        assert_eq!(device.id, "peer-1");
        assert_eq!(device.ip, "127.0.0.1");
    }

    #[tokio::test]
    async fn test_probe_discards_non_2xx_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
        });

        assert!(probe(addr, Duration::from_secs(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_probe_discards_undecodable_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 8\r\n\r\nnot json")
                .await
                .unwrap();
        });

        assert!(probe(addr, Duration::from_secs(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_probe_discards_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        assert!(probe(addr, Duration::from_secs(1)).await.is_none());
    }

    /// Drives a full 254-target fan-out against a local listener that
    /// tracks its peak number of simultaneously open connections.  The
    /// admission gate must keep that peak at or below [`MAX_IN_FLIGHT`].
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fan_out_never_exceeds_in_flight_cap() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let open = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));

        {
            let open = Arc::clone(&open);
            let peak = Arc::clone(&peak);
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let now = open.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    let open = Arc::clone(&open);
                    tokio::spawn(async move {
                        // Hold the connection open long enough that probes
                        // pile up against the gate, then close without
                        // answering (the probe fails silently).
                        time::sleep(Duration::from_millis(30)).await;
                        open.fetch_sub(1, Ordering::SeqCst);
                        drop(socket);
                    });
                }
            });
        }

        let targets: Vec<SocketAddr> = std::iter::repeat(addr).take(254).collect();
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run_probes(targets, Duration::from_secs(5), tx));

        // Drain until the channel closes, i.e. every probe finished.
        while rx.recv().await.is_some() {}

        assert_eq!(accepted.load(Ordering::SeqCst), 254);
        assert!(
            peak.load(Ordering::SeqCst) <= MAX_IN_FLIGHT,
            "peak concurrent probes {} exceeded the cap",
            peak.load(Ordering::SeqCst)
        );
    }

    /// A scan of a dead subnet must terminate: every probe fails fast
    /// and the stream closes without yielding anything.  Loopback gives
    /// us 253 instantly-refused targets.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scan_of_dead_subnet_ends_with_empty_stream() {
        let scanner = DiscoveryScanner::new(ScannerConfig {
            port: 1, // privileged port, nothing listens there
            probe_timeout: Duration::from_millis(500),
            local_addr: Some("127.0.0.1".parse().unwrap()),
        });
        let mut rx = scanner.scan();
        assert!(rx.recv().await.is_none());
    }
}
