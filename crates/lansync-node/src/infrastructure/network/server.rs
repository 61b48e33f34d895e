//! The sync server every node runs.
//!
//! Listens on the sync port and answers two routes:
//!
//! * `GET /` returns this node's identity as JSON.  Discovery probes hit
//!   this route.
//! * `POST /track-device` accepts a peer's identity as the JSON body,
//!   registers it, and echoes this node's identity back.  The pairing
//!   handshake hits this route.
//!
//! Each connection carries exactly one request; the socket is closed once
//! the response is flushed.  Malformed input is answered with `400`, an
//! unknown route with `404`, and a local failure (no identity, registry
//! rejection) with `500`.  A failure on one connection never takes the
//! accept loop down.

use std::net::SocketAddr;
use std::sync::Arc;

use lansync_core::protocol::codec::{encode_response, parse_request};
use lansync_core::protocol::message::{Method, Request, Response, Status};
use lansync_core::Device;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::framing;
use super::SYNC_PORT;
use crate::infrastructure::identity::IdentityProvider;
use crate::infrastructure::storage::registry::DeviceRegistry;

/// Errors that can occur while bringing the server up.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind sync server on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port bound on all interfaces.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: SYNC_PORT }
    }
}

/// The node-to-node sync server.
pub struct SyncServer {
    config: ServerConfig,
    identity: Arc<dyn IdentityProvider>,
    registry: Arc<dyn DeviceRegistry>,
}

impl SyncServer {
    pub fn new(
        config: ServerConfig,
        identity: Arc<dyn IdentityProvider>,
        registry: Arc<dyn DeviceRegistry>,
    ) -> Self {
        Self {
            config,
            identity,
            registry,
        }
    }

    /// Binds `0.0.0.0:<port>` and serves until the accept loop stops.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::BindFailed`] when the port cannot be bound,
    /// typically because another instance holds it.
    pub async fn start(&self) -> Result<(), ServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::BindFailed { addr, source })?;
        self.serve(listener).await;
        Ok(())
    }

    /// Serves connections from an already-bound listener.
    ///
    /// Split out from [`SyncServer::start`] so callers (and tests) can
    /// bind port 0 themselves.
    pub async fn serve(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!("sync server listening on {addr}");
        }
        loop {
            let (socket, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept failed, stopping sync server: {e}");
                    break;
                }
            };
            debug!("connection from {peer}");
            let identity = Arc::clone(&self.identity);
            let registry = Arc::clone(&self.registry);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(socket, peer, identity, registry).await {
                    debug!("connection from {peer} ended with error: {e}");
                }
            });
        }
    }
}

/// Reads one request, routes it, writes one response, closes.
async fn handle_connection(
    socket: TcpStream,
    peer: SocketAddr,
    identity: Arc<dyn IdentityProvider>,
    registry: Arc<dyn DeviceRegistry>,
) -> std::io::Result<()> {
    let mut stream = BufStream::new(socket);

    let response = match framing::read_message(&mut stream).await {
        Ok(raw) => match parse_request(&raw) {
            Ok(request) => route(&request, peer, &identity, &registry),
            Err(e) => {
                debug!("unparsable request from {peer}: {e}");
                status_response(Status::BAD_REQUEST)
            }
        },
        Err(e) => {
            debug!("could not frame request from {peer}: {e}");
            status_response(Status::BAD_REQUEST)
        }
    };

    stream.write_all(&encode_response(&response)).await?;
    stream.flush().await?;
    Ok(())
}

fn route(
    request: &Request,
    peer: SocketAddr,
    identity: &Arc<dyn IdentityProvider>,
    registry: &Arc<dyn DeviceRegistry>,
) -> Response {
    match (request.method, request.path.as_str()) {
        (Method::Get, "/") => identity_response(identity),
        (Method::Post, "/track-device") => track_device(request, peer, identity, registry),
        _ => {
            debug!("no route for {} {}", request.method, request.path);
            status_response(Status::NOT_FOUND)
        }
    }
}

fn identity_response(identity: &Arc<dyn IdentityProvider>) -> Response {
    match identity.resolve() {
        Some(device) => json_response(Status::OK, &device),
        None => {
            warn!("local identity unavailable, cannot answer identity request");
            status_response(Status::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Registers the peer carried in the body and answers with this node's
/// own identity so both sides finish the handshake knowing each other.
fn track_device(
    request: &Request,
    peer: SocketAddr,
    identity: &Arc<dyn IdentityProvider>,
    registry: &Arc<dyn DeviceRegistry>,
) -> Response {
    let Some(body) = request.body.as_deref() else {
        debug!("track-device from {peer} carried no body");
        return status_response(Status::BAD_REQUEST);
    };
    let mut device: Device = match serde_json::from_str(body) {
        Ok(device) => device,
        Err(e) => {
            debug!("track-device from {peer} carried undecodable body: {e}");
            return status_response(Status::BAD_REQUEST);
        }
    };
    // The peer is reachable at the address it connected from, which is
    // more trustworthy than whatever its payload claims.
    device.ip = peer.ip().to_string();

    let Some(local) = identity.resolve() else {
        warn!("local identity unavailable, rejecting track-device from {peer}");
        return status_response(Status::INTERNAL_SERVER_ERROR);
    };

    if !registry.add(device.clone()) {
        warn!(
            "could not register device {} ({}) from {peer}",
            device.name, device.id
        );
        return status_response(Status::INTERNAL_SERVER_ERROR);
    }

    info!("now tracking device {} ({}) at {}", device.name, device.id, device.ip);
    json_response(Status::OK, &local)
}

fn json_response(status: Status, device: &Device) -> Response {
    match serde_json::to_string(device) {
        Ok(json) => Response::with_json(status, json),
        Err(e) => {
            warn!("failed to serialize device payload: {e}");
            status_response(Status::INTERNAL_SERVER_ERROR)
        }
    }
}

/// A bodyful failure response carrying the reason phrase as plain text.
fn status_response(status: Status) -> Response {
    Response::with_text(status, status.reason)
}
