//! One-shot TCP client for the sync protocol.
//!
//! A [`SyncClient`] owns exactly one connection for its lifetime: open it,
//! issue requests one at a time, and let it drop (or call
//! [`SyncClient::close`]) to release the socket.  There is no pipelining
//! and no reconnecting; discovery probes and the pairing handshake each
//! use a fresh client.

use std::net::{IpAddr, SocketAddr};

use lansync_core::protocol::codec::{encode_request, parse_response, ProtocolError};
use lansync_core::protocol::message::{Method, Request, Response};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::debug;

use super::framing::{self, FramingError};

/// Errors that can occur in the client transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer address string was not a dotted-quad IP.
    #[error("invalid peer address {host:?}: {source}")]
    InvalidAddress {
        host: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// The TCP connection could not be opened.
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The client was used after [`SyncClient::close`].
    #[error("client connection already closed")]
    Closed,

    /// The stream ended before one full response was framed.
    #[error("stream ended mid-response")]
    UnexpectedEof,

    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer's response bytes did not parse.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The POST payload could not be serialized to JSON.
    #[error("failed to serialize request payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<FramingError> for TransportError {
    fn from(e: FramingError) -> Self {
        match e {
            FramingError::UnexpectedEof => TransportError::UnexpectedEof,
            FramingError::Io(source) => TransportError::Io(source),
        }
    }
}

/// A single-connection protocol client.
///
/// The socket is closed exactly once: either by [`SyncClient::close`] or
/// when the client drops.  Any use after `close` fails with
/// [`TransportError::Closed`].
pub struct SyncClient {
    stream: Option<BufStream<TcpStream>>,
    peer: SocketAddr,
}

impl SyncClient {
    /// Opens a connection to `host:port`, where `host` is a dotted-quad
    /// IP address.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidAddress`] for an unparsable host
    /// and [`TransportError::ConnectFailed`] when the connection cannot
    /// be opened.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let ip: IpAddr = host.parse().map_err(|source| TransportError::InvalidAddress {
            host: host.to_string(),
            source,
        })?;
        Self::connect_addr(SocketAddr::new(ip, port)).await
    }

    /// Opens a connection to an already-resolved address.
    pub async fn connect_addr(addr: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::ConnectFailed { addr, source })?;
        Ok(Self {
            stream: Some(BufStream::new(stream)),
            peer: addr,
        })
    }

    /// The address this client is connected to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends `GET <path>` and waits for the full response.
    pub async fn get(&mut self, path: &str) -> Result<Response, TransportError> {
        debug!("sending GET {path} to {}", self.peer);
        let request = Request::new(Method::Get, path);
        self.send(&request).await?;
        self.read_response().await
    }

    /// Sends `POST <path>` with `payload` serialized as the JSON body and
    /// waits for the full response.
    pub async fn post<T: Serialize>(
        &mut self,
        path: &str,
        payload: &T,
    ) -> Result<Response, TransportError> {
        let json = serde_json::to_string(payload)?;
        debug!("sending POST {path} to {} ({} bytes)", self.peer, json.len());
        let request = Request::with_json_body(Method::Post, path, json);
        self.send(&request).await?;
        self.read_response().await
    }

    /// Closes the connection.  Idempotent; later requests fail with
    /// [`TransportError::Closed`].
    pub fn close(&mut self) {
        self.stream = None;
    }

    async fn send(&mut self, request: &Request) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        stream.write_all(&encode_request(request)).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Response, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        let raw = framing::read_message(stream).await?;
        Ok(parse_response(&raw)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
