//! Integration tests for the sync server, driven over real TCP sockets
//! with raw protocol bytes so the full framing and codec path is
//! exercised.

use std::sync::Arc;

use lansync_core::Device;
use lansync_node::infrastructure::identity::IdentityProvider;
use lansync_node::infrastructure::network::server::{ServerConfig, ServerError, SyncServer};
use lansync_node::infrastructure::storage::registry::{DeviceRegistry, InMemoryDeviceRegistry};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct FixtureIdentity(Option<Device>);

impl IdentityProvider for FixtureIdentity {
    fn resolve(&self) -> Option<Device> {
        self.0.clone()
    }
}

/// Registry that refuses every mutation, simulating a persist failure.
struct RejectingRegistry;

impl DeviceRegistry for RejectingRegistry {
    fn get(&self) -> Vec<Device> {
        Vec::new()
    }
    fn add(&self, _device: Device) -> bool {
        false
    }
    fn remove(&self, _device: &Device) -> bool {
        false
    }
}

fn local_device() -> Device {
    Device {
        id: "node-under-test".to_string(),
        name: "test-host".to_string(),
        ip: "192.168.1.5".to_string(),
    }
}

async fn spawn_server(
    identity: Arc<dyn IdentityProvider>,
    registry: Arc<dyn DeviceRegistry>,
) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = SyncServer::new(ServerConfig { port: 0 }, identity, registry);
    tokio::spawn(async move { server.serve(listener).await });
    addr
}

/// Writes raw request bytes and reads the complete response as text.
async fn exchange(addr: std::net::SocketAddr, request: &[u8]) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(request).await.unwrap();
    let mut response = Vec::new();
    socket.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

#[tokio::test]
async fn test_get_root_returns_identity_json() {
    let addr = spawn_server(
        Arc::new(FixtureIdentity(Some(local_device()))),
        Arc::new(InMemoryDeviceRegistry::new()),
    )
    .await;

    let response = exchange(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    let body = response.split("\r\n\r\n").nth(1).unwrap();
    let device: Device = serde_json::from_str(body).unwrap();
    assert_eq!(device, local_device());
}

#[tokio::test]
async fn test_get_root_without_identity_is_a_server_error() {
    let addr = spawn_server(
        Arc::new(FixtureIdentity(None)),
        Arc::new(InMemoryDeviceRegistry::new()),
    )
    .await;

    let response = exchange(addr, b"GET / HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let addr = spawn_server(
        Arc::new(FixtureIdentity(Some(local_device()))),
        Arc::new(InMemoryDeviceRegistry::new()),
    )
    .await;

    let response = exchange(addr, b"DELETE /devices HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
}

#[tokio::test]
async fn test_track_device_registers_peer_and_echoes_identity() {
    let registry = Arc::new(InMemoryDeviceRegistry::new());
    let addr = spawn_server(
        Arc::new(FixtureIdentity(Some(local_device()))),
        registry.clone(),
    )
    .await;

    let body = r#"{"id":"peer-7","name":"den-pc","ip":"10.0.0.99"}"#;
    let request = format!(
        "POST /track-device HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = exchange(addr, request.as_bytes()).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));

    let echoed: Device = serde_json::from_str(response.split("\r\n\r\n").nth(1).unwrap()).unwrap();
    assert_eq!(echoed, local_device());

    // The registered address is the socket's, not the payload's claim.
    let tracked = registry.get();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].id, "peer-7");
    assert_eq!(tracked[0].ip, "127.0.0.1");
}

#[tokio::test]
async fn test_track_device_without_body_is_a_bad_request() {
    let registry = Arc::new(InMemoryDeviceRegistry::new());
    let addr = spawn_server(
        Arc::new(FixtureIdentity(Some(local_device()))),
        registry.clone(),
    )
    .await;

    let response = exchange(addr, b"POST /track-device HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(registry.get().is_empty());
}

#[tokio::test]
async fn test_track_device_with_undecodable_body_is_a_bad_request() {
    let addr = spawn_server(
        Arc::new(FixtureIdentity(Some(local_device()))),
        Arc::new(InMemoryDeviceRegistry::new()),
    )
    .await;

    let request = b"POST /track-device HTTP/1.1\r\nContent-Length: 8\r\n\r\nnot json";
    let response = exchange(addr, request).await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_track_device_with_rejecting_registry_is_a_server_error() {
    let addr = spawn_server(
        Arc::new(FixtureIdentity(Some(local_device()))),
        Arc::new(RejectingRegistry),
    )
    .await;

    let body = r#"{"id":"peer-7","name":"den-pc","ip":"10.0.0.99"}"#;
    let request = format!(
        "POST /track-device HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = exchange(addr, request.as_bytes()).await;
    assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
}

#[tokio::test]
async fn test_malformed_start_line_is_a_bad_request() {
    let addr = spawn_server(
        Arc::new(FixtureIdentity(Some(local_device()))),
        Arc::new(InMemoryDeviceRegistry::new()),
    )
    .await;

    let response = exchange(addr, b"COMPLETE NONSENSE\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[tokio::test]
async fn test_start_on_occupied_port_fails_with_bind_error() {
    // Hold the port so start() cannot bind it.
    let holder = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let port = holder.local_addr().unwrap().port();

    let server = SyncServer::new(
        ServerConfig { port },
        Arc::new(FixtureIdentity(Some(local_device()))),
        Arc::new(InMemoryDeviceRegistry::new()),
    );
    let result = server.start().await;
    assert!(matches!(result, Err(ServerError::BindFailed { .. })));
}
