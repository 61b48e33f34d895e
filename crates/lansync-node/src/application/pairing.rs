//! The pairing handshake.
//!
//! Pairing with a discovered peer is a two-step exchange: this node POSTs
//! its own identity to the peer's `/track-device` route, and only after
//! the peer has accepted (2xx with its identity as the body) is the peer
//! added to the local registry.  The commit is deliberately asymmetric:
//! when the local registration fails after the remote accepted, the
//! remote keeps its entry and no rollback is attempted.  The peer will
//! simply hold a tracked device that never calls back.
//!
//! Removal is local only; the remote side is never told.

use std::sync::Arc;

use lansync_core::Device;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::infrastructure::identity::IdentityProvider;
use crate::infrastructure::network::client::{SyncClient, TransportError};
use crate::infrastructure::network::SYNC_PORT;
use crate::infrastructure::storage::registry::DeviceRegistry;

/// Errors that can occur during the pairing handshake.
#[derive(Debug, Error)]
pub enum PairingError {
    /// The target device has no usable address to dial.
    #[error("target device has no address")]
    MissingAddress,

    /// This node has no identity to present to the peer.
    #[error("local identity unavailable")]
    LocalIdentityUnavailable,

    /// The connection or exchange with the peer failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The peer answered but did not accept the handshake.
    #[error("peer rejected the handshake with status {status}")]
    RemoteRejected { status: u16 },

    /// The peer accepted but the local registry did not record it.
    #[error("device accepted remotely but could not be registered locally")]
    LocalRegistrationFailed,

    /// The device was not tracked or its removal could not be persisted.
    #[error("device could not be removed from the local registry")]
    LocalRemovalFailed,
}

/// Runs the pairing handshake against discovered peers.
pub struct DeviceTracker {
    identity: Arc<dyn IdentityProvider>,
    registry: Arc<dyn DeviceRegistry>,
    port: u16,
}

impl DeviceTracker {
    pub fn new(identity: Arc<dyn IdentityProvider>, registry: Arc<dyn DeviceRegistry>) -> Self {
        Self {
            identity,
            registry,
            port: SYNC_PORT,
        }
    }

    /// Overrides the port dialed on the target device.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Pairs with `target` and returns the tracked device.
    ///
    /// The peer registers this node first; only after a 2xx answer with a
    /// body is `target` added to the local registry.
    ///
    /// # Errors
    ///
    /// See [`PairingError`].  A [`PairingError::LocalRegistrationFailed`]
    /// leaves the remote side tracking this node; there is no rollback.
    pub async fn track_new_device(&self, target: &Device) -> Result<Device, PairingError> {
        if !target.has_address() {
            debug!("refusing to pair with {}: no address", target.id);
            return Err(PairingError::MissingAddress);
        }
        let local = self
            .identity
            .resolve()
            .ok_or(PairingError::LocalIdentityUnavailable)?;

        let mut client = SyncClient::connect(&target.ip, self.port).await?;
        let response = client.post("/track-device", &local).await?;
        client.close();

        // A success without a body means the peer did not complete its
        // side of the handshake; treat it as a rejection.
        if !response.is_success() || response.body.is_none() {
            debug!(
                "peer {} rejected the handshake with status {}",
                target.ip, response.status_code
            );
            return Err(PairingError::RemoteRejected {
                status: response.status_code,
            });
        }

        let tracked = target.clone();
        if !self.registry.add(tracked.clone()) {
            warn!(
                "peer {} accepted the handshake but local registration of {} failed",
                target.ip, tracked.id
            );
            return Err(PairingError::LocalRegistrationFailed);
        }

        info!("paired with {} ({}) at {}", tracked.name, tracked.id, tracked.ip);
        Ok(tracked)
    }

    /// Removes `device` from the local registry.  The remote side keeps
    /// its entry for this node.
    pub fn remove_tracked_device(&self, device: &Device) -> Result<(), PairingError> {
        if self.registry.remove(device) {
            info!("stopped tracking device {} ({})", device.name, device.id);
            Ok(())
        } else {
            Err(PairingError::LocalRemovalFailed)
        }
    }

    /// The devices currently tracked.
    pub fn tracked_devices(&self) -> Vec<Device> {
        self.registry.get()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
