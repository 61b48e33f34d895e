//! The device identity exchanged during discovery and pairing.

use serde::{Deserialize, Serialize};

/// Placeholder address for a device whose location is not known.
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// One installation on the network, as presented to peers.
///
/// Serializes to the canonical JSON protocol payload
/// `{"id": ..., "name": ..., "ip": ...}`.  The `id` is an opaque stable
/// identifier (a UUID persisted on first run), `name` is the human-readable
/// host name, and `ip` is the dotted-quad address the device is reachable
/// at.  `ip` defaults to [`UNKNOWN_IP`]; a device decoded from a discovery
/// probe always carries the probed address instead.
///
/// A `Device` is an immutable value once constructed for a given message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(default = "default_ip")]
    pub ip: String,
}

fn default_ip() -> String {
    UNKNOWN_IP.to_string()
}

impl Device {
    /// Creates a device with an unknown address.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ip: default_ip(),
        }
    }

    /// Whether this device carries a usable address.
    pub fn has_address(&self) -> bool {
        !self.ip.is_empty() && self.ip != UNKNOWN_IP
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
