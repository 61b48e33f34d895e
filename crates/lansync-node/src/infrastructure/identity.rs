//! Local device identity: stable id, host name, best-effort IPv4.
//!
//! The id is a random UUID written to a `device_id` file on first run and
//! reused forever after, so peers can recognize this installation across
//! restarts and address changes.  The name comes from the hostname.  The
//! IP is re-resolved on every [`IdentityProvider::resolve`] call because
//! interfaces come and go; [`lansync_core::device::UNKNOWN_IP`] stands in
//! when no interface qualifies.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use gethostname::gethostname;
use lansync_core::device::UNKNOWN_IP;
use lansync_core::Device;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors that can occur while loading the persisted identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing identity file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves the device this process presents to peers.
///
/// `None` means no local identity is available, which aborts any
/// operation that would advertise it.  Production code uses
/// [`LocalIdentity`]; tests substitute fixtures.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self) -> Option<Device>;
}

/// Identity backed by a persisted `device_id` file under the data
/// directory.
pub struct LocalIdentity {
    device_id: String,
    name: String,
}

impl LocalIdentity {
    /// Loads the device id from `data_dir`, creating one on first run.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Io`] when the id file can neither be read
    /// nor created.
    pub fn load_or_create(data_dir: &Path) -> Result<Self, IdentityError> {
        let path = data_dir.join("device_id");
        let device_id = match std::fs::read_to_string(&path) {
            Ok(id) if !id.trim().is_empty() => id.trim().to_string(),
            Ok(_) => create_id(&path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => create_id(&path)?,
            Err(source) => return Err(IdentityError::Io { path, source }),
        };
        let name = gethostname().to_string_lossy().into_owned();
        Ok(Self { device_id, name })
    }

    /// The stable identifier peers know this installation by.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl IdentityProvider for LocalIdentity {
    fn resolve(&self) -> Option<Device> {
        let ip = primary_ipv4()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_IP.to_string());
        Some(Device {
            id: self.device_id.clone(),
            name: self.name.clone(),
            ip,
        })
    }
}

fn create_id(path: &Path) -> Result<String, IdentityError> {
    let id = Uuid::new_v4().to_string();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| IdentityError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, &id).map_err(|source| IdentityError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("created new device id at {}", path.display());
    Ok(id)
}

/// The first up, non-loopback IPv4 address on any interface.
///
/// `None` when interface enumeration fails or only loopback/link-local
/// addresses exist (e.g. no network cable, airplane mode).
pub fn primary_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("failed to enumerate network interfaces: {e}");
            return None;
        }
    };

    for (name, ip) in interfaces {
        if let IpAddr::V4(v4) = ip {
            if v4.is_loopback() || v4.is_link_local() {
                continue;
            }
            debug!("using {v4} on interface {name} as the local address");
            return Some(v4);
        }
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────
