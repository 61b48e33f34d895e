//! TCP networking: message framing, the one-shot client, the subnet
//! scanner, and the sync server.

pub mod client;
pub mod framing;
pub mod scanner;
pub mod server;

/// Fixed TCP port every node listens on and every probe targets.
pub const SYNC_PORT: u16 = 8080;
