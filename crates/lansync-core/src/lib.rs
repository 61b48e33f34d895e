//! # lansync-core
//!
//! Shared library for lansync containing the wire-protocol message types,
//! the text codec, and the device identity value exchanged between peers.
//!
//! This crate is used by every node role (server and client side alike).
//! It has zero dependencies on sockets, OS APIs, or UI frameworks.
//!
//! lansync lets independent installations on the same local network find
//! each other and register as mutually trusted "tracked devices".  The
//! wire protocol is a deliberately minimal HTTP subset: one request and
//! one response per connection, CRLF-delimited headers, and a body framed
//! by `Content-Length`.  This crate defines:
//!
//! - **`protocol`** – The typed [`Request`]/[`Response`] messages and the
//!   codec that parses and serializes them.
//!
//! - **`device`** – The [`Device`] value (`id`, `name`, `ip`) that peers
//!   exchange as a JSON payload during discovery and pairing.

pub mod device;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `lansync_core::Device` instead of `lansync_core::device::Device`.
pub use device::Device;
pub use protocol::codec::{
    encode_request, encode_response, parse_request, parse_response, ProtocolError,
};
pub use protocol::message::{Headers, Method, Request, Response, Status};
