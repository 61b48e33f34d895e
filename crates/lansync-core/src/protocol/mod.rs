//! Protocol module containing message types and the text codec.

pub mod codec;
pub mod message;

pub use codec::{encode_request, encode_response, parse_request, parse_response, ProtocolError};
pub use message::*;
