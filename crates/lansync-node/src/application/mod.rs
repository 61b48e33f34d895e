//! Application-layer use cases.

pub mod pairing;
