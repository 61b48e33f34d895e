//! Infrastructure services: network I/O, storage, and host identity.

pub mod identity;
pub mod network;
pub mod storage;
