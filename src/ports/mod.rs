//! Port traits implemented by the adapters.

pub mod artifact_port;
pub mod config_port;
pub mod data_port;
