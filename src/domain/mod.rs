//! Core domain types and logic.

pub mod aggregate;
pub mod analysis;
pub mod artifact;
pub mod config_validation;
pub mod correlation;
pub mod distribution;
pub mod error;
pub mod frame;
pub mod interval;
pub mod normalize;
pub mod pipeline;
pub mod price;
pub mod returns;
pub mod rolling;
pub mod universe;
pub mod whitening;
