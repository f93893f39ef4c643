//! Domain layer: pure business types, errors, and port traits.

pub mod errors;
pub mod models;
pub mod ports;
