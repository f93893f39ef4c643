//! Adapters binding the domain ports to concrete infrastructure.

pub mod actions;
pub mod sqlite;
