//! Outbound action delivery adapters.

pub mod mock;
pub mod registry;
pub mod webhook;

pub use mock::MockAdapter;
pub use registry::AdapterRegistry;
pub use webhook::WebhookAdapter;
