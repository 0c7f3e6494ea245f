//! Seams to external services. Each has one production implementation and a
//! fake under `crate::testing`.

pub mod embedder;
pub mod notifier;
pub mod provider;

pub use embedder::Embedder;
pub use notifier::Notifier;
pub use provider::Provider;
