//! # Persona Core
//! Shared foundation for the Persona profile agent: configuration, the error
//! taxonomy, chat wire types, and the traits that sit at every external seam
//! (chat completion, embedding, push notification).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::PersonaConfig;
pub use error::{PersonaError, Result};
