//! # Persona Tools
//!
//! Functions the model can call mid-turn, plus the push channel two of them
//! report through.

pub mod notify;
pub mod registry;

pub use notify::PushoverNotifier;
pub use registry::{Operation, ToolName, ToolRegistry, UserDetails};
