//! # Persona Gateway
//!
//! Browser-facing chat transport: a single-page widget at `/`, a JSON chat
//! endpoint it posts to, and health/info probes.

pub mod routes;
pub mod server;
pub mod widget;

pub use server::{AppState, build_router, build_setup_router, start, start_setup};
