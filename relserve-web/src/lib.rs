//! Relserve Web - Release catalog HTTP server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
//!
//! JSON endpoints for the release catalog plus installer downloads:
//!
//! - `GET /releases/all.json`
//! - `GET /releases/latest.json`
//! - `GET /releases/download/{filename}`

pub mod error;
pub mod handlers;
pub mod server;

// Re-export main types
pub use error::ApiError;
pub use server::{AppState, router, run_server};
