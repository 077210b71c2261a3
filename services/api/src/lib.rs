//! HTTP surface of the inventory API
//!
//! The binary in `main.rs` wires PostgreSQL storage into [`state::AppState`].
//! Tests build the same state over in-memory stores.

pub mod config;
pub mod error;
pub mod inventory;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;

pub use state::AppState;
