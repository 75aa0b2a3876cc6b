//! HTTP points service: per-user point sets, bounds reports, and a live
//! bounds stream for map clients.
//!
//! - `config`: CLI configuration parsing.
//! - `data`: JSON response bodies.
//! - `server`: Actix Web routes and the service thread.

pub use config::{DEFAULT_PORT, ServeCliArgs, ServeConfig};
pub use server::run;

mod config;
mod data;
mod server;
