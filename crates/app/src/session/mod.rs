//! Interactive marking session for one user.
//!
//! Input capture and state mutation are decoupled: the console turns lines into
//! [`Intent`]s on a channel, and a single controller thread applies them one
//! at a time to the user's [`Session`], writing every confirmed change through
//! to the points service before reporting it back to the renderer.
//!
//! - `config`: CLI configuration parsing.
//! - `state`: the session object (store, persisted snapshot, validity).
//! - `controller`: intent queue processing and confirmation flow.
//! - `console`: line parsing and text rendering of session events.
//! - `runner`: wiring for `geomark session`.

pub use config::{SessionCliArgs, SessionConfig};
pub use runner::run;

mod config;
mod console;
mod controller;
mod runner;
mod state;
