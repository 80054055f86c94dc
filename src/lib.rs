// Range-addressable HTTP streaming of media stored on a messaging platform,
// spread across a pool of authenticated client sessions.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod server;
pub mod source;
pub mod telemetry;

pub use error::{Error, Result};
