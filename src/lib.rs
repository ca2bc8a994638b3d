//! Volume loader: replace a container volume's contents from an image.
//!
//! The containers that mount the volume are stopped first, a throwaway
//! loader container copies the image's data into the volume, and the
//! containers that were stopped are started again.
//!
//! - [`engine`]: the container engine seam and its Docker implementation
//! - [`volumes`]: attachment resolution, stop/start fan-out, the loader
//! - [`config`]: settings from env, `.env` and an optional TOML file
//! - [`testing`]: an in-memory engine for tests

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod testing;
pub mod volumes;

pub use error::ConfigError;
