//! Configuration loading
//!
//! Configuration comes from `CALSYNC_*` environment variables or, when
//! those are incomplete, from a probed TOML or JSON file.

pub mod loader;

pub use loader::{load, load_from_env, load_from_file, parse_config, probe_config_paths};
