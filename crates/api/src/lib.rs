//! # Calsync API
//!
//! Process wiring for the calendar bridge.
//!
//! This crate contains:
//! - Application context (dependency injection)
//! - Logging setup
//! - Main entry point
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires infra adapters into the core engine and owns their lifecycle

pub mod context;
pub mod utils;

pub use context::AppContext;
