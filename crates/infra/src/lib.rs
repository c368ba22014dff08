//! # Calsync Infrastructure
//!
//! Adapters behind the ports defined in `calsync-core`.
//!
//! This crate contains:
//! - Key-value backends (in-memory, SQLite, encrypted wrapper)
//! - Microsoft Graph remote calendar client and OAuth2 token source
//! - Chat platform REST client
//! - Job scheduler, webhook and action HTTP router
//! - Configuration loading and job metrics
//!
//! ## Architecture
//! - Implements traits defined in `calsync-core`
//! - Contains all "impure" code (I/O, network, storage)

pub mod chat;
pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod observability;
pub mod remote;
pub mod scheduling;
pub mod server;
pub mod storage;

pub use errors::{InfraError, InfraResult};
