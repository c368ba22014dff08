//! # Calsync Domain
//!
//! Business domain types and models for Calsync.
//!
//! This crate contains:
//! - Domain data types (User, Settings, Subscription, Event, Notification)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Engine tunables
//! - Timezone vocabulary conversion (Windows and IANA)
//!
//! ## Architecture
//! - No dependencies on other Calsync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use utils::timezone::TimeZoneName;
