//! Symmetric encryption for values at rest.

pub mod encryption;

pub use encryption::{EncryptedData, EncryptionService};
