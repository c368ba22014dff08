//! Microsoft Graph adapter for the remote calendar ports

pub mod graph;
pub mod provider;
mod wire;

pub use graph::GraphClient;
pub use provider::GraphProvider;
