//! Outbound HTTP plumbing shared by the remote and platform adapters

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
