//! Chat platform REST adapter

pub mod client;

pub use client::PlatformClient;
