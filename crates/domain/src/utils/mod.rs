//! Leaf utilities with no engine dependencies

pub mod markdown;
pub mod timezone;
