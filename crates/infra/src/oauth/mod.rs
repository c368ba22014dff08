//! OAuth2 against the Microsoft identity platform

pub mod token_source;

pub use token_source::{GraphTokenSource, OAuthEndpoints};
