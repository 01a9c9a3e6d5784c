//! HTTP networking module
//!
//! Provides HTTP client functionality for making requests to search providers.

mod client;

pub use client::{HttpClient, USER_AGENT};
