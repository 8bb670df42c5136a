//! Client Module
//!
//! HTTP transport for the Mistral API.

pub mod http;

pub use http::{ByteStream, HttpClient};
