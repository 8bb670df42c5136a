//! Configuration Module
//!
//! Handles client configuration loading.

pub mod client;
pub mod loader;

pub use client::{
    ClientConfig, ConfigOverlay, API_KEY_ENV, BASE_URL_ENV, DEFAULT_BASE_URL,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS,
};
pub use loader::{ConfigLoader, CONFIG_PATH_ENV};
