//! Common utilities and types shared across the SFU signaling components.

#![warn(clippy::pedantic)]

/// Module for identifier and media kind types
pub mod types;

/// Module for common configuration
pub mod config;
