//! linkstash - A small URL shortener backed by a pluggable state store
//!
//! # Features
//! - **server**: HTTP server mode (default)
//! - **cli**: Command-line admin client
//!
//! # Architecture
//! - `storage`: `StateStore` contract, memory and persistent backends
//! - `api`: HTTP redirect and admin handlers
//! - `client`: HTTP client for the admin interface
//! - `interfaces`: CLI commands
//! - `config`: Configuration loading
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod runtime;
pub mod storage;
pub mod system;
pub mod utils;
