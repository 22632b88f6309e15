//! Mode routing
//!
//! - Server mode (HTTP server)
//! - CLI mode (admin client talking to a running server)

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(feature = "server")]
pub use server::run_server;

#[cfg(feature = "cli")]
pub use cli::run_cli;
