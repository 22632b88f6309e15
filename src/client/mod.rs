//! HTTP client for the admin interface of a running server

mod admin_client;

pub use admin_client::AdminClient;
