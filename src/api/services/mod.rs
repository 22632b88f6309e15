pub mod admin;
pub mod redirect;

pub use admin::{ADMIN_PATH, AdminCommand, AdminService, CLI_USER_AGENT, admin_routes};
pub use redirect::{RedirectService, RedirectSettings, redirect_routes};
