mod config_gen;
mod links;

pub use config_gen::generate_config;
pub use links::{add_batch, add_link, delete_link, list_links};
