pub mod cli;
pub mod load_config;
pub mod wiki_client;

pub use cli::{run, Cli, Commands};
