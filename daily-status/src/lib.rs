pub mod cli;
pub mod editor;
pub mod github;
pub mod load_config;
pub mod prompt;

pub use cli::{run, Cli};
