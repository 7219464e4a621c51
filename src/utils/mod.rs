pub mod chromadex_toml;
pub mod config;
pub mod logger;

pub use chromadex_toml::{apply_file_to_opts, load_chromadex_toml};
pub use config::*;
pub use logger::setup_logging;
