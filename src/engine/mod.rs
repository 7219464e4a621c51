//! Engine module: durable storage, color extraction, progress, CLI plumbing.

pub mod arg_parser;
pub mod cli;
pub mod colors;
pub mod db_ops;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::Cli;
pub use cli::handle_run;
pub use colors::{ColorExtractor, ImageColorExtractor, Rgb, sort_by_hue};
pub use db_ops::{AttributeTable, SqliteAttributeTable, open_db, open_db_in_memory};
pub use tools::{asset_path, item_hash};
