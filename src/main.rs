//! chromadex CLI: rebuild the catalog and extract album/artist colors.

use anyhow::Result;
use chromadex::engine::arg_parser::Cli;
use chromadex::engine::handle_run;
use clap::Parser;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
