use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter, Record};
use std::io::Write;
use std::thread;

const PKG: &str = env!("CARGO_PKG_NAME");

/// Thread tag for lines logged off the main thread (`job-index`, `enrich-3`).
fn thread_tag() -> Option<String> {
    thread::current()
        .name()
        .filter(|n| *n != "main")
        .map(str::to_string)
}

fn format_line(record: &Record<'_>) -> String {
    let prefix = match thread_tag() {
        Some(tag) => format!("{} {}", PKG.cyan(), tag.dimmed()),
        None => PKG.cyan().to_string(),
    };
    match record.level() {
        Level::Error => format!(
            "[{} {} {}] {}",
            prefix,
            "ERROR".red(),
            record.target().white(),
            record.args()
        ),
        Level::Warn => format!(
            "[{} {} {}] {}",
            prefix,
            "WARN".yellow(),
            record.target().white(),
            record.args()
        ),
        _ => format!("[{}] {}", prefix, record.args()),
    }
}

/// Install the crate logger. Later calls are ignored, so tests may call it freely.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // dependencies
        .filter_module(PKG, level)
        .format(|buf, record| writeln!(buf, "{}", format_line(record)))
        .try_init();
}
