//! Load `chromadex.toml` from the library directory (CLI only). Library users build
//! [`Opts`] / [`PipelineOptions`](crate::pipeline::PipelineOptions) themselves.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub struct ChromadexToml {
    #[serde(default)]
    settings: Settings,
}

#[derive(Debug, Default, Deserialize)]
struct Settings {
    db_path: Option<String>,
    thumbs_dir: Option<String>,
    artist_images_dir: Option<String>,
    max_jobs: Option<usize>,
    workers: Option<usize>,
    /// Seconds.
    task_timeout: Option<u64>,
    flush_retries: Option<u32>,
    verbose: Option<bool>,
}

/// Load the config file from `dir` if present. Returns None if missing or unreadable.
pub fn load_chromadex_toml(dir: &Path) -> Option<ChromadexToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_chromadex_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_chromadex_toml(s: &str) -> Result<ChromadexToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($s:expr, $opts:expr, $s_field:ident => $opts_field:ident) => {
        if let Some(v) = $s.$s_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
/// Relative paths are resolved against `base`.
pub fn apply_file_to_opts(file: &ChromadexToml, base: &Path, opts: &mut Opts) {
    let s = &file.settings;
    let resolve = |p: &str| -> PathBuf {
        let p = PathBuf::from(p);
        if p.is_absolute() { p } else { base.join(p) }
    };
    if let Some(ref p) = s.db_path {
        opts.db_path = Some(resolve(p));
    }
    if let Some(ref p) = s.thumbs_dir {
        opts.thumbs_dir = Some(resolve(p));
    }
    if let Some(ref p) = s.artist_images_dir {
        opts.artist_images_dir = Some(resolve(p));
    }
    if let Some(n) = s.max_jobs {
        opts.max_jobs = Some(n);
    }
    if let Some(n) = s.workers {
        opts.workers = Some(n);
    }
    if let Some(secs) = s.task_timeout {
        opts.task_deadline = Duration::from_secs(secs);
    }
    apply_file_opt!(s, opts, flush_retries => flush_retries);
    apply_file_opt!(s, opts, verbose => verbose);
}
