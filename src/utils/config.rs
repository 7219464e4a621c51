//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    db_filename: String,
    config_filename: String,
    env_key_db: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                db_filename: format!("{pkg}.db"),
                config_filename: format!("{pkg}.toml"),
                env_key_db: format!("{}_DB", pkg.to_uppercase()),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Default attribute database filename (placed next to the catalog).
    pub fn db_filename(&self) -> &str {
        &self.db_filename
    }

    /// Config file looked up in the library directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable that overrides the attribute database path.
    pub fn env_key_db(&self) -> &str {
        &self.env_key_db
    }
}

// ---- Worker threads ----

/// Sizing for the enrichment worker pool.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from rayon.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads (from rayon); set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Floor for the pool, whatever the machine reports.
    pub floor: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const FLOOR_THREADS: usize = 1;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    /// That is the machine's available parallelism unless `RAYON_NUM_THREADS` overrides it,
    /// which makes the variable a knob for the enrichment pool size as well.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }

    /// Half the available threads, leaving headroom for the orchestrating thread.
    pub fn enrichment_workers(&self) -> usize {
        (self.all_threads / 2).max(self.floor)
    }
}

// ---- Enrichment ----

/// Completed results accumulated before a flush to the attribute table.
pub const ENRICH_BATCH_SIZE: usize = 20;

/// Artwork files are stored as `<hash><IMAGE_EXTENSION>` under the per-type directory.
pub const IMAGE_EXTENSION: &str = ".webp";

/// Number of colors requested from the extractor; the first after hue sort wins.
pub const EXTRACT_COLOR_COUNT: usize = 1;

/// Per-task deadline and flush retry policy.
pub struct EnrichConsts;

impl EnrichConsts {
    /// Deadline for a single color extraction.
    pub const TASK_DEADLINE: Duration = Duration::from_secs(30);
    /// Extra attempts for a failed flush before the error propagates.
    pub const FLUSH_RETRIES: u32 = 1;
    /// Initial wait between flush attempts (doubles each retry).
    pub const RETRY_BACKOFF: Duration = Duration::from_millis(50);
}

// ---- Color extraction ----

/// Image sampling for dominant color extraction.
pub struct ExtractConsts;

impl ExtractConsts {
    /// Images are downscaled so the longest edge is at most this many pixels before sampling.
    pub const SAMPLE_EDGE_PX: u32 = 64;
    /// Bits kept per channel when bucketing pixels (4 → 4096 buckets).
    pub const QUANT_BITS: u8 = 4;
    /// Pixels with alpha below this are ignored.
    pub const MIN_ALPHA: u8 = 128;
}

// ---- Catalog ----

/// Albums kept in the recently-added view.
pub const RECENTLY_ADDED_LIMIT: usize = 20;

/// Length of the hex item hash derived from catalog fields.
pub const ITEM_HASH_LEN: usize = 16;
