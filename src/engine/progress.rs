//! Progress bar utilities for displaying processing status

use kdam::{Animation, Bar, BarExt};
use std::sync::{Arc, Mutex};

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: String,
    pub animation: Animation,
}

impl ProgressBarConfig {
    /// Create a new progress bar configuration
    pub fn new(total: usize, desc: impl Into<String>, animation: Animation) -> Self {
        Self {
            total,
            desc: desc.into(),
            animation,
        }
    }
}

/// Create a progress bar with the given configuration
pub fn create_progress_bar(config: ProgressBarConfig) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        animation = config.animation
    )))
}

/// Update progress bar if available
/// Uses try_lock to avoid blocking if mutex is contended (non-blocking)
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Force a refresh of the bar (e.g. so it shows 0/N immediately).
pub fn refresh_bar(pb: &ProgressBar) {
    if let Ok(mut bar) = pb.try_lock() {
        let _ = bar.refresh();
    }
}

/// Bar for one enrichment pass: `Processing <type> colors`, total = work set size.
/// Returns None when progress display is off.
pub fn enrichment_bar(show: bool, item_type: &str, total: usize) -> Option<ProgressBar> {
    show.then(|| {
        let bar = create_progress_bar(ProgressBarConfig::new(
            total,
            format!("Processing {item_type} colors"),
            Animation::Classic,
        ));
        refresh_bar(&bar);
        bar
    })
}
