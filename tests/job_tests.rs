//! Job tests: runner ceiling, exclusivity, failure isolation, and full index rebuilds.

use anyhow::{Result, bail};
use chromadex::catalog::{Catalog, JsonLibrarySource, LibrarySource, RawLibrary};
use chromadex::engine::{
    AttributeTable, ColorExtractor, Rgb, SqliteAttributeTable, asset_path, open_db,
    open_db_in_memory,
};
use chromadex::jobs::{
    EnrichJob, IndexJob, Job, JobExecutionError, JobRunner, JobState, MappingPass, RecentsJob,
    SharedTable, shared_table,
};
use chromadex::pipeline::PipelineOptions;
use chromadex::{AssetPaths, CatalogItem, ItemType, Opts, index_library};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const CATALOG_JSON: &str = r#"{
    "tracks": [
        {"hash": "t1", "title": "One", "album_hash": "alb1", "artist_hashes": ["art1"],
         "folder": "/music/a"},
        {"hash": "t2", "title": "Two", "album_hash": "alb2", "artist_hashes": ["art2"],
         "folder": "/music/b"}
    ],
    "albums": [
        {"hash": "alb1", "name": "First", "artist": "Ann", "date_added": 10},
        {"hash": "alb2", "name": "Second", "artist": "Bo", "date_added": 20},
        {"hash": "alb3", "name": "Third", "artist": "Bo", "date_added": 5}
    ],
    "artists": [
        {"hash": "art1", "name": "Ann"},
        {"hash": "art2", "name": "Bo"}
    ]
}"#;

#[derive(Default)]
struct CountingExtractor {
    calls: AtomicUsize,
}

impl ColorExtractor for CountingExtractor {
    fn extract(&self, _path: &Path, _count: usize, _stop: &dyn Fn() -> bool) -> Result<Vec<Rgb>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Rgb::new(1, 2, 3)])
    }
}

/// Blocks in `extract` until released, so a job can be held running.
struct BlockingSource {
    entered: Sender<()>,
    release: Receiver<()>,
}

impl LibrarySource for BlockingSource {
    fn extract(&self) -> Result<RawLibrary> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        Ok(RawLibrary::default())
    }
}

struct FailingSource;

impl LibrarySource for FailingSource {
    fn extract(&self) -> Result<RawLibrary> {
        bail!("tag reader unavailable")
    }
}

struct PanickingSource;

impl LibrarySource for PanickingSource {
    fn extract(&self) -> Result<RawLibrary> {
        panic!("extractor crashed")
    }
}

struct StaticSource(RawLibrary);

impl LibrarySource for StaticSource {
    fn extract(&self) -> Result<RawLibrary> {
        Ok(self.0.clone())
    }
}

struct BrokenPass;

impl MappingPass for BrokenPass {
    fn name(&self) -> &str {
        "scrobbles"
    }

    fn run(&self, _catalog: &Catalog) -> Result<()> {
        bail!("scrobble DB locked")
    }
}

#[derive(Default)]
struct FlagPass {
    ran: AtomicBool,
}

impl MappingPass for FlagPass {
    fn name(&self) -> &str {
        "favorites"
    }

    fn run(&self, _catalog: &Catalog) -> Result<()> {
        self.ran.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn memory_table() -> SharedTable {
    shared_table(SqliteAttributeTable::new(open_db_in_memory().unwrap()))
}

fn options(extractor: Arc<dyn ColorExtractor>) -> PipelineOptions {
    PipelineOptions {
        workers: 2,
        extractor,
        ..Default::default()
    }
}

fn index_job(
    catalog: &Arc<Catalog>,
    source: Arc<dyn LibrarySource>,
    table: SharedTable,
) -> IndexJob {
    IndexJob::new(
        Arc::clone(catalog),
        source,
        table,
        AssetPaths::default(),
        options(Arc::new(CountingExtractor::default())),
    )
}

fn blocking_source() -> (Arc<BlockingSource>, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = bounded(1);
    let (release_tx, release_rx) = bounded(1);
    let source = Arc::new(BlockingSource {
        entered: entered_tx,
        release: release_rx,
    });
    (source, entered_rx, release_tx)
}

/// Library dir with catalog.json and artwork for alb1, alb2 and art1.
fn library_fixture(dir: &Path) -> AssetPaths {
    std::fs::write(dir.join("catalog.json"), CATALOG_JSON).unwrap();
    let assets = AssetPaths::under(dir);
    std::fs::create_dir_all(&assets.album_dir).unwrap();
    std::fs::create_dir_all(&assets.artist_dir).unwrap();
    for h in ["alb1", "alb2"] {
        std::fs::write(asset_path(&assets.album_dir, h), b"img").unwrap();
    }
    std::fs::write(asset_path(&assets.artist_dir, "art1"), b"img").unwrap();
    assets
}

// --- runner ---

#[test]
fn test_runner_rejects_launch_at_capacity() {
    let catalog = Arc::new(Catalog::new());
    let (source, entered, release) = blocking_source();
    let runner = JobRunner::new(Some(1));

    let first = runner
        .launch(Job::Index(index_job(&catalog, source, memory_table())))
        .unwrap();
    entered.recv().unwrap();
    assert_eq!(runner.active(), 1);

    let second = runner.launch(Job::Recents(RecentsJob::new(Arc::clone(&catalog))));
    assert!(matches!(second, Err(JobExecutionError::AtCapacity { limit: 1 })));

    release.send(()).unwrap();
    first.join().unwrap();
    assert_eq!(runner.active(), 0);

    runner
        .run(Job::Recents(RecentsJob::new(Arc::clone(&catalog))))
        .unwrap();
}

#[test]
fn test_unbounded_runner_admits_many() {
    let catalog = Arc::new(Catalog::new());
    let runner = JobRunner::new(None);
    assert_eq!(runner.max_concurrent(), None);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            runner
                .launch(Job::Recents(RecentsJob::new(Arc::clone(&catalog))))
                .unwrap()
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn test_exclusive_job_blocks_independent_job() {
    let catalog = Arc::new(Catalog::new());
    let (source, entered, release) = blocking_source();
    let runner = JobRunner::new(None);

    let index = runner
        .launch(Job::Index(index_job(&catalog, source, memory_table())))
        .unwrap();
    entered.recv().unwrap();

    let recents = runner
        .launch(Job::Recents(RecentsJob::new(Arc::clone(&catalog))))
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(!recents.is_finished());
    assert_eq!(recents.state(), JobState::NotStarted);
    assert_eq!(index.state(), JobState::Running);

    release.send(()).unwrap();
    index.join().unwrap();
    recents.join().unwrap();
}

#[test]
fn test_failed_job_does_not_affect_others() {
    let catalog = Arc::new(Catalog::new());
    let runner = JobRunner::new(None);

    let failing = runner
        .launch(Job::Index(index_job(
            &catalog,
            Arc::new(FailingSource),
            memory_table(),
        )))
        .unwrap();
    let recents = runner
        .launch(Job::Recents(RecentsJob::new(Arc::clone(&catalog))))
        .unwrap();

    match failing.join() {
        Err(JobExecutionError::Failed { job, source }) => {
            assert_eq!(job, "index");
            assert!(format!("{source:#}").contains("tag reader unavailable"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    recents.join().unwrap();

    // The runner is still usable afterwards.
    runner
        .run(Job::Recents(RecentsJob::new(Arc::clone(&catalog))))
        .unwrap();
}

#[test]
fn test_panicking_job_is_contained() {
    let catalog = Arc::new(Catalog::new());
    let runner = JobRunner::new(Some(1));
    let handle = runner
        .launch(Job::Index(index_job(
            &catalog,
            Arc::new(PanickingSource),
            memory_table(),
        )))
        .unwrap();
    while !handle.is_finished() {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.state(), JobState::Failed);
    assert!(matches!(
        handle.join(),
        Err(JobExecutionError::Panicked { job: "index" })
    ));
    assert_eq!(runner.active(), 0);
}

#[test]
fn test_job_names_and_independence() {
    let catalog = Arc::new(Catalog::new());
    let recents = Job::Recents(RecentsJob::new(Arc::clone(&catalog)));
    let enrich = Job::Enrich(EnrichJob::new(
        Arc::clone(&catalog),
        memory_table(),
        ItemType::Album,
        "/nowhere",
        PipelineOptions::default(),
    ));
    assert_eq!(recents.name(), "recents");
    assert!(recents.independent());
    assert_eq!(enrich.name(), "enrich");
    assert!(!enrich.independent());
}

// --- index job ---

#[test]
fn test_index_job_rebuilds_and_enriches() {
    let dir = tempfile::tempdir().unwrap();
    let assets = library_fixture(dir.path());
    let catalog = Arc::new(Catalog::new());
    let table = memory_table();
    let extractor = Arc::new(CountingExtractor::default());
    let job = IndexJob::new(
        Arc::clone(&catalog),
        Arc::new(JsonLibrarySource::new(dir.path().join("catalog.json"))),
        Arc::clone(&table),
        assets,
        options(extractor.clone()),
    );

    let summary = job.run().unwrap();

    let epoch = summary.epoch.unwrap();
    assert_eq!(catalog.tracks.epoch(), Some(epoch));
    assert_eq!(catalog.albums.epoch(), Some(epoch));
    assert_eq!(catalog.artists.epoch(), Some(epoch));
    assert_eq!((summary.tracks, summary.albums, summary.artists), (2, 3, 2));
    assert_eq!(summary.folders, 2);
    assert!(catalog.folders.contains(Path::new("/music/a")));

    assert_eq!(summary.album_colors.persisted, 2);
    assert_eq!(summary.album_colors.not_found, 1);
    assert_eq!(summary.artist_colors.persisted, 1);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);

    assert_eq!(catalog.albums.get("alb1").unwrap().color.as_deref(), Some("rgb(1, 2, 3)"));
    assert_eq!(catalog.albums.get("alb3").unwrap().color, None);
    assert_eq!(catalog.artists.get("art1").unwrap().color.as_deref(), Some("rgb(1, 2, 3)"));
    {
        let t = table.lock().unwrap();
        assert_eq!(t.all_records(ItemType::Album).unwrap().len(), 2);
        assert_eq!(t.all_records(ItemType::Artist).unwrap().len(), 1);
    }

    assert_eq!(catalog.recently_added(), vec!["alb2", "alb1", "alb3"]);
}

#[test]
fn test_reindex_uses_new_epoch_and_restores_colors() {
    let dir = tempfile::tempdir().unwrap();
    let assets = library_fixture(dir.path());
    let catalog = Arc::new(Catalog::new());
    let table = memory_table();
    let extractor = Arc::new(CountingExtractor::default());
    let job = IndexJob::new(
        Arc::clone(&catalog),
        Arc::new(JsonLibrarySource::new(dir.path().join("catalog.json"))),
        Arc::clone(&table),
        assets,
        options(extractor.clone()),
    );

    let first = job.run().unwrap();
    let second = job.run().unwrap();

    assert!(second.epoch > first.epoch);
    assert_eq!(catalog.albums.epoch(), second.epoch);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
    assert_eq!(second.hydrated, 3);
    // alb3 has no artwork, so it is the only album tried again.
    assert_eq!(second.album_colors.selected, 1);
    assert_eq!(second.album_colors.not_found, 1);
    assert_eq!(second.album_colors.persisted, 0);
    assert_eq!(second.artist_colors.selected, 1);
    assert_eq!(catalog.albums.get("alb2").unwrap().color.as_deref(), Some("rgb(1, 2, 3)"));
}

#[test]
fn test_failed_mapping_pass_does_not_abort_rebuild() {
    let catalog = Arc::new(Catalog::new());
    let flag = Arc::new(FlagPass::default());
    let mut raw = RawLibrary::default();
    raw.albums.push(CatalogItem::new(ItemType::Album, "x", "X"));
    let job = IndexJob::new(
        Arc::clone(&catalog),
        Arc::new(StaticSource(raw)),
        memory_table(),
        AssetPaths::default(),
        options(Arc::new(CountingExtractor::default())),
    )
    .with_mapping_pass(Arc::new(BrokenPass))
    .with_mapping_pass(flag.clone());

    let summary = job.run().unwrap();

    assert_eq!(summary.failed_passes, vec!["scrobbles".to_string()]);
    assert!(flag.ran.load(Ordering::SeqCst));
    assert_eq!(catalog.albums.len(), 1);
}

#[test]
fn test_enrich_job_fills_missing_colors() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(Catalog::new());
    catalog.artists.load(
        vec![
            CatalogItem::new(ItemType::Artist, "p", "P"),
            CatalogItem::new(ItemType::Artist, "q", "Q"),
        ],
        chromadex::Epoch::next(),
    );
    std::fs::write(asset_path(dir.path(), "p"), b"img").unwrap();
    let table = memory_table();

    let runner = JobRunner::new(Some(2));
    runner
        .run(Job::Enrich(EnrichJob::new(
            Arc::clone(&catalog),
            Arc::clone(&table),
            ItemType::Artist,
            dir.path(),
            options(Arc::new(CountingExtractor::default())),
        )))
        .unwrap();

    assert_eq!(catalog.artists.get("p").unwrap().color.as_deref(), Some("rgb(1, 2, 3)"));
    assert_eq!(catalog.artists.get("q").unwrap().color, None);
    let t = table.lock().unwrap();
    assert_eq!(
        t.find_one("p", ItemType::Artist).unwrap().unwrap().color.as_deref(),
        Some("rgb(1, 2, 3)")
    );
}

#[test]
fn test_recents_job_limit() {
    let catalog = Arc::new(Catalog::new());
    let mut items = Vec::new();
    for (hash, added) in [("a", 1), ("b", 3), ("c", 2)] {
        let mut item = CatalogItem::new(ItemType::Album, hash, hash);
        item.date_added = added;
        items.push(item);
    }
    catalog.albums.load(items, chromadex::Epoch::next());

    assert_eq!(RecentsJob::new(Arc::clone(&catalog)).with_limit(2).run(), 2);
    assert_eq!(catalog.recently_added(), vec!["b", "c"]);
}

// --- library entry point ---

#[test]
fn test_index_library_with_real_artwork() {
    let dir = tempfile::tempdir().unwrap();
    let assets = library_fixture(dir.path());
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([30, 60, 90]));
    img.save_with_format(asset_path(&assets.album_dir, "alb1"), image::ImageFormat::Png)
        .unwrap();

    let opts = Opts {
        catalog_path: dir.path().join("catalog.json"),
        workers: Some(2),
        ..Default::default()
    };
    let (catalog, summary) = index_library(&opts).unwrap();

    assert!(dir.path().join("chromadex.db").is_file());
    assert_eq!(summary.albums, 3);
    assert_eq!(catalog.albums.get("alb1").unwrap().color.as_deref(), Some("rgb(30, 60, 90)"));
    // alb2 and art1 hold bytes that are not an image.
    assert_eq!(summary.album_colors.extraction_failed, 1);
    assert_eq!(summary.artist_colors.extraction_failed, 1);

    let table = SqliteAttributeTable::new(open_db(&dir.path().join("chromadex.db")).unwrap());
    assert_eq!(table.count(ItemType::Album).unwrap(), 1);
}

#[test]
fn test_shared_table_serializes_writers() {
    let table = memory_table();
    let writers: Vec<_> = (0..4)
        .map(|i| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let mut t = table.lock().unwrap();
                t.insert_many(&[chromadex::AttributeRecord {
                    item_type: ItemType::Album,
                    hash: format!("h{i}"),
                    color: Some("rgb(0, 0, 0)".into()),
                }])
                .unwrap();
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }
    let t = table.lock().unwrap();
    assert_eq!(t.all_records(ItemType::Album).unwrap().len(), 4);
}
