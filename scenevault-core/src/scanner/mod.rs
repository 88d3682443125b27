mod fs;
mod hash;

pub use fs::{FileSystem, FsMetadata, InMemoryFs, ReadDirStream, RealFs};
pub use hash::ContentHash;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use scenevault_model::{Event, EventPayload, ScanCounters, ScanId, ScanStatus};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::enqueue::SceneEnqueuer;
use crate::error::{CoreError, CoreResult};
use crate::events::EventBus;
use crate::store::{ScanRecordStore, SceneStore, StorageRootStore};

/// Files below this size are ignored.
const MIN_FILE_SIZE_BYTES: u64 = 1024 * 1024;
/// `scan.progress` is emitted every this-many processed entries.
const PROGRESS_INTERVAL: usize = 8;
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "webm", "mov", "m4v", "wmv", "flv"];

fn has_video_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| VIDEO_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

enum ScanOutcome {
    Created,
    Skipped,
    Relinked,
}

struct RunningScan {
    scan_id: ScanId,
    cancel: CancellationToken,
}

/// Walks registered storage roots and enqueues newly-discovered scenes.
pub struct Scanner {
    fs: Arc<dyn FileSystem>,
    roots: Arc<dyn StorageRootStore>,
    scenes: Arc<dyn SceneStore>,
    scans: Arc<dyn ScanRecordStore>,
    bus: Arc<dyn EventBus>,
    enqueuer: Arc<dyn SceneEnqueuer>,
    clock: Arc<dyn Clock>,
    running: std::sync::Mutex<Option<RunningScan>>,
}

impl Scanner {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        roots: Arc<dyn StorageRootStore>,
        scenes: Arc<dyn SceneStore>,
        scans: Arc<dyn ScanRecordStore>,
        bus: Arc<dyn EventBus>,
        enqueuer: Arc<dyn SceneEnqueuer>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            fs,
            roots,
            scenes,
            scans,
            bus,
            enqueuer,
            clock,
            running: std::sync::Mutex::new(None),
        })
    }

    /// Restart reconciliation step: any scan record still `running` from a
    /// prior process lifetime is marked `cancelled`.
    pub async fn reconcile_on_restart(&self) -> CoreResult<()> {
        self.scans.cancel_all_running(self.clock.now()).await
    }

    /// `Start()`: fails with `Conflict` if a scan is already in progress,
    /// otherwise creates a scan record and spawns the walk.
    pub fn start(self: &Arc<Self>) -> CoreResult<ScanId> {
        let mut guard = self.running.lock().expect("lock");
        if guard.is_some() {
            return Err(CoreError::Conflict("a scan is already running".to_string()));
        }
        let scan_id = ScanId::new();
        let cancel = CancellationToken::new();
        *guard = Some(RunningScan { scan_id, cancel: cancel.clone() });
        drop(guard);

        let scanner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(error) = scanner.scans.create_running(scan_id, scanner.clock.now()).await {
                warn!(%error, "failed to create scan record");
                *scanner.running.lock().expect("lock") = None;
                return;
            }
            scanner.run_walk(scan_id, cancel).await;
            *scanner.running.lock().expect("lock") = None;
        });

        Ok(scan_id)
    }

    /// Spec §4.3 `Cancel()`: cooperative, observed at the next directory
    /// entry boundary.
    pub fn cancel(&self) -> CoreResult<()> {
        let guard = self.running.lock().expect("lock");
        match guard.as_ref() {
            Some(running) => {
                running.cancel.cancel();
                Ok(())
            }
            None => Err(CoreError::NotFound("no scan is running".to_string())),
        }
    }

    /// Spec §4.3 `Status()`.
    pub async fn status(&self) -> CoreResult<Option<scenevault_model::ScanRecord>> {
        self.scans.get_running().await
    }

    async fn run_walk(&self, scan_id: ScanId, cancel: CancellationToken) {
        let mut counters = ScanCounters::default();

        let roots = match self.roots.list().await {
            Ok(roots) => roots,
            Err(error) => {
                self.fail_scan(scan_id, &error.to_string()).await;
                return;
            }
        };

        for root in &roots {
            if cancel.is_cancelled() {
                break;
            }
            let root_path = PathBuf::from(&root.path);

            if self.fs.read_dir(&root_path).await.is_err() {
                // Unreadable at the top level is a scan-level failure, not a
                // tallied per-file error.
                self.fail_scan(scan_id, &format!("storage root unreadable: {}", root.path)).await;
                return;
            }

            let canonical_root = self.fs.canonicalize(&root_path).await.unwrap_or_else(|_| root_path.clone());
            let mut visited = HashSet::new();
            let mut stack = vec![root_path];
            let mut since_progress = 0usize;

            'walk: while let Some(dir) = stack.pop() {
                if cancel.is_cancelled() {
                    break;
                }
                let canonical_dir = self.fs.canonicalize(&dir).await.unwrap_or_else(|_| dir.clone());
                if !visited.insert(canonical_dir.clone()) {
                    continue; // already visited: symlink cycle guard
                }
                if !canonical_dir.starts_with(&canonical_root) {
                    continue; // escapes the registered root
                }

                let mut entries = match self.fs.read_dir(&dir).await {
                    Ok(entries) => entries,
                    Err(_) => {
                        counters.errors += 1;
                        continue;
                    }
                };

                loop {
                    if cancel.is_cancelled() {
                        break 'walk;
                    }
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(_) => {
                            counters.errors += 1;
                            break;
                        }
                    };

                    if is_hidden(&entry) {
                        continue;
                    }

                    let meta = match self.fs.metadata(&entry).await {
                        Ok(meta) => meta,
                        Err(_) => {
                            counters.errors += 1;
                            continue;
                        }
                    };

                    if meta.is_dir {
                        stack.push(entry);
                        continue;
                    }
                    if !meta.is_file || meta.len < MIN_FILE_SIZE_BYTES || !has_video_extension(&entry) {
                        continue;
                    }

                    counters.files_found += 1;
                    match self.classify_and_ingest(&entry, meta).await {
                        Ok(ScanOutcome::Created) => counters.scenes_added += 1,
                        Ok(ScanOutcome::Skipped) | Ok(ScanOutcome::Relinked) => counters.scenes_skipped += 1,
                        Err(error) => {
                            warn!(%error, path = %entry.display(), "scan: failed to ingest file");
                            counters.errors += 1;
                        }
                    }

                    since_progress += 1;
                    if since_progress >= PROGRESS_INTERVAL {
                        since_progress = 0;
                        self.emit_progress(scan_id, counters, Some(entry.display().to_string())).await;
                    }
                }
            }
        }

        if cancel.is_cancelled() {
            self.finish_scan(scan_id, ScanStatus::Cancelled, counters).await;
        } else {
            self.finish_scan(scan_id, ScanStatus::Completed, counters).await;
        }
    }

    async fn classify_and_ingest(&self, path: &Path, meta: FsMetadata) -> CoreResult<ScanOutcome> {
        let head = self.fs.read_bytes(path, 0, 1024).await.unwrap_or_default();
        let tail_offset = meta.len.saturating_sub(1024);
        let tail = self.fs.read_bytes(path, tail_offset, 1024).await.unwrap_or_default();
        let modified_secs = meta
            .modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let content_hash = ContentHash::compute(meta.len, modified_secs, &head, &tail);
        let path_str = path.display().to_string();
        let original_filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&path_str)
            .to_string();

        match self.scenes.find_by_content_hash(content_hash.as_str()).await? {
            Some(existing) if existing.path == path_str => Ok(ScanOutcome::Skipped),
            Some(existing) => {
                self.scenes.update_path(existing.id, &path_str).await?;
                let _ = self
                    .bus
                    .publish(Event::new(self.clock.now(), EventPayload::SceneUpdated { scene_id: existing.id }))
                    .await;
                Ok(ScanOutcome::Relinked)
            }
            None => {
                let scene = self
                    .scenes
                    .create_scene(&path_str, meta.len, content_hash.as_str(), &original_filename)
                    .await?;
                self.enqueuer.enqueue(scene.id).await?;
                let _ = self
                    .bus
                    .publish(Event::new(self.clock.now(), EventPayload::SceneAdded { scene_id: scene.id }))
                    .await;
                Ok(ScanOutcome::Created)
            }
        }
    }

    async fn emit_progress(&self, scan_id: ScanId, counters: ScanCounters, current_path: Option<String>) {
        let _ = self
            .scans
            .update_progress(scan_id, counters, None, current_path.clone())
            .await;
        let _ = self
            .bus
            .publish(Event::new(
                self.clock.now(),
                EventPayload::ScanProgress { scan_id, counters, current_path },
            ))
            .await;
    }

    async fn finish_scan(&self, scan_id: ScanId, status: ScanStatus, counters: ScanCounters) {
        let now = self.clock.now();
        let result = match status {
            ScanStatus::Completed => self.scans.complete(scan_id, now).await,
            ScanStatus::Cancelled => self.scans.cancel(scan_id, now).await,
            _ => unreachable!("finish_scan only ever transitions to a terminal, non-failed status"),
        };
        if let Err(error) = result {
            warn!(%error, "failed to persist scan completion");
        }

        let payload = match status {
            ScanStatus::Completed => EventPayload::ScanCompleted { scan_id, counters },
            ScanStatus::Cancelled => EventPayload::ScanCancelled { scan_id, counters },
            _ => unreachable!(),
        };
        let _ = self.bus.publish(Event::new(now, payload)).await;
        info!(?scan_id, ?status, files_found = counters.files_found, scenes_added = counters.scenes_added, "scan finished");
    }

    async fn fail_scan(&self, scan_id: ScanId, error_message: &str) {
        let now = self.clock.now();
        let _ = self.scans.fail(scan_id, now).await;
        let _ = self
            .bus
            .publish(Event::new(now, EventPayload::ScanFailed { scan_id, error: error_message.to_string() }))
            .await;
        warn!(?scan_id, error = error_message, "scan failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::events::InProcEventBus;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use scenevault_model::{SceneId, StorageRoot, StorageRootId};

    struct ImmediateEnqueuer;

    #[async_trait]
    impl SceneEnqueuer for ImmediateEnqueuer {
        async fn enqueue(&self, _scene_id: SceneId) -> CoreResult<()> {
            Ok(())
        }
    }

    fn build_scanner(fixture: InMemoryFs, roots: Vec<StorageRoot>) -> (Arc<Scanner>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::with_roots(roots));
        let scanner = Scanner::new(
            Arc::new(fixture),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(InProcEventBus::default()),
            Arc::new(ImmediateEnqueuer),
            Arc::new(FixedClock::new(chrono::Utc::now())),
        );
        (scanner, store)
    }

    #[tokio::test]
    async fn new_file_over_the_size_floor_creates_a_scene() {
        let mut fixture = InMemoryFs::new();
        fixture.add_dir("/root");
        fixture.add_file("/root/movie.mp4", vec![0u8; 2 * 1024 * 1024]);

        let roots = vec![StorageRoot { id: StorageRootId(1), display_name: "root".into(), path: "/root".into(), is_default: true }];
        let (scanner, store) = build_scanner(fixture, roots);

        let scan_id = scanner.start().expect("start");
        // Drive the walk inline rather than racing the spawned task.
        scanner.run_walk(scan_id, CancellationToken::new()).await;

        let scenes = store.list_by_status(scenevault_model::ProcessingStatus::Pending).await.unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].path, "/root/movie.mp4");
    }

    #[tokio::test]
    async fn files_below_the_size_floor_are_ignored() {
        let mut fixture = InMemoryFs::new();
        fixture.add_dir("/root");
        fixture.add_file("/root/tiny.mp4", vec![0u8; 1024]);

        let roots = vec![StorageRoot { id: StorageRootId(1), display_name: "root".into(), path: "/root".into(), is_default: true }];
        let (scanner, store) = build_scanner(fixture, roots);

        let scan_id = scanner.start().expect("start");
        scanner.run_walk(scan_id, CancellationToken::new()).await;

        let scenes = store.list_by_status(scenevault_model::ProcessingStatus::Pending).await.unwrap();
        assert!(scenes.is_empty());
    }

    /// Exercises `RealFs` against an actual directory on disk rather than
    /// the `InMemoryFs` fixture, the way the teacher's
    /// `folder_monitor_test.rs` drives its scanner against a `TempDir`.
    #[tokio::test]
    async fn real_fs_finds_a_video_file_written_to_a_temp_directory() {
        let temp_dir = tempfile::TempDir::new().expect("tempdir");
        let file_path = temp_dir.path().join("real_movie.mp4");
        std::fs::write(&file_path, vec![0u8; 2 * 1024 * 1024]).expect("write fixture file");

        let roots = vec![StorageRoot {
            id: StorageRootId(1),
            display_name: "root".into(),
            path: temp_dir.path().to_string_lossy().into_owned(),
            is_default: true,
        }];
        let store = Arc::new(InMemoryStore::with_roots(roots));
        let scanner = Scanner::new(
            Arc::new(RealFs::new()),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(InProcEventBus::default()),
            Arc::new(ImmediateEnqueuer),
            Arc::new(FixedClock::new(chrono::Utc::now())),
        );

        let scan_id = scanner.start().expect("start");
        scanner.run_walk(scan_id, CancellationToken::new()).await;

        let scenes = store.list_by_status(scenevault_model::ProcessingStatus::Pending).await.unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].path, file_path.to_string_lossy());
    }

    #[tokio::test]
    async fn a_file_moved_on_disk_updates_the_existing_scene_path() {
        let mut fixture = InMemoryFs::new();
        fixture.add_dir("/root");
        let content = vec![7u8; 2 * 1024 * 1024];
        fixture.add_file("/root/a.mp4", content.clone());

        let roots = vec![StorageRoot { id: StorageRootId(1), display_name: "root".into(), path: "/root".into(), is_default: true }];
        let (scanner, store) = build_scanner(fixture.clone(), roots.clone());

        let scan_id = scanner.start().expect("start");
        scanner.run_walk(scan_id, CancellationToken::new()).await;
        assert_eq!(store.list_by_status(scenevault_model::ProcessingStatus::Pending).await.unwrap().len(), 1);

        let mut moved_fixture = fixture;
        moved_fixture.move_file(Path::new("/root/a.mp4"), "/root/b.mp4");
        let scanner2 = Scanner::new(
            Arc::new(moved_fixture),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(InProcEventBus::default()),
            Arc::new(ImmediateEnqueuer),
            Arc::new(FixedClock::new(chrono::Utc::now())),
        );
        let scan_id2 = scanner2.start().expect("start");
        scanner2.run_walk(scan_id2, CancellationToken::new()).await;

        let scenes = store.list_by_status(scenevault_model::ProcessingStatus::Pending).await.unwrap();
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].path, "/root/b.mp4");
    }
}
