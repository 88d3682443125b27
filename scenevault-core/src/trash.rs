use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::RetentionConfig;
use crate::store::SceneStore;

/// Periodic background task that purges scenes whose trash retention window
/// has elapsed. Mirrors the Job Ledger's retention sweeper (§4.4), applied
/// to §3's "trashed scenes are permanently removed after their retention
/// expires" invariant instead of job rows.
pub fn spawn_trash_sweeper(
    scenes: Arc<dyn SceneStore>,
    clock: Arc<dyn Clock>,
    retention: RetentionConfig,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(retention.sweep_interval_secs));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("trash sweeper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match scenes.purge_expired_trash(clock.now()).await {
                        Ok(purged) if purged.is_empty() => {}
                        Ok(purged) => info!(count = purged.len(), "trash sweep purged expired scenes"),
                        Err(error) => warn!(%error, "trash sweep failed"),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test_support::FixedClock;
    use crate::store::InMemoryStore;
    use scenevault_model::{StorageRoot, StorageRootId};

    #[tokio::test]
    async fn purges_only_scenes_past_their_trash_expiry() {
        let store = Arc::new(InMemoryStore::with_roots(vec![StorageRoot {
            id: StorageRootId(1),
            display_name: "root".into(),
            path: "/root".into(),
            is_default: true,
        }]));
        let scenes: Arc<dyn SceneStore> = store.clone();
        let clock = Arc::new(FixedClock::new(chrono::Utc::now()));

        let scene = scenes.create_scene("/root/a.mp4", 2_000_000, "hash-a", "a.mp4").await.unwrap();
        scenes.trash(scene.id, 7, clock.now()).await.unwrap();

        // Not yet expired: a sweep "now" before the window elapses leaves it.
        let purged = scenes.purge_expired_trash(clock.now()).await.unwrap();
        assert!(purged.is_empty());
        assert!(scenes.get(scene.id).await.unwrap().is_some());

        // Past the retention window: purged.
        let later = clock.now() + chrono::Duration::days(8);
        let purged = scenes.purge_expired_trash(later).await.unwrap();
        assert_eq!(purged, vec![scene.id]);
        assert!(scenes.get(scene.id).await.unwrap().is_none());
    }
}
