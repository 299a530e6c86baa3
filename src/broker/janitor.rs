//! C7: the three independent periodic background tasks. Unlike the original
//! (one thread per prompt, `spec.md` §9 design note calls this out as
//! wasteful), staleness here is a single sweep over the prompt index.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::store::Store;
use crate::storage;

/// Sweeps the prompt index every `interval`, evicting (and cascading the
/// deletion of generations for) any prompt stale for more than 600s.
pub async fn stale_prompt_sweeper(store: Arc<Store>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let now = Utc::now();
        let mut guard = store.lock();
        let stale_ids: Vec<Uuid> = guard
            .prompts
            .values()
            .filter(|p| p.is_stale(now))
            .map(|p| p.id)
            .collect();
        for id in stale_ids {
            warn!("Prompt {} stale, evicting", id);
            guard.delete_prompt(&id);
        }
    }
}

/// Serialises users, non-anonymous-owned workers, and stats to `db/` every
/// `interval` seconds. Not a write-ahead log — a crash can lose up to one
/// interval's worth of activity, per `spec.md`'s non-goals.
pub async fn snapshot_writer(store: Arc<Store>, db_dir: PathBuf, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let snapshot = {
            let guard = store.lock();
            storage::Snapshot::capture(&guard)
        };
        if let Err(e) = snapshot.write_to(&db_dir) {
            error!("Failed to write snapshot to {}: {}", db_dir.display(), e);
        } else {
            debug!("Snapshot written to {}", db_dir.display());
        }
    }
}
