//! C8: load-on-start and periodic snapshot to the three `db/*.json` files
//! described in `spec.md` §6. A periodic dump, not a write-ahead log — a
//! crash loses at most one snapshot interval (the broker's non-goals rule
//! out stronger durability).

pub mod timestamp;

use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::broker::domain::user::ANONYMOUS_OAUTH_ID;
use crate::broker::domain::{Stats, User, Worker};
use crate::broker::store::{Index, StoreInner};

const USERS_FILE: &str = "users.json";
const SERVERS_FILE: &str = "servers.json";
const STATS_FILE: &str = "stats.json";

/// A consistent cut of the persisted state, captured while holding the
/// store lock and then serialised to disk *after* releasing it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    users: Vec<User>,
    /// Anonymous-owned workers are intentionally excluded — they are
    /// transient and exist only so matching works while the process is up.
    servers: Vec<Worker>,
    stats: Stats,
}

impl Snapshot {
    pub fn capture(store: &StoreInner) -> Self {
        Snapshot {
            users: store.users.values().cloned().collect(),
            servers: store
                .workers
                .values()
                .filter(|w| w.owner_oauth_id != ANONYMOUS_OAUTH_ID)
                .cloned()
                .collect(),
            stats: store.stats.clone(),
        }
    }

    pub fn write_to(&self, dir: &Path) -> io::Result<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(USERS_FILE), serde_json::to_vec(&self.users)?)?;
        fs::write(dir.join(SERVERS_FILE), serde_json::to_vec(&self.servers)?)?;
        fs::write(dir.join(STATS_FILE), serde_json::to_vec(&self.stats)?)?;
        Ok(())
    }
}

/// What `load()` hands back to the caller.
pub struct LoadedState {
    pub users: Index<String, User>,
    pub workers: Index<String, Worker>,
    pub stats: Stats,
    pub last_user_id: u64,
}

/// Loads `db/users.json`, ensures the anonymous user exists, then
/// `db/servers.json` (re-resolving each worker's owner by `oauth_id`,
/// dropping and warning on any that can't be resolved — see DESIGN.md),
/// then `db/stats.json`. A missing file means "empty"; a malformed one is
/// fatal (`spec.md` §7: "a malformed file is fatal to startup").
pub fn load(dir: &Path) -> Result<LoadedState> {
    let mut users: Index<String, User> = Index::new();
    let mut last_user_id = 0u64;

    let users_path = dir.join(USERS_FILE);
    if users_path.exists() {
        let contents = fs::read_to_string(&users_path)
            .with_context(|| format!("failed to read {}", users_path.display()))?;
        let loaded: Vec<User> = serde_json::from_str(&contents)
            .with_context(|| format!("malformed {}", users_path.display()))?;
        for user in loaded {
            if user.id > last_user_id {
                last_user_id = user.id;
            }
            users.add(user.oauth_id.clone(), user);
        }
        info!("Loaded {} users from {}", users.len(), users_path.display());
    }

    if users.get(&ANONYMOUS_OAUTH_ID.to_string()).is_none() {
        users.add(ANONYMOUS_OAUTH_ID.to_string(), User::new_anonymous());
    }

    let mut workers: Index<String, Worker> = Index::new();
    let servers_path = dir.join(SERVERS_FILE);
    if servers_path.exists() {
        let contents = fs::read_to_string(&servers_path)
            .with_context(|| format!("failed to read {}", servers_path.display()))?;
        let loaded: Vec<Worker> = serde_json::from_str(&contents)
            .with_context(|| format!("malformed {}", servers_path.display()))?;
        for worker in loaded {
            if users.get(&worker.owner_oauth_id).is_none() {
                warn!(
                    "Dropping worker '{}' on load: owner oauth_id '{}' not found",
                    worker.name, worker.owner_oauth_id
                );
                continue;
            }
            workers.add(worker.name.clone(), worker);
        }
        info!("Loaded {} workers from {}", workers.len(), servers_path.display());
    }

    let mut stats = Stats::default();
    let stats_path = dir.join(STATS_FILE);
    if stats_path.exists() {
        let contents = fs::read_to_string(&stats_path)
            .with_context(|| format!("failed to read {}", stats_path.display()))?;
        stats = serde_json::from_str(&contents)
            .with_context(|| format!("malformed {}", stats_path.display()))?;
    }

    Ok(LoadedState {
        users,
        workers,
        stats,
        last_user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_on_empty_directory_yields_just_the_anonymous_user() {
        let dir = tempdir().unwrap();
        let state = load(dir.path()).unwrap();
        assert_eq!(state.users.len(), 1);
        assert!(state.users.get(&ANONYMOUS_OAUTH_ID.to_string()).is_some());
        assert_eq!(state.workers.len(), 0);
        assert_eq!(state.last_user_id, 0);
    }

    #[test]
    fn malformed_users_file_is_fatal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(USERS_FILE), "not json").unwrap();
        assert!(load(dir.path()).is_err());
    }

    #[test]
    fn worker_with_unresolvable_owner_is_dropped_not_fatal() {
        let dir = tempdir().unwrap();
        let worker = Worker::new("bob".into(), "oauth-ghost".into(), "M".into(), 80, 1024, vec![]);
        fs::write(dir.path().join(SERVERS_FILE), serde_json::to_vec(&vec![worker]).unwrap()).unwrap();
        let state = load(dir.path()).unwrap();
        assert_eq!(state.workers.len(), 0);
    }

    #[test]
    fn snapshot_excludes_anonymous_owned_workers() {
        use crate::broker::store::Store;
        let store = Store::new(true);
        {
            let mut guard = store.lock();
            guard.workers.add(
                "anon-worker".into(),
                Worker::new("anon-worker".into(), ANONYMOUS_OAUTH_ID.into(), "M".into(), 80, 1024, vec![]),
            );
            guard.workers.add(
                "bobs-worker".into(),
                Worker::new("bobs-worker".into(), "oauth-bob".into(), "M".into(), 80, 1024, vec![]),
            );
        }
        let guard = store.lock();
        let snapshot = Snapshot::capture(&guard);
        assert_eq!(snapshot.servers.len(), 1);
        assert_eq!(snapshot.servers[0].name, "bobs-worker");
    }

    #[test]
    fn round_trip_preserves_user_state() {
        let dir = tempdir().unwrap();
        let mut user = User::new(1, "alice".into(), "oauth-alice".into(), "key".into(), String::new());
        user.record_contributions(40, 1.0);
        let snapshot = Snapshot {
            users: vec![User::new_anonymous(), user],
            servers: vec![],
            stats: Stats::default(),
        };
        snapshot.write_to(dir.path()).unwrap();

        let state = load(dir.path()).unwrap();
        assert_eq!(state.users.len(), 2);
        let alice = state.users.get(&"oauth-alice".to_string()).unwrap();
        assert_eq!(alice.kudos, 1.0);
        assert_eq!(state.last_user_id, 1);
    }
}
