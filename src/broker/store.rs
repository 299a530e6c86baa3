//! C1: the four in-memory indexes, and the coarse lock that serialises the
//! composite operations the concurrency model requires to be atomic
//! (matching, generation submission, kudos transfer, snapshotting).
//!
//! All mutation goes through `Store`; nothing outside this module touches
//! the tables directly (`spec.md` §4.1: "no direct map access from elsewhere").

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::domain::{Generation, Prompt, Stats, User, Worker};

/// A generic associative table keyed by `K`.
#[derive(Debug, Default)]
pub struct Index<K, V> {
    items: HashMap<K, V>,
}

impl<K: Eq + Hash + Clone, V> Index<K, V> {
    pub fn new() -> Self {
        Index { items: HashMap::new() }
    }

    pub fn add(&mut self, key: K, item: V) {
        self.items.insert(key, item);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.items.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.items.get_mut(key)
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        self.items.remove(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// The four indexes plus broker-wide stats, all behind one lock.
pub struct StoreInner {
    pub users: Index<String, User>,
    pub workers: Index<String, Worker>,
    pub prompts: Index<Uuid, Prompt>,
    pub generations: Index<Uuid, Generation>,
    pub stats: Stats,
    /// Maximum `id` observed on load, plus the count of subsequently-created users.
    pub last_user_id: u64,
    pub allow_anonymous: bool,
    /// Monotonic counter handed out to newly-submitted prompts, so equal-kudos
    /// prompts keep stable insertion order in `pending_by_priority` even after
    /// `last_process_time` is refreshed by dispatch/usage.
    next_prompt_sequence: u64,
}

impl StoreInner {
    /// `oauth_id == "anon"` lookups return nothing when anonymous access is
    /// disabled at the broker level (spec.md §4.2).
    pub fn find_user_by_oauth_id(&self, oauth_id: &str) -> Option<&User> {
        if oauth_id == super::domain::user::ANONYMOUS_OAUTH_ID && !self.allow_anonymous {
            return None;
        }
        self.users.get(&oauth_id.to_string())
    }

    pub fn find_user_by_api_key(&self, api_key: &str) -> Option<&User> {
        self.users.values().find(|u| {
            u.api_key == api_key && (self.allow_anonymous || !u.is_anonymous())
        })
    }

    /// Parses `username#id`. Per `spec.md` §9 open question: the original's
    /// equivalent inverts the anonymous-disabled condition relative to the
    /// other two lookups (a bug). This crate applies the same rule as the
    /// other lookups for consistency — see DESIGN.md.
    pub fn find_user_by_username(&self, alias: &str) -> Option<&User> {
        let (name, id_str) = alias.rsplit_once('#')?;
        let id: u64 = id_str.parse().ok()?;
        self.users.values().find(|u| {
            u.username == name && u.id == id && (self.allow_anonymous || !u.is_anonymous())
        })
    }

    /// Hands out the next insertion-sequence number for a newly-submitted prompt.
    pub fn next_prompt_sequence(&mut self) -> u64 {
        self.next_prompt_sequence += 1;
        self.next_prompt_sequence
    }

    pub fn register_new_user(&mut self, mut user: User) -> u64 {
        self.last_user_id += 1;
        user.id = self.last_user_id;
        let oauth_id = user.oauth_id.clone();
        self.users.add(oauth_id, user);
        self.last_user_id
    }

    pub fn count_waiting_for(&self, user_oauth_id: &str) -> usize {
        self.prompts
            .values()
            .filter(|p| p.user_oauth_id == user_oauth_id && !self.is_prompt_completed(p))
            .count()
    }

    pub fn total_pending_iterations(&self) -> u64 {
        self.prompts.values().map(|p| p.n as u64).sum()
    }

    fn is_prompt_completed(&self, prompt: &Prompt) -> bool {
        if prompt.needs_gen() {
            return false;
        }
        prompt.processing_gens.iter().all(|gid| {
            self.generations.get(gid).is_some_and(|g| g.is_completed())
        })
    }

    pub fn is_prompt_completed_pub(&self, prompt_id: &Uuid) -> bool {
        self.prompts.get(prompt_id).is_some_and(|p| self.is_prompt_completed(p))
    }

    /// Prompts with `n > 0`, sorted by submitting user's kudos descending,
    /// ties broken by stable insertion order (HashMap iteration order is not
    /// insertion order, so we sort by a secondary key recorded at insert time).
    pub fn pending_by_priority(&self) -> Vec<Uuid> {
        let mut candidates: Vec<&Prompt> = self
            .prompts
            .values()
            .filter(|p| p.needs_gen())
            .collect();
        candidates.sort_by(|a, b| {
            let kudos_a = self.users.get(&a.user_oauth_id).map(|u| u.kudos).unwrap_or(0.0);
            let kudos_b = self.users.get(&b.user_oauth_id).map(|u| u.kudos).unwrap_or(0.0);
            kudos_b
                .partial_cmp(&kudos_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.sequence.cmp(&b.sequence))
        });
        candidates.into_iter().map(|p| p.id).collect()
    }

    /// Deletes a prompt and cascades to all of its generations.
    pub fn delete_prompt(&mut self, prompt_id: &Uuid) {
        if let Some(prompt) = self.prompts.delete(prompt_id) {
            for gen_id in &prompt.processing_gens {
                self.generations.delete(gen_id);
            }
        }
    }

    pub fn available_models(&self, now: DateTime<Utc>) -> HashMap<String, u64> {
        let mut out = HashMap::new();
        for worker in self.workers.values() {
            if worker.is_stale(now) {
                continue;
            }
            *out.entry(worker.model.clone()).or_insert(0) += 1;
        }
        out
    }

    pub fn count_active_workers(&self, now: DateTime<Utc>) -> usize {
        self.workers.values().filter(|w| !w.is_stale(now)).count()
    }
}

/// The shared, lockable store. A single coarse lock is acceptable given the
/// network-bound, low-write-rate workload (`spec.md` §5).
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl Store {
    pub fn new(allow_anonymous: bool) -> Self {
        Store {
            inner: Mutex::new(StoreInner {
                users: Index::new(),
                workers: Index::new(),
                prompts: Index::new(),
                generations: Index::new(),
                stats: Stats::default(),
                last_user_id: 0,
                allow_anonymous,
                next_prompt_sequence: 0,
            }),
        }
    }

    pub fn from_parts(
        users: Index<String, User>,
        workers: Index<String, Worker>,
        stats: Stats,
        last_user_id: u64,
        allow_anonymous: bool,
    ) -> Self {
        Store {
            inner: Mutex::new(StoreInner {
                users,
                workers,
                prompts: Index::new(),
                generations: Index::new(),
                stats,
                last_user_id,
                allow_anonymous,
                next_prompt_sequence: 0,
            }),
        }
    }

    /// Lock the whole store for the duration of one composite operation.
    /// Callers must never hold this guard across an `.await` point.
    pub fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::domain::User;

    #[test]
    fn pending_by_priority_orders_by_kudos_descending() {
        let store = Store::new(true);
        {
            let mut guard = store.lock();
            let mut alice = User::new(1, "alice".into(), "oauth-alice".into(), "k1".into(), String::new());
            alice.kudos = 5.0;
            let mut carol = User::new(2, "carol".into(), "oauth-carol".into(), "k2".into(), String::new());
            carol.kudos = 100.0;
            guard.users.add("oauth-alice".into(), alice);
            guard.users.add("oauth-carol".into(), carol);

            let t0 = Utc::now();
            let carol_prompt = Prompt::new(
                "oauth-carol".into(), "carol#2", "p1".into(), vec![], serde_json::json!({}),
                1, 80, 1024, vec![], vec![], t0,
            );
            let alice_prompt = Prompt::new(
                "oauth-alice".into(), "alice#1", "p2".into(), vec![], serde_json::json!({}),
                1, 80, 1024, vec![], vec![], t0 + chrono::Duration::seconds(1),
            );
            let carol_id = carol_prompt.id;
            let alice_id = alice_prompt.id;
            guard.prompts.add(carol_id, carol_prompt);
            guard.prompts.add(alice_id, alice_prompt);

            let order = guard.pending_by_priority();
            assert_eq!(order[0], carol_id);
            assert_eq!(order[1], alice_id);
        }
    }

    #[test]
    fn equal_kudos_prompts_keep_insertion_order_even_after_dispatch_refreshes_one() {
        let store = Store::new(true);
        let mut guard = store.lock();
        let dave = User::new(1, "dave".into(), "oauth-dave".into(), "k1".into(), String::new());
        guard.users.add("oauth-dave".into(), dave);

        let t0 = Utc::now();
        let mut first = Prompt::new(
            "oauth-dave".into(), "dave#1", "p1".into(), vec![], serde_json::json!({}),
            1, 80, 1024, vec![], vec![], t0,
        );
        first.sequence = guard.next_prompt_sequence();
        let mut second = Prompt::new(
            "oauth-dave".into(), "dave#1", "p2".into(), vec![], serde_json::json!({}),
            1, 80, 1024, vec![], vec![], t0,
        );
        second.sequence = guard.next_prompt_sequence();

        let first_id = first.id;
        let second_id = second.id;
        guard.prompts.add(first_id, first);
        guard.prompts.add(second_id, second);

        // Simulate `first` being dispatched/serviced, which refreshes its
        // `last_process_time` well past `second`'s — insertion order must
        // still win the tie, so `first` stays ahead of `second`.
        guard.prompts.get_mut(&first_id).unwrap().refresh(t0 + chrono::Duration::seconds(500));

        let order = guard.pending_by_priority();
        assert_eq!(order[0], first_id);
        assert_eq!(order[1], second_id);
    }
}
