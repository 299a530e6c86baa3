//! Worker record: capability declaration, performance history, liveness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::user::round2;

/// A worker is stale once this many seconds pass without a check-in.
pub const STALE_AFTER_SECS: i64 = 300;
/// Uptime kudos are rewarded every time this many uptime-seconds accrue.
pub const UPTIME_REWARD_THRESHOLD_SECS: u64 = 600;
/// Rolling performance/fulfilment-time windows are capped at this length.
pub const MAX_PERFORMANCES: usize = 20;

/// A generation worker, owned by a [`User`](super::user::User) by `oauth_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub name: String,
    /// `oauth_id` of the owning user; resolved through the user index on load.
    #[serde(rename = "oauth_id")]
    pub owner_oauth_id: String,
    pub model: String,
    pub max_length: u32,
    pub max_content_length: u32,
    pub softprompts: Vec<String>,
    pub contributions: u64,
    pub fulfilments: u64,
    pub kudos: f64,
    pub kudos_details: HashMap<String, f64>,
    /// Chars-per-second, most recent [`MAX_PERFORMANCES`] only.
    pub performances: Vec<f64>,
    pub uptime: u64,
    #[serde(with = "crate::storage::timestamp::option")]
    pub last_check_in: Option<DateTime<Utc>>,
    /// Not part of the persisted schema; resets to 0 on every reload, same as
    /// the original's `__init__`.
    #[serde(skip, default)]
    pub last_reward_uptime: u64,
}

impl Worker {
    pub fn new(name: String, owner_oauth_id: String, model: String, max_length: u32, max_content_length: u32, softprompts: Vec<String>) -> Self {
        Worker {
            id: Uuid::new_v4(),
            name,
            owner_oauth_id,
            model,
            max_length,
            max_content_length,
            softprompts,
            contributions: 0,
            fulfilments: 0,
            kudos: 0.0,
            kudos_details: HashMap::new(),
            performances: Vec::new(),
            uptime: 0,
            last_check_in: None,
            last_reward_uptime: 0,
        }
    }

    /// No check-in has ever occurred, or none within [`STALE_AFTER_SECS`].
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_check_in {
            None => true,
            Some(last) => (now - last).num_seconds() > STALE_AFTER_SECS,
        }
    }

    /// Outcome of a check-in: whether an uptime-kudos reward was granted, and
    /// how much, so the caller can credit the owning user outside the lock
    /// boundary the reward calculation doesn't actually need to cross.
    pub fn check_in(
        &mut self,
        now: DateTime<Utc>,
        model: String,
        max_length: u32,
        max_content_length: u32,
        softprompts: Vec<String>,
        model_multiplier: f64,
    ) -> Option<f64> {
        let mut reward = None;
        if !self.is_stale(now) {
            let elapsed = (now - self.last_check_in.expect("checked not stale")).num_seconds().max(0) as u64;
            self.uptime += elapsed;
            if self.uptime.saturating_sub(self.last_reward_uptime) > UPTIME_REWARD_THRESHOLD_SECS {
                let kudos = round2(model_multiplier / 2.75);
                self.modify_kudos(kudos, "uptime");
                self.last_reward_uptime = self.uptime;
                reward = Some(kudos);
            }
        } else {
            // Coming back from stale: don't grant uptime for the silent gap,
            // but restart the 10-minute reward clock from now.
            self.last_reward_uptime = self.uptime;
        }
        self.last_check_in = Some(now);
        self.model = model;
        self.max_length = max_length;
        self.max_content_length = max_content_length;
        self.softprompts = softprompts;
        reward
    }

    /// `kudos := round(kudos + delta, 2)`; `generated`/`uptime` are volume
    /// counters and always receive the absolute value.
    pub fn modify_kudos(&mut self, delta: f64, action: &str) {
        self.kudos = round2(self.kudos + delta);
        let entry = self.kudos_details.entry(action.to_string()).or_insert(0.0);
        *entry = round2(*entry + delta.abs());
    }

    /// Record a completed generation's contribution: perf sample, kudos, counters.
    pub fn record_contribution(&mut self, chars: u64, kudos: f64, seconds: u64) -> f64 {
        let seconds = seconds.max(1);
        let perf = ((chars as f64 / seconds as f64) * 10.0).round() / 10.0;
        self.performances.push(perf);
        if self.performances.len() > MAX_PERFORMANCES {
            self.performances.remove(0);
        }
        self.modify_kudos(kudos, "generated");
        self.contributions += chars;
        self.fulfilments += 1;
        perf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn worker() -> Worker {
        Worker::new("bob".into(), "oauth-bob".into(), "M".into(), 80, 1024, vec!["neutral".into()])
    }

    #[test]
    fn never_checked_in_is_stale() {
        let w = worker();
        assert!(w.is_stale(Utc::now()));
    }

    #[test]
    fn stale_beyond_threshold() {
        let mut w = worker();
        let t0 = Utc::now();
        w.check_in(t0, "M".into(), 80, 1024, vec![], 1.0);
        assert!(!w.is_stale(t0 + Duration::seconds(299)));
        assert!(w.is_stale(t0 + Duration::seconds(301)));
    }

    #[test]
    fn uptime_reward_granted_once_past_605_seconds() {
        // Seed scenario 5: multiplier 2.75, checking in every 30s for 605s.
        let mut w = worker();
        let t0 = Utc::now();
        w.check_in(t0, "M".into(), 80, 1024, vec![], 2.75);
        let mut t = t0;
        let mut rewards = vec![];
        let mut elapsed = 0;
        while elapsed < 605 {
            t += Duration::seconds(30);
            elapsed += 30;
            if let Some(r) = w.check_in(t, "M".into(), 80, 1024, vec![], 2.75) {
                rewards.push(r);
            }
        }
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0], 1.00);
        assert_eq!(w.last_reward_uptime, w.uptime);
    }

    #[test]
    fn performances_capped_at_20() {
        let mut w = worker();
        for _ in 0..25 {
            w.record_contribution(100, 1.0, 1);
        }
        assert_eq!(w.performances.len(), MAX_PERFORMANCES);
    }

    #[test]
    fn coming_back_from_stale_resets_reward_clock_without_granting_uptime() {
        let mut w = worker();
        let t0 = Utc::now();
        w.check_in(t0, "M".into(), 80, 1024, vec![], 1.0);
        let t1 = t0 + Duration::seconds(1000);
        let reward = w.check_in(t1, "M".into(), 80, 1024, vec![], 1.0);
        assert!(reward.is_none());
        assert_eq!(w.uptime, 0);
        assert_eq!(w.last_reward_uptime, 0);
    }
}
