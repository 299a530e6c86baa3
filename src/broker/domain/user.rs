//! User ledger: kudos balance, contribution/usage counters, identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const ANONYMOUS_OAUTH_ID: &str = "anon";
pub const ANONYMOUS_API_KEY: &str = "0000000000";
pub const ANONYMOUS_USERNAME: &str = "Anonymous";

/// Character/request counters for kudos debited on generation consumption.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub chars: u64,
    pub requests: u64,
}

/// Character/fulfilment counters for kudos credited on generation fulfilment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contributions {
    pub chars: u64,
    pub fulfillments: u64,
}

/// A registered (or anonymous) user of the brokerage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub oauth_id: String,
    pub api_key: String,
    pub invite_id: String,
    #[serde(with = "crate::storage::timestamp")]
    pub creation_date: DateTime<Utc>,
    #[serde(with = "crate::storage::timestamp")]
    pub last_active: DateTime<Utc>,
    pub kudos: f64,
    pub kudos_details: HashMap<String, f64>,
    pub contributions: Contributions,
    pub usage: Usage,
}

impl User {
    /// The distinguished anonymous user: `id == 0`, `oauth_id == "anon"`.
    pub fn new_anonymous() -> Self {
        let now = Utc::now();
        User {
            id: 0,
            username: ANONYMOUS_USERNAME.to_string(),
            oauth_id: ANONYMOUS_OAUTH_ID.to_string(),
            api_key: ANONYMOUS_API_KEY.to_string(),
            invite_id: String::new(),
            creation_date: now,
            last_active: now,
            kudos: 0.0,
            kudos_details: HashMap::new(),
            contributions: Contributions::default(),
            usage: Usage::default(),
        }
    }

    pub fn new(id: u64, username: String, oauth_id: String, api_key: String, invite_id: String) -> Self {
        let now = Utc::now();
        User {
            id,
            username,
            oauth_id,
            api_key,
            invite_id,
            creation_date: now,
            last_active: now,
            kudos: 0.0,
            kudos_details: HashMap::new(),
            contributions: Contributions::default(),
            usage: Usage::default(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.oauth_id == ANONYMOUS_OAUTH_ID
    }

    /// `username#id`, unique across the broker.
    pub fn unique_alias(&self) -> String {
        format!("{}#{}", self.username, self.id)
    }

    /// Debit kudos for consuming a generation.
    pub fn record_usage(&mut self, chars: u64, kudos: f64) {
        self.usage.chars += chars;
        self.usage.requests += 1;
        self.modify_kudos(-kudos, "accumulated");
    }

    /// Credit kudos for fulfilling a generation (via an owned worker).
    pub fn record_contributions(&mut self, chars: u64, kudos: f64) {
        self.contributions.chars += chars;
        self.contributions.fulfillments += 1;
        self.modify_kudos(kudos, "accumulated");
    }

    /// Credit kudos for a worker's uptime reward.
    pub fn record_uptime(&mut self, kudos: f64) {
        self.modify_kudos(kudos, "accumulated");
    }

    /// `kudos := round(kudos + delta, 2)`. `accumulated` carries the signed delta
    /// (it is a balance and can go negative); `gifted`/`received` carry the
    /// absolute value (they are volume counters). This asymmetry is deliberate.
    pub fn modify_kudos(&mut self, delta: f64, action: &str) {
        self.kudos = round2(self.kudos + delta);
        let detail_delta = if action == "accumulated" { delta } else { delta.abs() };
        let entry = self.kudos_details.entry(action.to_string()).or_insert(0.0);
        *entry = round2(*entry + detail_delta);
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_user_has_fixed_identity() {
        let anon = User::new_anonymous();
        assert_eq!(anon.id, 0);
        assert_eq!(anon.oauth_id, ANONYMOUS_OAUTH_ID);
        assert_eq!(anon.api_key, ANONYMOUS_API_KEY);
        assert!(anon.is_anonymous());
    }

    #[test]
    fn record_usage_debits_accumulated_and_can_go_negative() {
        let mut user = User::new(1, "alice".into(), "oauth-alice".into(), "key".into(), String::new());
        user.record_usage(100, 5.0);
        assert_eq!(user.usage.chars, 100);
        assert_eq!(user.usage.requests, 1);
        assert_eq!(user.kudos, -5.0);
        assert_eq!(user.kudos_details["accumulated"], -5.0);
    }

    #[test]
    fn gifted_and_received_are_volume_counters_not_balances() {
        let mut user = User::new(1, "alice".into(), "oauth-alice".into(), "key".into(), String::new());
        user.modify_kudos(-10.0, "gifted");
        assert_eq!(user.kudos, -10.0);
        // gifted tracks volume, always positive, even though the balance went down.
        assert_eq!(user.kudos_details["gifted"], 10.0);
    }

    #[test]
    fn kudos_invariant_matches_signed_ledger_sum() {
        let mut user = User::new(1, "alice".into(), "oauth-alice".into(), "key".into(), String::new());
        user.record_contributions(40, 1.234);
        user.record_usage(10, 0.5);
        user.record_uptime(0.33);
        // P1: kudos equals the rounded signed sum of all ledger events.
        let expected = round2(round2(1.234) - round2(0.5) + round2(0.33));
        assert!((user.kudos - expected).abs() < 0.011);
    }
}
