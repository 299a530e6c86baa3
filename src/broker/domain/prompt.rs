//! The queued work-unit a caller submits (WaitingPrompt).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// `n` above this is clamped at construction (see `spec.md` §4.4).
pub const MAX_ITERATIONS: u32 = 20;
/// A prompt with no activity for this long is stale and gets evicted.
pub const STALE_AFTER_SECS: i64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: Uuid,
    pub user_oauth_id: String,
    pub prompt: String,
    /// Empty ⇒ any model is acceptable.
    pub models: Vec<String>,
    /// Opaque generation parameters forwarded to the worker, always with `n := 1`.
    pub params: serde_json::Value,
    /// Remaining iterations to dispatch.
    pub n: u32,
    pub max_length: u32,
    pub max_content_length: u32,
    /// Empty string entry ⇒ "no soft-prompt acceptable".
    pub softprompts: Vec<String>,
    /// Empty ⇒ any worker id is acceptable.
    pub servers: Vec<Uuid>,
    pub processing_gens: Vec<Uuid>,
    pub total_usage: u64,
    pub last_process_time: DateTime<Utc>,
    /// Monotonic insertion order, assigned by the store at submit time. Used
    /// only to break kudos ties in priority order; `last_process_time` is
    /// refreshed on every dispatch and so cannot serve as a stable tie-break.
    #[serde(default)]
    pub sequence: u64,
}

#[allow(clippy::too_many_arguments)]
impl Prompt {
    pub fn new(
        user_oauth_id: String,
        user_alias: &str,
        prompt: String,
        models: Vec<String>,
        mut params: serde_json::Value,
        requested_n: u32,
        max_length: u32,
        max_content_length: u32,
        softprompts: Vec<String>,
        servers: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let n = if requested_n > MAX_ITERATIONS {
            warn!(
                "User {} requested {} gens per action. Reducing to {}...",
                user_alias, requested_n, MAX_ITERATIONS
            );
            MAX_ITERATIONS
        } else {
            requested_n
        };

        if let serde_json::Value::Object(ref mut map) = params {
            map.insert("n".to_string(), serde_json::json!(1));
            map.insert("prompt".to_string(), serde_json::json!(prompt));
        }

        Prompt {
            id: Uuid::new_v4(),
            user_oauth_id,
            prompt,
            models,
            params,
            n,
            max_length,
            max_content_length,
            softprompts: if softprompts.is_empty() { vec![String::new()] } else { softprompts },
            servers,
            processing_gens: Vec::new(),
            total_usage: 0,
            last_process_time: now,
            sequence: 0,
        }
    }

    pub fn needs_gen(&self) -> bool {
        self.n > 0
    }

    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.last_process_time = now;
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_process_time).num_seconds() > STALE_AFTER_SECS
    }

    pub fn record_usage(&mut self, chars: u64, now: DateTime<Utc>) {
        self.total_usage += chars;
        self.refresh(now);
    }

    /// `{payload, softprompt, id}`, the dispatch record handed to a worker.
    pub fn dispatch_payload(&self, matching_softprompt: &str, generation_id: Uuid) -> serde_json::Value {
        serde_json::json!({
            "payload": self.params,
            "softprompt": matching_softprompt,
            "id": generation_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(requested_n: u32) -> Prompt {
        Prompt::new(
            "oauth-alice".into(),
            "alice#1",
            "hello".into(),
            vec![],
            serde_json::json!({}),
            requested_n,
            80,
            1024,
            vec![],
            vec![],
            Utc::now(),
        )
    }

    #[test]
    fn n_is_clamped_to_20() {
        let p = make(50);
        assert_eq!(p.n, 20);
    }

    #[test]
    fn n_under_cap_is_unchanged() {
        let p = make(3);
        assert_eq!(p.n, 3);
    }

    #[test]
    fn payload_always_forces_n_to_1() {
        let p = make(3);
        assert_eq!(p.params["n"], serde_json::json!(1));
        assert_eq!(p.params["prompt"], serde_json::json!("hello"));
    }

    #[test]
    fn empty_softprompts_means_no_softprompt_acceptable() {
        let p = make(1);
        assert_eq!(p.softprompts, vec![String::new()]);
    }
}
