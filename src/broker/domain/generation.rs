//! A single dispatched iteration of a prompt (ProcessingGeneration).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the `n` independent completions a prompt requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    pub id: Uuid,
    pub prompt_id: Uuid,
    pub worker_id: Uuid,
    /// Snapshotted at spawn, in case the worker switches models mid-flight.
    pub model: String,
    pub generation: Option<String>,
    pub start_time: DateTime<Utc>,
}

impl Generation {
    pub fn new(prompt_id: Uuid, worker_id: Uuid, model: String, start_time: DateTime<Utc>) -> Self {
        Generation {
            id: Uuid::new_v4(),
            prompt_id,
            worker_id,
            model,
            generation: None,
            start_time,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.generation.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Stores the text if not already completed. Returns the char count, or
    /// `None` if this generation was already completed (no-op, per spec).
    pub fn set_generation(&mut self, text: String) -> Option<u64> {
        if self.is_completed() {
            return None;
        }
        let chars = text.chars().count() as u64;
        self.generation = Some(text);
        Some(chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_generation_is_a_noop_once_completed() {
        let mut g = Generation::new(Uuid::new_v4(), Uuid::new_v4(), "M".into(), Utc::now());
        assert_eq!(g.set_generation("hello world".into()), Some(11));
        assert_eq!(g.set_generation("ignored".into()), None);
        assert_eq!(g.generation.as_deref(), Some("hello world"));
    }
}
