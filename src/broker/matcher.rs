//! C5: pairs a checking-in worker with the highest-priority prompt it can serve.

use super::domain::{Prompt, Worker};

/// Why a worker was skipped for a given prompt, for observability only —
/// it is the *last* failing check in the enumeration order below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkippedReason {
    ServerId,
    Models,
    MaxContentLength,
    MaxLength,
    MatchingSoftprompt,
}

impl SkippedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkippedReason::ServerId => "server_id",
            SkippedReason::Models => "models",
            SkippedReason::MaxContentLength => "max_content_length",
            SkippedReason::MaxLength => "max_length",
            SkippedReason::MatchingSoftprompt => "matching_softprompt",
        }
    }
}

/// Outcome of `can_generate`: either a match (with the soft-prompt the
/// worker should be told to apply) or the last-failing reason.
pub enum MatchOutcome {
    Match { matching_softprompt: String },
    Skip(SkippedReason),
}

/// `W.can_generate(P)`: five checks in order, soft-prompt match is last.
pub fn can_generate(worker: &Worker, prompt: &Prompt) -> MatchOutcome {
    let mut reason = None;

    if !prompt.servers.is_empty() && !prompt.servers.contains(&worker.id) {
        reason = Some(SkippedReason::ServerId);
    }
    if !prompt.models.is_empty() && !prompt.models.contains(&worker.model) {
        reason = Some(SkippedReason::Models);
    }
    if worker.max_content_length < prompt.max_content_length {
        reason = Some(SkippedReason::MaxContentLength);
    }
    if worker.max_length < prompt.max_length {
        reason = Some(SkippedReason::MaxLength);
    }

    let mut matching_softprompt = None;
    'outer: for sp in &prompt.softprompts {
        if sp.is_empty() {
            matching_softprompt = Some(String::new());
            break;
        }
        for sp_name in &worker.softprompts {
            if sp_name.contains(sp.as_str()) {
                matching_softprompt = Some(sp.clone());
                break 'outer;
            }
        }
    }
    if matching_softprompt.is_none() {
        reason = Some(SkippedReason::MatchingSoftprompt);
    }

    match reason {
        Some(r) => MatchOutcome::Skip(r),
        None => MatchOutcome::Match {
            matching_softprompt: matching_softprompt.unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn prompt_with_softprompts(sp: Vec<String>) -> Prompt {
        Prompt::new(
            "oauth-alice".into(), "alice#1", "hi".into(), vec![], serde_json::json!({}),
            1, 80, 1024, sp, vec![], Utc::now(),
        )
    }

    fn worker_with_softprompts(sp: Vec<String>) -> Worker {
        Worker::new("bob".into(), "oauth-bob".into(), "M".into(), 80, 1024, sp)
    }

    #[test]
    fn empty_softprompt_entry_always_matches() {
        let prompt = prompt_with_softprompts(vec![String::new()]);
        let worker = worker_with_softprompts(vec!["neutral".into()]);
        match can_generate(&worker, &prompt) {
            MatchOutcome::Match { matching_softprompt } => assert_eq!(matching_softprompt, ""),
            MatchOutcome::Skip(_) => panic!("expected match"),
        }
    }

    #[test]
    fn softprompt_substring_match() {
        let prompt = prompt_with_softprompts(vec!["story_".into()]);
        let worker = worker_with_softprompts(vec!["story_v3".into(), "chat_v1".into()]);
        match can_generate(&worker, &prompt) {
            MatchOutcome::Match { matching_softprompt } => assert_eq!(matching_softprompt, "story_"),
            MatchOutcome::Skip(_) => panic!("expected match"),
        }
    }

    #[test]
    fn softprompt_mismatch_is_reported() {
        let prompt = prompt_with_softprompts(vec!["xyz".into()]);
        let worker = worker_with_softprompts(vec!["story_v3".into(), "chat_v1".into()]);
        match can_generate(&worker, &prompt) {
            MatchOutcome::Skip(reason) => assert_eq!(reason.as_str(), "matching_softprompt"),
            MatchOutcome::Match { .. } => panic!("expected skip"),
        }
    }

    #[test]
    fn max_length_check_reports_last_failing_reason() {
        let mut prompt = prompt_with_softprompts(vec![String::new()]);
        prompt.max_length = 200;
        let worker = worker_with_softprompts(vec!["neutral".into()]);
        match can_generate(&worker, &prompt) {
            MatchOutcome::Skip(reason) => assert_eq!(reason.as_str(), "max_length"),
            MatchOutcome::Match { .. } => panic!("expected skip"),
        }
    }

    #[test]
    fn server_filter_restricts_to_pinned_worker() {
        let mut prompt = prompt_with_softprompts(vec![String::new()]);
        prompt.servers = vec![Uuid::new_v4()];
        let worker = worker_with_softprompts(vec!["neutral".into()]);
        match can_generate(&worker, &prompt) {
            MatchOutcome::Skip(reason) => assert_eq!(reason.as_str(), "server_id"),
            MatchOutcome::Match { .. } => panic!("expected skip"),
        }
    }
}
