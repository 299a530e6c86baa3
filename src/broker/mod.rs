//! The matching-and-accounting engine. This is the core the rest of the
//! crate (config, storage, http) is built around — everything else is
//! ambient plumbing.

pub mod dispatch;
pub mod domain;
pub mod error;
pub mod janitor;
pub mod kudos;
pub mod matcher;
pub mod store;

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use dispatch::DispatchRecord;
use domain::{Generation, Prompt};
use error::BrokerError;
use kudos::ModelRegistry;
use matcher::MatchOutcome;
use store::Store;

/// Status snapshot for a prompt, mirroring the original's `get_status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PromptStatus {
    pub waiting: u32,
    pub finished: u32,
    pub processing: u32,
    pub done: bool,
    pub generations: Vec<FinishedGeneration>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FinishedGeneration {
    pub text: String,
    pub worker_id: Uuid,
    pub worker_name: String,
}

/// Facade over the store, matcher and kudos economy. Cheaply cloneable —
/// holds only `Arc`s, matching the teacher's `ProxyState`/`SharedState` shape.
#[derive(Clone)]
pub struct Broker {
    pub store: Arc<Store>,
    pub registry: Arc<dyn ModelRegistry>,
}

impl Broker {
    pub fn new(store: Arc<Store>, registry: Arc<dyn ModelRegistry>) -> Self {
        Broker { store, registry }
    }

    /// Constructs a prompt and, if at least one live worker could ever match
    /// it, activates (registers) it. Returns `NoEligibleWorker` otherwise —
    /// this lets the HTTP layer answer "no workers available" synchronously,
    /// per `spec.md` §4.4's separation of construction from activation.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_prompt(
        &self,
        user_oauth_id: &str,
        prompt_text: String,
        models: Vec<String>,
        params: Value,
        n: u32,
        max_length: u32,
        max_content_length: u32,
        softprompts: Vec<String>,
        servers: Vec<Uuid>,
    ) -> Result<Uuid, BrokerError> {
        let now = Utc::now();
        let mut guard = self.store.lock();
        let alias = guard
            .users
            .get(&user_oauth_id.to_string())
            .ok_or(BrokerError::UnknownUser)?
            .unique_alias();

        let mut draft = Prompt::new(
            user_oauth_id.to_string(),
            &alias,
            prompt_text,
            models,
            params,
            n,
            max_length,
            max_content_length,
            softprompts,
            servers,
            now,
        );

        let has_eligible_worker = guard
            .workers
            .values()
            .filter(|w| !w.is_stale(now))
            .any(|w| matches!(matcher::can_generate(w, &draft), MatchOutcome::Match { .. }));

        if !has_eligible_worker {
            return Err(BrokerError::NoEligibleWorker);
        }

        let id = draft.id;
        draft.sequence = guard.next_prompt_sequence();
        info!("New prompt request by user: {}", alias);
        guard.prompts.add(id, draft);
        Ok(id)
    }

    /// Worker check-in followed immediately by a dispatch attempt — the two
    /// happen under one lock acquisition, satisfying the "matching a worker"
    /// atom in `spec.md` §5.
    #[allow(clippy::too_many_arguments)]
    pub fn check_in(
        &self,
        worker_name: &str,
        owner_oauth_id: &str,
        model: String,
        max_length: u32,
        max_content_length: u32,
        softprompts: Vec<String>,
    ) -> Result<Option<DispatchRecord>, BrokerError> {
        // Model multiplier lookup may hit an external collaborator; never
        // do that while holding the store lock (spec.md §5).
        let multiplier = kudos::model_multiplier(&self.store, self.registry.as_ref(), &model);

        let now = Utc::now();
        let mut guard = self.store.lock();

        if guard.find_user_by_oauth_id(owner_oauth_id).is_none() {
            return Err(BrokerError::UnknownUser);
        }

        let is_new = guard.workers.get(&worker_name.to_string()).is_none();
        if is_new {
            info!("New server checked-in: {} by {}", worker_name, owner_oauth_id);
            guard.workers.add(
                worker_name.to_string(),
                domain::Worker::new(
                    worker_name.to_string(),
                    owner_oauth_id.to_string(),
                    model.clone(),
                    max_length,
                    max_content_length,
                    softprompts.clone(),
                ),
            );
        }

        let reward = guard
            .workers
            .get_mut(&worker_name.to_string())
            .expect("just inserted or already present")
            .check_in(now, model, max_length, max_content_length, softprompts, multiplier);

        if let Some(kudos) = reward {
            debug!("server '{}' received {} kudos for uptime reward", worker_name, kudos);
            if let Some(user) = guard.users.get_mut(&owner_oauth_id.to_string()) {
                user.record_uptime(kudos);
            }
        }

        let worker = guard.workers.get(&worker_name.to_string()).unwrap().clone();
        let order = guard.pending_by_priority();

        for prompt_id in order {
            let prompt = match guard.prompts.get(&prompt_id) {
                Some(p) => p,
                None => continue,
            };
            if let MatchOutcome::Match { matching_softprompt } = matcher::can_generate(&worker, prompt) {
                let generation = Generation::new(prompt_id, worker.id, worker.model.clone(), now);
                let generation_id = generation.id;
                let payload = guard
                    .prompts
                    .get(&prompt_id)
                    .unwrap()
                    .dispatch_payload(&matching_softprompt, generation_id);

                guard.generations.add(generation_id, generation);
                let prompt = guard.prompts.get_mut(&prompt_id).unwrap();
                prompt.processing_gens.push(generation_id);
                prompt.n -= 1;
                prompt.refresh(now);

                return Ok(Some(DispatchRecord {
                    payload,
                    softprompt: matching_softprompt,
                    id: generation_id,
                }));
            }
        }

        Ok(None)
    }

    /// A worker posts back generated text for a Generation id.
    pub fn submit_generation(&self, generation_id: Uuid, text: String) -> Result<u64, BrokerError> {
        let model = {
            let guard = self.store.lock();
            guard
                .generations
                .get(&generation_id)
                .ok_or(BrokerError::StaleDispatch)?
                .model
                .clone()
        };

        let multiplier = kudos::model_multiplier(&self.store, self.registry.as_ref(), &model);
        let now = Utc::now();
        let mut guard = self.store.lock();

        let (prompt_id, worker_id, chars) = {
            let generation = guard
                .generations
                .get_mut(&generation_id)
                .ok_or(BrokerError::StaleDispatch)?;
            let chars = match generation.set_generation(text) {
                Some(chars) => chars,
                None => return Ok(0), // already completed: no-op
            };
            (generation.prompt_id, generation.worker_id, chars)
        };

        let kudos_amount = kudos::convert_chars_to_kudos(chars, multiplier);
        let start_time = guard.generations.get(&generation_id).unwrap().start_time;
        let seconds = (now - start_time).num_seconds().max(1) as u64;

        let worker_name = guard
            .workers
            .values()
            .find(|w| w.id == worker_id)
            .map(|w| w.name.clone());

        let mut perf = 0.0;
        if let Some(name) = &worker_name {
            if let Some(worker) = guard.workers.get_mut(name) {
                perf = worker.record_contribution(chars, kudos_amount, seconds);
                let owner_oauth_id = worker.owner_oauth_id.clone();
                if let Some(user) = guard.users.get_mut(&owner_oauth_id) {
                    user.record_contributions(chars, kudos_amount);
                }
            }
        }
        guard.stats.record_fulfilment(perf);

        if let Some(prompt) = guard.prompts.get_mut(&prompt_id) {
            prompt.record_usage(chars, now);
            let user_oauth_id = prompt.user_oauth_id.clone();
            if let Some(user) = guard.users.get_mut(&user_oauth_id) {
                user.record_usage(chars, kudos_amount);
            }
        }

        info!("New Generation worth {} kudos, delivered by server: {:?}", kudos_amount, worker_name);
        Ok(chars)
    }

    pub fn status(&self, prompt_id: Uuid) -> Option<PromptStatus> {
        let guard = self.store.lock();
        let prompt = guard.prompts.get(&prompt_id)?;

        let mut finished = 0u32;
        let mut processing = 0u32;
        let mut generations = Vec::new();
        for gen_id in &prompt.processing_gens {
            if let Some(gen) = guard.generations.get(gen_id) {
                if gen.is_completed() {
                    finished += 1;
                    let worker_name = guard
                        .workers
                        .values()
                        .find(|w| w.id == gen.worker_id)
                        .map(|w| w.name.clone())
                        .unwrap_or_default();
                    generations.push(FinishedGeneration {
                        text: gen.generation.clone().unwrap_or_default(),
                        worker_id: gen.worker_id,
                        worker_name,
                    });
                } else {
                    processing += 1;
                }
            }
        }

        Some(PromptStatus {
            waiting: prompt.n,
            finished,
            processing,
            done: !prompt.needs_gen() && guard.is_prompt_completed_pub(&prompt_id),
            generations,
        })
    }

    pub fn transfer_kudos(&self, src_oauth_id: &str, dst_oauth_id: &str, amount: f64) -> Result<f64, BrokerError> {
        kudos::transfer(&self.store, src_oauth_id, dst_oauth_id, amount)
    }
}
