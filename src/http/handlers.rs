//! Thin axum handlers: parse/validate, call into `Broker`, map errors.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use uuid::Uuid;

use crate::broker::domain::user::ANONYMOUS_OAUTH_ID;
use crate::broker::Broker;

use super::dto::*;
use super::error::ApiError;

/// Resolves the caller's `oauth_id` from the `apikey` header, the way the
/// original Horde server resolves `kai_api_key` on every request. Falls back
/// to the anonymous user when no key is given.
fn resolve_oauth_id(broker: &Broker, headers: &HeaderMap) -> Result<String, ApiError> {
    let Some(key) = headers.get("apikey").and_then(|v| v.to_str().ok()) else {
        return Ok(ANONYMOUS_OAUTH_ID.to_string());
    };
    let guard = broker.store.lock();
    guard
        .find_user_by_api_key(key)
        .map(|u| u.oauth_id.clone())
        .ok_or(ApiError(crate::broker::error::BrokerError::UnknownUser))
}

pub async fn submit_async(
    State(broker): State<Broker>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let oauth_id = resolve_oauth_id(&broker, &headers)?;
    let id = broker.submit_prompt(
        &oauth_id,
        req.prompt,
        req.models,
        req.params,
        req.n,
        req.max_length,
        req.max_content_length,
        req.softprompts,
        req.servers,
    )?;
    Ok(Json(SubmitResponse { id }))
}

pub async fn status(
    State(broker): State<Broker>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let status = broker
        .status(id)
        .ok_or(ApiError(crate::broker::error::BrokerError::StaleDispatch))?;

    Ok(Json(StatusResponse {
        done: status.done,
        waiting: status.waiting,
        processing: status.processing,
        finished: status.finished,
        generations: status
            .generations
            .into_iter()
            .map(|g| FinishedGenerationDto {
                text: g.text,
                worker_id: g.worker_id,
                worker_name: g.worker_name,
            })
            .collect(),
    }))
}

pub async fn pop(
    State(broker): State<Broker>,
    headers: HeaderMap,
    Json(req): Json<PopRequest>,
) -> Result<Json<PopResponse>, ApiError> {
    let oauth_id = resolve_oauth_id(&broker, &headers)?;
    let dispatch = broker.check_in(
        &req.name,
        &oauth_id,
        req.model,
        req.max_length,
        req.max_content_length,
        req.softprompts,
    )?;

    Ok(Json(match dispatch {
        Some(record) => PopResponse {
            payload: Some(record.payload),
            softprompt: Some(record.softprompt),
            id: Some(record.id),
        },
        None => PopResponse::default(),
    }))
}

pub async fn submit_generation(
    State(broker): State<Broker>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitGenerationRequest>,
) -> Result<Json<SubmitGenerationResponse>, ApiError> {
    let chars = broker.submit_generation(id, req.generation)?;
    Ok(Json(SubmitGenerationResponse { chars }))
}

pub async fn models(State(broker): State<Broker>) -> Json<ModelsResponse> {
    let now = chrono::Utc::now();
    let guard = broker.store.lock();
    let models = guard
        .available_models(now)
        .into_iter()
        .map(|(name, count)| ModelEntry { name, count })
        .collect();
    Json(ModelsResponse { models })
}

pub async fn kudos_transfer(
    State(broker): State<Broker>,
    headers: HeaderMap,
    Json(req): Json<KudosTransferRequest>,
) -> Result<Json<KudosTransferResponse>, ApiError> {
    let src_oauth_id = resolve_oauth_id(&broker, &headers)?;
    let dst_oauth_id = {
        let guard = broker.store.lock();
        guard
            .find_user_by_username(&req.username)
            .map(|u| u.oauth_id.clone())
            .ok_or(ApiError(crate::broker::error::BrokerError::UnknownUser))?
    };
    let transferred = broker.transfer_kudos(&src_oauth_id, &dst_oauth_id, req.amount)?;
    Ok(Json(KudosTransferResponse { transferred }))
}
