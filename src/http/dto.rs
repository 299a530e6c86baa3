//! Request/response bodies for the HTTP surface. Thin wire shapes only —
//! the domain types in `crate::broker::domain` are the source of truth.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub prompt: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default = "default_n")]
    pub n: u32,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_max_content_length")]
    pub max_content_length: u32,
    #[serde(default)]
    pub softprompts: Vec<String>,
    #[serde(default)]
    pub servers: Vec<Uuid>,
}

fn default_n() -> u32 {
    1
}
fn default_max_length() -> u32 {
    80
}
fn default_max_content_length() -> u32 {
    1024
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FinishedGenerationDto {
    pub text: String,
    pub worker_id: Uuid,
    pub worker_name: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub done: bool,
    pub waiting: u32,
    pub processing: u32,
    pub finished: u32,
    pub generations: Vec<FinishedGenerationDto>,
}

#[derive(Debug, Deserialize)]
pub struct PopRequest {
    pub name: String,
    pub model: String,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_max_content_length")]
    pub max_content_length: u32,
    #[serde(default)]
    pub softprompts: Vec<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct PopResponse {
    pub payload: Option<serde_json::Value>,
    pub softprompt: Option<String>,
    pub id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitGenerationRequest {
    pub generation: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitGenerationResponse {
    pub chars: u64,
}

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Deserialize)]
pub struct KudosTransferRequest {
    pub username: String,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct KudosTransferResponse {
    pub transferred: f64,
}
