//! The dispatch record handed to a worker at check-in time.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DispatchRecord {
    pub payload: serde_json::Value,
    pub softprompt: String,
    pub id: Uuid,
}
