//! The six error kinds the core surfaces (`spec.md` §7). Mapped to HTTP
//! status codes at the boundary in `crate::http`, the way `ApiError` maps
//! proxy errors in the teacher crate's `src/proxy/api/mod.rs`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("no live worker could ever match this prompt")]
    NoEligibleWorker,

    #[error("Not enough kudos.")]
    InsufficientKudos,

    #[error("unknown user")]
    UnknownUser,

    #[error("anonymous access is not permitted here")]
    AnonymousForbidden,

    #[error("Cannot send kudos to yourself, ya monkey!")]
    SelfTransfer,

    #[error("generation id is not a live dispatch")]
    StaleDispatch,
}
