//! The five entities of the brokerage's data model.

pub mod generation;
pub mod prompt;
pub mod stats;
pub mod user;
pub mod worker;

pub use generation::Generation;
pub use prompt::Prompt;
pub use stats::Stats;
pub use user::User;
pub use worker::Worker;
