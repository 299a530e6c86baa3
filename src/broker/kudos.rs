//! C6: the kudos economy — model multipliers, the chars→kudos conversion,
//! recording a worker's contribution, and peer-to-peer transfer.

use super::domain::user::round2;
use super::error::BrokerError;
use super::store::Store;

/// The external model-registry collaborator (`spec.md` §6): given a model
/// name, returns its parameter count in billions. Out of scope to implement
/// for real — the core only depends on this trait and caches the result
/// indefinitely once looked up.
pub trait ModelRegistry: Send + Sync {
    fn parameter_billions(&self, model_name: &str) -> Option<f64>;
}

/// Falls back to a multiplier of 1.0 for every model, exactly like the
/// original's `except OSError` branch when the registry can't resolve a name.
#[derive(Debug, Default)]
pub struct UnknownModelRegistry;

impl ModelRegistry for UnknownModelRegistry {
    fn parameter_billions(&self, _model_name: &str) -> Option<f64> {
        None
    }
}

/// Memoised in `stats.model_multipliers`. On a cache miss, the registry call
/// happens without holding the store lock (`spec.md` §5): callers must not
/// invoke this while already holding `store.lock()`.
pub fn model_multiplier(store: &Store, registry: &dyn ModelRegistry, model_name: &str) -> f64 {
    if let Some(cached) = store.lock().stats.model_multipliers.get(model_name).copied() {
        return cached;
    }
    let multiplier = registry.parameter_billions(model_name).unwrap_or(1.0);
    store
        .lock()
        .stats
        .model_multipliers
        .insert(model_name.to_string(), multiplier);
    multiplier
}

pub fn convert_chars_to_kudos(chars: u64, multiplier: f64) -> f64 {
    round2(chars as f64 * multiplier / 100.0)
}

/// `transfer(src, dst, amount) -> (granted, reason)`, modelled here as a
/// typed `Result` instead of the original's `[amount, reason]` pair.
pub fn transfer(store: &Store, src_oauth_id: &str, dst_oauth_id: &str, amount: f64) -> Result<f64, BrokerError> {
    let mut guard = store.lock();

    if src_oauth_id == dst_oauth_id {
        return Err(BrokerError::SelfTransfer);
    }

    let src_is_anon = guard
        .users
        .get(&src_oauth_id.to_string())
        .map(|u| u.is_anonymous())
        .ok_or(BrokerError::UnknownUser)?;
    if src_is_anon {
        return Err(BrokerError::AnonymousForbidden);
    }

    let dst_is_anon = guard
        .users
        .get(&dst_oauth_id.to_string())
        .map(|u| u.is_anonymous())
        .ok_or(BrokerError::UnknownUser)?;
    if dst_is_anon {
        return Err(BrokerError::AnonymousForbidden);
    }

    let src_kudos = guard.users.get(&src_oauth_id.to_string()).unwrap().kudos;
    if amount > src_kudos {
        return Err(BrokerError::InsufficientKudos);
    }

    guard.users.get_mut(&src_oauth_id.to_string()).unwrap().modify_kudos(-amount, "gifted");
    guard.users.get_mut(&dst_oauth_id.to_string()).unwrap().modify_kudos(amount, "received");
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::domain::User;

    fn seeded_store() -> Store {
        let store = Store::new(true);
        {
            let mut guard = store.lock();
            let mut alice = User::new(1, "alice".into(), "oauth-alice".into(), "k1".into(), String::new());
            alice.kudos = 10.0;
            let bob = User::new(2, "bob".into(), "oauth-bob".into(), "k2".into(), String::new());
            let anon = crate::broker::domain::user::User::new_anonymous();
            guard.users.add("oauth-alice".into(), alice);
            guard.users.add("oauth-bob".into(), bob);
            guard.users.add("anon".into(), anon);
        }
        store
    }

    #[test]
    fn transfer_to_anon_is_rejected() {
        let store = seeded_store();
        let err = transfer(&store, "oauth-alice", "anon", 5.0).unwrap_err();
        assert!(matches!(err, BrokerError::AnonymousForbidden));
    }

    #[test]
    fn transfer_to_self_is_rejected() {
        let store = seeded_store();
        let err = transfer(&store, "oauth-alice", "oauth-alice", 5.0).unwrap_err();
        assert!(matches!(err, BrokerError::SelfTransfer));
    }

    #[test]
    fn transfer_exceeding_balance_is_rejected() {
        let store = seeded_store();
        let err = transfer(&store, "oauth-alice", "oauth-bob", 10.01).unwrap_err();
        assert!(matches!(err, BrokerError::InsufficientKudos));
    }

    #[test]
    fn transfer_moves_kudos_and_tracks_volume_counters() {
        let store = seeded_store();
        let granted = transfer(&store, "oauth-alice", "oauth-bob", 4.0).unwrap();
        assert_eq!(granted, 4.0);
        let guard = store.lock();
        assert_eq!(guard.users.get(&"oauth-alice".to_string()).unwrap().kudos, 6.0);
        assert_eq!(guard.users.get(&"oauth-bob".to_string()).unwrap().kudos, 4.0);
    }

    #[test]
    fn unknown_model_defaults_to_multiplier_one() {
        let store = Store::new(true);
        let m = model_multiplier(&store, &UnknownModelRegistry, "some-model");
        assert_eq!(m, 1.0);
    }

    #[test]
    fn chars_to_kudos_conversion() {
        assert_eq!(convert_chars_to_kudos(11, 1.0), 0.11);
    }
}
