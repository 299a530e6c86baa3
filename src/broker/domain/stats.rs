//! Broker-wide aggregate statistics: rolling fulfilment times, model multipliers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rolling fulfilment-rate window is capped at this length.
pub const MAX_FULFILMENT_TIMES: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Most-recent chars-per-second observations across all generations.
    pub fulfilment_times: Vec<f64>,
    /// Cached `model_name -> multiplier` (billions of parameters).
    pub model_multipliers: HashMap<String, f64>,
}

impl Stats {
    pub fn record_fulfilment(&mut self, chars_per_second: f64) {
        self.fulfilment_times.push(chars_per_second);
        if self.fulfilment_times.len() > MAX_FULFILMENT_TIMES {
            self.fulfilment_times.remove(0);
        }
    }

    pub fn request_avg(&self) -> f64 {
        if self.fulfilment_times.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.fulfilment_times.iter().sum();
        ((sum / self.fulfilment_times.len() as f64) * 10.0).round() / 10.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfilment_times_capped_at_10() {
        let mut s = Stats::default();
        for i in 0..15 {
            s.record_fulfilment(i as f64);
        }
        assert_eq!(s.fulfilment_times.len(), MAX_FULFILMENT_TIMES);
        // Oldest entries are dropped, newest kept.
        assert_eq!(s.fulfilment_times[0], 5.0);
    }
}
