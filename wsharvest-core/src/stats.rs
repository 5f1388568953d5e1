//! Per-run statistics counters
//!
//! A [`HarvestStats`] value is created for each run and shared by reference
//! with every stage that counts something. Counters are atomics so stages may
//! run concurrently without extra locking.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one of the run counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    ProfanityFiltered,
    TruncatedCompatibility,
    UnreachableImage,
    InvalidFormat,
}

/// Concurrency-safe counter set for one pipeline run
#[derive(Debug, Default)]
pub struct HarvestStats {
    profanity_filtered_workspaces: AtomicU64,
    truncated_compatibility_workspaces: AtomicU64,
    unreachable_image_workspaces: AtomicU64,
    invalid_format_workspaces: AtomicU64,
}

/// Point-in-time copy of the counters, suitable for serialization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub profanity_filtered_workspaces: u64,
    pub truncated_compatibility_workspaces: u64,
    pub unreachable_image_workspaces: u64,
    pub invalid_format_workspaces: u64,
}

impl HarvestStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::ProfanityFiltered => &self.profanity_filtered_workspaces,
            Counter::TruncatedCompatibility => &self.truncated_compatibility_workspaces,
            Counter::UnreachableImage => &self.unreachable_image_workspaces,
            Counter::InvalidFormat => &self.invalid_format_workspaces,
        }
    }

    pub fn increment(&self, counter: Counter) {
        self.slot(counter).fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    /// Zero every counter (start of a run, or between isolated tests)
    pub fn reset(&self) {
        for counter in [
            Counter::ProfanityFiltered,
            Counter::TruncatedCompatibility,
            Counter::UnreachableImage,
            Counter::InvalidFormat,
        ] {
            self.slot(counter).store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            profanity_filtered_workspaces: self.get(Counter::ProfanityFiltered),
            truncated_compatibility_workspaces: self.get(Counter::TruncatedCompatibility),
            unreachable_image_workspaces: self.get(Counter::UnreachableImage),
            invalid_format_workspaces: self.get(Counter::InvalidFormat),
        }
    }
}

impl StatsSnapshot {
    /// Counter names paired with their values, in a stable order
    pub fn rows(&self) -> [(&'static str, u64); 4] {
        [
            ("profanity_filtered_workspaces", self.profanity_filtered_workspaces),
            (
                "truncated_compatibility_workspaces",
                self.truncated_compatibility_workspaces,
            ),
            ("unreachable_image_workspaces", self.unreachable_image_workspaces),
            ("invalid_format_workspaces", self.invalid_format_workspaces),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_and_reset() {
        let stats = HarvestStats::new();
        stats.increment(Counter::ProfanityFiltered);
        stats.increment(Counter::ProfanityFiltered);
        stats.increment(Counter::TruncatedCompatibility);

        assert_eq!(stats.get(Counter::ProfanityFiltered), 2);
        assert_eq!(stats.get(Counter::TruncatedCompatibility), 1);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let stats = Arc::new(HarvestStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.increment(Counter::UnreachableImage);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.get(Counter::UnreachableImage), 8000);
    }

    #[test]
    fn test_snapshot_serializes_with_snake_case_keys() {
        let stats = HarvestStats::new();
        stats.increment(Counter::InvalidFormat);

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["invalid_format_workspaces"], 1);
        assert_eq!(json["profanity_filtered_workspaces"], 0);
    }
}
