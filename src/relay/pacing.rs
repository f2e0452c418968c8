// ABOUTME: Emission pacing policy for relayed assistant text
// ABOUTME: Splits deltas into per-character or per-chunk units with a fixed delay between them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::time::Duration;

use crate::config::{EmissionUnit, RelayConfig};

/// How relayed text is cut up and how fast it is released
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    unit: EmissionUnit,
    delay: Duration,
}

impl Pacer {
    /// Create a pacing policy
    #[must_use]
    pub const fn new(unit: EmissionUnit, delay: Duration) -> Self {
        Self { unit, delay }
    }

    /// Policy from relay configuration
    #[must_use]
    pub const fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.emission_unit,
            Duration::from_millis(config.char_delay_ms),
        )
    }

    /// Whole deltas, no delay
    #[must_use]
    pub const fn immediate() -> Self {
        Self::new(EmissionUnit::Chunk, Duration::ZERO)
    }

    /// Delay after each unit
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Cut a delta into emission units
    ///
    /// Character mode splits on `char` boundaries so multi-byte text is
    /// never broken.
    #[must_use]
    pub fn units(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        match self.unit {
            EmissionUnit::Char => text.chars().map(String::from).collect(),
            EmissionUnit::Chunk => vec![text.to_owned()],
        }
    }

    /// Wait out the per-unit delay
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::from_config(&RelayConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_units_respect_multibyte_boundaries() {
        let pacer = Pacer::new(EmissionUnit::Char, Duration::ZERO);
        assert_eq!(pacer.units("héllo"), vec!["h", "é", "l", "l", "o"]);
        assert_eq!(pacer.units("🦀!"), vec!["🦀", "!"]);
    }

    #[test]
    fn test_chunk_units_keep_delta_whole() {
        assert_eq!(Pacer::immediate().units("Hello there"), vec!["Hello there"]);
        assert!(Pacer::immediate().units("").is_empty());
    }

    #[test]
    fn test_default_matches_relay_defaults() {
        let pacer = Pacer::default();
        assert_eq!(pacer.delay(), Duration::from_millis(10));
        assert_eq!(pacer.units("ab").len(), 2);
    }

    #[tokio::test]
    async fn test_pause_waits_for_delay() {
        let pacer = Pacer::new(EmissionUnit::Char, Duration::from_millis(10));
        let started = tokio::time::Instant::now();
        pacer.pause().await;
        assert!(started.elapsed() >= Duration::from_millis(10));
    }
}
