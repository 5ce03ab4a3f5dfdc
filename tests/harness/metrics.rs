// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome collection for traffic simulation results.

use std::collections::HashMap;

/// Collects outcomes during a traffic replay.
#[derive(Debug, Default)]
pub struct TrafficMetrics {
    /// Count of requests by outcome
    outcomes: HashMap<Outcome, usize>,
    /// Admitted arrival times by key, in replay order
    admitted_at: HashMap<String, Vec<u64>>,
    /// Count of requests by client
    requests_per_client: HashMap<String, usize>,
    /// Every outcome in replay order
    sequence: Vec<Outcome>,
}

/// Possible outcomes for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Admitted,
    Rejected,
}

impl TrafficMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request outcome.
    pub fn record(&mut self, outcome: Outcome, client: &str, key: &str, at_ms: u64) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.requests_per_client.entry(client.to_string()).or_insert(0) += 1;
        if outcome == Outcome::Admitted {
            self.admitted_at.entry(key.to_string()).or_default().push(at_ms);
        }
        self.sequence.push(outcome);
    }

    /// Get total request count.
    pub fn total_requests(&self) -> usize {
        self.sequence.len()
    }

    /// Get count for a specific outcome.
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Outcomes in the order they were recorded.
    pub fn sequence(&self) -> &[Outcome] {
        &self.sequence
    }

    /// Get block rate (ratio of rejected to total).
    pub fn block_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            return 0.0;
        }
        self.count(Outcome::Rejected) as f64 / total as f64
    }

    /// Largest number of admits any single key received inside one
    /// trailing window, where an arrival at `t` is still inside the window
    /// ending at `now` while `now - t < window_ms`.
    pub fn peak_admitted_in_window(&self, window_ms: u64) -> usize {
        self.admitted_at
            .values()
            .map(|times| {
                let mut sorted = times.clone();
                sorted.sort_unstable();
                let mut start = 0;
                let mut peak = 0;
                for end in 0..sorted.len() {
                    while sorted[end] - sorted[start] >= window_ms {
                        start += 1;
                    }
                    peak = peak.max(end - start + 1);
                }
                peak
            })
            .max()
            .unwrap_or(0)
    }

    /// Get number of unique clients that made requests.
    pub fn unique_clients(&self) -> usize {
        self.requests_per_client.len()
    }

    /// Generate a summary report.
    pub fn report(&self, window_ms: u64) -> MetricsReport {
        MetricsReport {
            total_requests: self.total_requests(),
            admitted: self.count(Outcome::Admitted),
            rejected: self.count(Outcome::Rejected),
            block_rate: self.block_rate(),
            unique_clients: self.unique_clients(),
            unique_keys: self.admitted_at.len(),
            peak_admitted_in_window: self.peak_admitted_in_window(window_ms),
        }
    }
}

/// Summary report of a traffic replay.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total_requests: usize,
    pub admitted: usize,
    pub rejected: usize,
    pub block_rate: f64,
    pub unique_clients: usize,
    pub unique_keys: usize,
    pub peak_admitted_in_window: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Traffic Replay Report ===")?;
        writeln!(f, "Total Requests:    {}", self.total_requests)?;
        writeln!(f)?;
        writeln!(f, "--- Outcomes ---")?;
        writeln!(f, "Admitted:          {}", self.admitted)?;
        writeln!(f, "Rejected:          {}", self.rejected)?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate * 100.0)?;
        writeln!(f, "Peak per Window:   {}", self.peak_admitted_in_window)?;
        writeln!(f)?;
        writeln!(f, "--- Distribution ---")?;
        writeln!(f, "Unique Clients:    {}", self.unique_clients)?;
        writeln!(f, "Keys Admitted:     {}", self.unique_keys)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let mut metrics = TrafficMetrics::new();
        metrics.record(Outcome::Admitted, "10.0.0.1", "10.0.0.1/a", 0);
        metrics.record(Outcome::Admitted, "10.0.0.1", "10.0.0.1/b", 1);
        metrics.record(Outcome::Rejected, "10.0.0.1", "10.0.0.1/a", 2);

        assert_eq!(metrics.total_requests(), 3);
        assert_eq!(metrics.count(Outcome::Admitted), 2);
        assert_eq!(metrics.count(Outcome::Rejected), 1);
        assert_eq!(metrics.unique_clients(), 1);
        assert_eq!(
            metrics.sequence(),
            &[Outcome::Admitted, Outcome::Admitted, Outcome::Rejected]
        );
    }

    #[test]
    fn test_block_rate() {
        let mut metrics = TrafficMetrics::new();
        for t in 0..3 {
            metrics.record(Outcome::Admitted, "10.0.0.1", "k", t);
        }
        for t in 3..10 {
            metrics.record(Outcome::Rejected, "10.0.0.1", "k", t);
        }

        assert!((metrics.block_rate() - 0.7).abs() < 0.01);
    }

    #[test]
    fn test_peak_admitted_in_window() {
        let mut metrics = TrafficMetrics::new();
        for t in [0, 10, 999, 1000, 1500, 1999] {
            metrics.record(Outcome::Admitted, "c", "k", t);
        }
        // (0, 1000]: 10, 999, 1000 ; [1000, 2000): 1000, 1500, 1999
        assert_eq!(metrics.peak_admitted_in_window(1000), 3);
        assert_eq!(metrics.peak_admitted_in_window(1), 1);
    }
}
