// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test data generators for traffic simulation.

use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of client addresses for testing.
pub fn generate_clients(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c)).to_string()
        })
        .collect()
}

/// Generate a pool of API paths for testing.
pub fn generate_paths(count: usize) -> Vec<String> {
    const RESOURCES: [&str; 5] = ["mailbox", "billing", "kyc", "address", "account"];
    (0..count)
        .map(|i| format!("/api/{}/{}", RESOURCES[i % RESOURCES.len()], i / RESOURCES.len()))
        .collect()
}

/// Deterministic pseudo-random arrival offsets.
///
/// Returns `count` non-decreasing offsets, each step in `0..max_gap_ms`.
/// Linear congruential generator, so the same seed always replays the same
/// sequence.
pub fn jittered_offsets(count: usize, max_gap_ms: u64, seed: u64) -> Vec<u64> {
    let mut state = seed;
    let mut at = 0;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            at += (state >> 33) % max_gap_ms.max(1);
            at
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_clients() {
        let clients = generate_clients(256);
        assert_eq!(clients.len(), 256);
        // All should be unique
        let unique: std::collections::HashSet<_> = clients.iter().collect();
        assert_eq!(unique.len(), 256);
        assert_eq!(clients[1], "10.0.0.1");
    }

    #[test]
    fn test_generate_paths() {
        let paths = generate_paths(12);
        assert!(paths.iter().all(|p| p.starts_with("/api/")));
        let unique: std::collections::HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn test_jittered_offsets_replay() {
        let a = jittered_offsets(100, 50, 7);
        assert_eq!(a, jittered_offsets(100, 50, 7));
        assert!(a.windows(2).all(|w| w[0] <= w[1]));
    }
}
