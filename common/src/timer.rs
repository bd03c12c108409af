//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Naive wall-clock timing with throughput output through the logger.
//!
//! Make sure a logger backend is configured, otherwise the output goes
//! nowhere. Log output may look like
//! `[beta-step1 | encrypt size: 10000] elapsed: 0.62500 sec [qps: 16004]`

use std::time::Instant;

pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    pub fn new(label: &str) -> Timer {
        Timer {
            start: Instant::now(),
            label: String::from(label),
        }
    }

    /// Log elapsed seconds and records/sec for `size` processed items.
    pub fn qps(&self, extra_label: &str, size: usize) {
        let elapsed = self.start.elapsed().as_secs_f64();
        let qps = if elapsed > 0.0 {
            (size as f64 / elapsed) as u64
        } else {
            0
        };
        info!(
            "[{} | {} size: {}] elapsed: {:.5} sec [qps: {}]",
            self.label, extra_label, size, elapsed, qps
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qps_does_not_panic_on_zero_size() {
        let t = Timer::new("test");
        t.qps("empty", 0);
    }
}
