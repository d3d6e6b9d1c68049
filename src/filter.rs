// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fixed-window moving average used to denoise the torque channels.

use std::collections::VecDeque;

/// Running mean over the last N samples.
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    window: VecDeque<f64>,
    capacity: usize,
}

impl MovingAverageFilter {
    /// Create a filter over `capacity` samples (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Push a sample, evicting the oldest beyond capacity, and return the
    /// mean of the window.
    pub fn update(&mut self, value: f64) -> f64 {
        self.window.push_back(value);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Mean of the current window.
    pub fn value(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}
