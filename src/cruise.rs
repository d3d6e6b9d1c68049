// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Cruise button hold time.

use crate::event::MonoTime;

/// Integrates time while the cruise button mask is non-zero. Segment-scoped.
#[derive(Debug, Clone, Default)]
pub struct CruiseHoldTracker {
    previous: Option<(MonoTime, i64)>,
    press_ns: u64,
    samples: u32,
}

impl CruiseHoldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded cruise-state mask.
    ///
    /// The interval since the previous sample counts as pressed when the
    /// previous mask was non-zero.
    pub fn observe(&mut self, now: MonoTime, mask: i64) {
        if let Some((prev_t, prev_mask)) = self.previous {
            if prev_mask != 0 && now > prev_t {
                self.press_ns += now - prev_t;
            }
        }
        self.previous = Some((now, mask));
        self.samples += 1;
    }

    pub fn press_ns(&self) -> u64 {
        self.press_ns
    }

    pub fn sample_count(&self) -> u32 {
        self.samples
    }
}
