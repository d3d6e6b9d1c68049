// Engagement Gauge - Drive engagement analytics
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engagement tracking.
//!
//! [`EngagementStateMachine`] lives for a whole drive: it counts state
//! changes and completed disengage/re-engage cycles and gates the steering
//! intervention detector with a post-transition stability window.
//! [`ActiveTimeClock`] lives for one segment and integrates engaged time.

use crate::event::MonoTime;

/// Automation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementState {
    Disengaged,
    Engaged,
}

impl EngagementState {
    pub fn from_active(active: bool) -> Self {
        if active {
            Self::Engaged
        } else {
            Self::Disengaged
        }
    }

    pub fn is_engaged(&self) -> bool {
        matches!(self, Self::Engaged)
    }
}

/// What a controls sample did to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First sample of the drive; establishes the baseline.
    Baseline,
    /// Same state as before.
    Unchanged,
    /// Engaged to disengaged; a re-engagement is now pending.
    Disengaged,
    /// Disengaged to engaged after a disengagement: one completed cycle.
    Reengaged,
    /// Disengaged to engaged with nothing pending (drive's first engagement).
    InitialEngagement,
}

impl Transition {
    /// Whether the state flipped.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Disengaged | Self::Reengaged | Self::InitialEngagement
        )
    }
}

/// Drive-scoped engagement state machine.
#[derive(Debug, Clone)]
pub struct EngagementStateMachine {
    state: Option<EngagementState>,
    pending_reengagement: bool,
    state_changes: u32,
    intervention_count: u32,
    stability_buffer_ns: u64,
    last_transition_ns: Option<MonoTime>,
}

impl EngagementStateMachine {
    /// Create with the given post-transition stability window.
    pub fn new(stability_buffer_ns: u64) -> Self {
        Self {
            state: None,
            pending_reengagement: false,
            state_changes: 0,
            intervention_count: 0,
            stability_buffer_ns,
            last_transition_ns: None,
        }
    }

    /// Feed one controls sample.
    pub fn observe(&mut self, now: MonoTime, active: bool) -> Transition {
        let next = EngagementState::from_active(active);
        let Some(previous) = self.state.replace(next) else {
            return Transition::Baseline;
        };
        if previous == next {
            return Transition::Unchanged;
        }

        self.state_changes += 1;
        self.last_transition_ns = Some(now);

        if !active {
            self.pending_reengagement = true;
            Transition::Disengaged
        } else if self.pending_reengagement {
            self.pending_reengagement = false;
            self.intervention_count += 1;
            Transition::Reengaged
        } else {
            Transition::InitialEngagement
        }
    }

    /// Whether the last transition is older than the stability window.
    ///
    /// Stable when no transition has been seen in the current segment.
    pub fn is_stable(&self, now: MonoTime) -> bool {
        match self.last_transition_ns {
            Some(t) => now.saturating_sub(t) > self.stability_buffer_ns,
            None => true,
        }
    }

    /// Time since the last transition, if any.
    pub fn since_transition_ns(&self, now: MonoTime) -> Option<u64> {
        self.last_transition_ns.map(|t| now.saturating_sub(t))
    }

    /// Forget the transition time; timestamps of the next segment are not
    /// comparable with this one's.
    pub fn begin_segment(&mut self) {
        self.last_transition_ns = None;
    }

    pub fn state(&self) -> Option<EngagementState> {
        self.state
    }

    pub fn is_engaged(&self) -> bool {
        self.state.map_or(false, |s| s.is_engaged())
    }

    pub fn pending_reengagement(&self) -> bool {
        self.pending_reengagement
    }

    /// Number of state flips, excluding the baseline sample.
    pub fn state_changes(&self) -> u32 {
        self.state_changes
    }

    /// Completed disengage/re-engage cycles.
    pub fn intervention_count(&self) -> u32 {
        self.intervention_count
    }
}

/// Segment-scoped time integration over controls samples.
///
/// `total_ns` spans first to last controls sample. `active_ns` adds the gap
/// between consecutive engaged samples only; a disengaged sample resets the
/// marker, so the first engaged sample after it (and the first of the
/// segment) contributes nothing.
#[derive(Debug, Clone, Default)]
pub struct ActiveTimeClock {
    start_ns: Option<MonoTime>,
    last_active_ns: Option<MonoTime>,
    total_ns: u64,
    active_ns: u64,
}

impl ActiveTimeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, now: MonoTime, active: bool) {
        let start = *self.start_ns.get_or_insert(now);

        if active {
            if let Some(last) = self.last_active_ns {
                self.active_ns += now.saturating_sub(last);
            }
            self.last_active_ns = Some(now);
        } else {
            self.last_active_ns = None;
        }

        self.total_ns = now.saturating_sub(start);
    }

    /// First controls sample of the segment.
    pub fn start_ns(&self) -> Option<MonoTime> {
        self.start_ns
    }

    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }

    pub fn active_ns(&self) -> u64 {
        self.active_ns
    }
}
