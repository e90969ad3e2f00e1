use std::time::Duration;

use crate::config::{Stage, TrafficProfile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSnapshot {
    /// 1-based.
    pub index: usize,
    pub count: usize,
    pub stage_elapsed: Duration,
    pub stage_remaining: Duration,
    pub start_target: u64,
    pub end_target: u64,
    pub current_target: u64,
}

/// Pure mapping from elapsed run time to the desired number of virtual users.
///
/// Staged profiles start from zero users and interpolate linearly inside each stage.
/// A boundary instant belongs to the stage that ends there, so the value at a stage's
/// end equals that stage's target. Zero-length stages jump to their target instantly.
/// At or after the total duration the target is always zero.
#[derive(Debug, Clone)]
pub struct RampSchedule {
    flat: bool,
    stages: Vec<Stage>,
    cumulative_ends: Vec<Duration>,
}

impl RampSchedule {
    pub fn new(profile: &TrafficProfile) -> Self {
        match profile {
            // An instant jump to `vus`, then a plateau.
            TrafficProfile::Flat { vus, duration } => Self::from_stages(
                true,
                vec![Stage::new(Duration::ZERO, *vus), Stage::new(*duration, *vus)],
            ),
            TrafficProfile::Staged { stages } => Self::from_stages(false, stages.clone()),
        }
    }

    fn from_stages(flat: bool, stages: Vec<Stage>) -> Self {
        let mut cumulative_ends = Vec::with_capacity(stages.len());
        let mut acc = Duration::ZERO;
        for s in &stages {
            acc = acc.saturating_add(s.duration);
            cumulative_ends.push(acc);
        }

        Self {
            flat,
            stages,
            cumulative_ends,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.cumulative_ends
            .last()
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_done(&self, elapsed: Duration) -> bool {
        elapsed >= self.total_duration()
    }

    pub fn peak_target(&self) -> u64 {
        self.stages.iter().map(|s| s.target).max().unwrap_or(0)
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        if self.is_done(elapsed) {
            return 0;
        }

        let idx = self.stage_index(elapsed);
        let (stage_start, stage_end) = self.bounds(idx);
        let start_target = self.start_target(idx);
        let end_target = self.stages[idx].target;

        let stage_duration = stage_end.saturating_sub(stage_start);
        if stage_duration.is_zero() {
            return end_target;
        }
        let stage_elapsed = elapsed.saturating_sub(stage_start);

        let start_i = start_target as i128;
        let delta = end_target as i128 - start_i;

        let num = stage_elapsed.as_nanos() as i128;
        let den = stage_duration.as_nanos() as i128;

        // Integer division truncates toward zero, i.e. toward the start target.
        let cur = start_i + delta.saturating_mul(num) / den.max(1);
        cur.clamp(0, u64::MAX as i128) as u64
    }

    /// Stage progress for display. `None` for flat profiles.
    pub fn stage_at(&self, elapsed: Duration) -> Option<StageSnapshot> {
        if self.flat || self.stages.is_empty() {
            return None;
        }

        let total = self.total_duration();
        let clamped = elapsed.min(total);
        let idx = self.stage_index(clamped);
        let (stage_start, stage_end) = self.bounds(idx);

        let stage_duration = stage_end.saturating_sub(stage_start);
        let stage_elapsed = clamped.saturating_sub(stage_start);

        Some(StageSnapshot {
            index: idx + 1,
            count: self.stages.len(),
            stage_elapsed,
            stage_remaining: stage_duration.saturating_sub(stage_elapsed),
            start_target: self.start_target(idx),
            end_target: self.stages[idx].target,
            current_target: self.target_at(elapsed),
        })
    }

    /// First stage whose end is at or after `elapsed`.
    fn stage_index(&self, elapsed: Duration) -> usize {
        self.cumulative_ends
            .partition_point(|end| *end < elapsed)
            .min(self.stages.len().saturating_sub(1))
    }

    fn bounds(&self, idx: usize) -> (Duration, Duration) {
        let start = if idx == 0 {
            Duration::ZERO
        } else {
            self.cumulative_ends[idx - 1]
        };
        (start, self.cumulative_ends[idx])
    }

    fn start_target(&self, idx: usize) -> u64 {
        if idx == 0 {
            0
        } else {
            self.stages[idx - 1].target
        }
    }
}
