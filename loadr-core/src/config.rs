use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);
/// Longest run a profile may describe.
pub const MAX_TOTAL_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// How many virtual users should be running over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrafficProfile {
    /// `vus` users for `duration`, then zero.
    Flat { vus: u64, duration: Duration },
    /// Piecewise-linear ramp starting from zero users.
    Staged { stages: Vec<Stage> },
}

impl TrafficProfile {
    pub fn flat(vus: u64, duration: Duration) -> Self {
        Self::Flat { vus, duration }
    }

    pub fn staged(stages: Vec<Stage>) -> Self {
        Self::Staged { stages }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Flat { vus, duration } => {
                if *vus == 0 {
                    return Err(ConfigError::InvalidVus);
                }
                if duration.is_zero() {
                    return Err(ConfigError::InvalidDuration);
                }
            }
            Self::Staged { stages } => {
                if stages.is_empty() {
                    return Err(ConfigError::EmptyStages);
                }
                if self.total_duration().is_zero() {
                    return Err(ConfigError::ZeroStagesDuration);
                }
                if self.peak_vus() == 0 {
                    return Err(ConfigError::ZeroStagesTarget);
                }
            }
        }
        if self.total_duration() > MAX_TOTAL_DURATION {
            return Err(ConfigError::DurationTooLong(MAX_TOTAL_DURATION));
        }
        Ok(())
    }

    pub fn total_duration(&self) -> Duration {
        match self {
            Self::Flat { duration, .. } => *duration,
            Self::Staged { stages } => stages
                .iter()
                .fold(Duration::ZERO, |acc, s| acc.saturating_add(s.duration)),
        }
    }

    pub fn peak_vus(&self) -> u64 {
        match self {
            Self::Flat { vus, .. } => *vus,
            Self::Staged { stages } => stages.iter().map(|s| s.target).max().unwrap_or(0),
        }
    }
}

/// Profile fields as they appear in a config file, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileOptions {
    pub vus: Option<u64>,
    pub duration: Option<Duration>,
    pub stages: Option<Vec<Stage>>,
}

/// Command-line overrides. Either field forces a flat profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    pub vus: Option<u64>,
    pub duration: Option<Duration>,
}

impl RunConfig {
    fn is_set(&self) -> bool {
        self.vus.is_some() || self.duration.is_some()
    }
}

/// Resolves file options plus CLI overrides into exactly one traffic profile.
///
/// CLI `--vus`/`--duration` win over anything in the file and select the flat shape.
/// A `duration` without `vus` runs a single user.
pub fn profile_from_options(
    opts: ProfileOptions,
    cfg: RunConfig,
) -> Result<TrafficProfile, ConfigError> {
    if cfg.is_set() {
        let vus = cfg.vus.or(opts.vus).unwrap_or(1);
        let duration = cfg
            .duration
            .or(opts.duration)
            .ok_or(ConfigError::InvalidDuration)?;
        let profile = TrafficProfile::flat(vus, duration);
        profile.validate()?;
        return Ok(profile);
    }

    let profile = match (opts.stages, opts.vus, opts.duration) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => return Err(ConfigError::AmbiguousProfile),
        (Some(stages), None, None) => TrafficProfile::staged(stages),
        (None, vus, Some(duration)) => TrafficProfile::flat(vus.unwrap_or(1), duration),
        (None, Some(_), None) => return Err(ConfigError::InvalidDuration),
        (None, None, None) => return Err(ConfigError::MissingProfile),
    };

    profile.validate()?;
    Ok(profile)
}

/// Everything the executor needs besides the scenario itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    pub profile: TrafficProfile,
    /// How often the controller re-evaluates the ramp and resizes the pool.
    pub tick: Duration,
    /// How long stopping users may take to finish their iteration before being aborted.
    pub grace_period: Duration,
}

impl TestPlan {
    pub fn new(profile: TrafficProfile) -> Self {
        Self {
            profile,
            tick: DEFAULT_TICK,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.is_zero() {
            return Err(ConfigError::InvalidTick);
        }
        self.profile.validate()
    }
}
