use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

use crate::error::ConfigError;
use crate::outcome::IterationOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationContext {
    pub vu_id: u64,
    /// Zero-based iteration number within this virtual user.
    pub iteration: u64,
}

/// Pause between iterations of one virtual user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThinkTime {
    #[default]
    None,
    Fixed(Duration),
    /// Uniformly distributed in `[min, max]`, so users drift out of lockstep.
    Uniform { min: Duration, max: Duration },
}

impl ThinkTime {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Uniform { min, max } if min > max => Err(ConfigError::InvalidThinkTime),
            _ => Ok(()),
        }
    }

    pub fn sample(&self) -> Duration {
        match *self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => d,
            Self::Uniform { min, max } if min >= max => min,
            Self::Uniform { min, max } => rand::thread_rng().gen_range(min..=max),
        }
    }
}

/// The unit of work a virtual user repeats.
///
/// Implementations must not panic on expected failures: transport problems belong in the
/// returned [`IterationOutcome`]. A panic only ends the virtual user that hit it.
pub trait Scenario: Send + Sync + 'static {
    fn run(&self, ctx: &IterationContext) -> impl Future<Output = IterationOutcome> + Send;

    fn think_time(&self) -> ThinkTime {
        ThinkTime::None
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.think_time().validate()
    }
}

/// Scenario backed by a closure. Handy for embedding and tests.
pub struct FnScenario<F> {
    f: F,
    think_time: ThinkTime,
}

impl<F, Fut> FnScenario<F>
where
    F: Fn(IterationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IterationOutcome> + Send,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            think_time: ThinkTime::None,
        }
    }

    #[must_use]
    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = think_time;
        self
    }
}

impl<F, Fut> Scenario for FnScenario<F>
where
    F: Fn(IterationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = IterationOutcome> + Send,
{
    fn run(&self, ctx: &IterationContext) -> impl Future<Output = IterationOutcome> + Send {
        (self.f)(*ctx)
    }

    fn think_time(&self) -> ThinkTime {
        self.think_time
    }
}
