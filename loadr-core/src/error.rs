pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Rejected test plan. Raised while `Configuring`, before any virtual user starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("a traffic profile is required (`vus` + `duration`, or `stages`)")]
    MissingProfile,

    #[error("`vus`/`duration` and `stages` are mutually exclusive")]
    AmbiguousProfile,

    #[error("`vus` must be a positive integer")]
    InvalidVus,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("`stages` must be a non-empty array of {{ duration, target }}")]
    EmptyStages,

    #[error("`stages` must add up to a positive total duration")]
    ZeroStagesDuration,

    #[error("`stages` must reach a positive target at least once")]
    ZeroStagesTarget,

    #[error("profile runs longer than the {0:?} limit")]
    DurationTooLong(std::time::Duration),

    #[error("`tick` must be a positive duration")]
    InvalidTick,

    #[error("`thinkTime` range is inverted (min > max)")]
    InvalidThinkTime,

    #[error("scenario must issue at least one request")]
    EmptyScenario,

    #[error("invalid request `{name}`: {reason}")]
    InvalidRequest { name: String, reason: String },
}
