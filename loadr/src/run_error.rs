use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum RunError {
    InvalidInput(anyhow::Error),
    RuntimeError(anyhow::Error),
}

impl RunError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::RuntimeError(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::RuntimeError(e) => e,
        }
    }
}

impl From<loadr_core::Error> for RunError {
    fn from(err: loadr_core::Error) -> Self {
        match err {
            loadr_core::Error::Config(e) => {
                Self::InvalidInput(anyhow::Error::new(e).context("invalid test plan"))
            }
            loadr_core::Error::Join(e) => {
                Self::RuntimeError(anyhow::Error::new(e).context("load test aborted"))
            }
        }
    }
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.anyhow())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}
