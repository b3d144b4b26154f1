use gwadmin_core::{ApiError, AuthError, ConsoleError};

use crate::exit_codes::ExitCode;

#[derive(Debug)]
pub enum CommandError {
    InvalidInput(anyhow::Error),
    Auth(anyhow::Error),
    Gateway(anyhow::Error),
    Runtime(anyhow::Error),
}

impl CommandError {
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidInput(_) => ExitCode::InvalidInput,
            Self::Auth(_) => ExitCode::AuthFailed,
            Self::Gateway(_) => ExitCode::GatewayError,
            Self::Runtime(_) => ExitCode::RuntimeError,
        }
    }

    #[must_use]
    pub fn anyhow(&self) -> &anyhow::Error {
        match self {
            Self::InvalidInput(e) | Self::Auth(e) | Self::Gateway(e) | Self::Runtime(e) => e,
        }
    }

    pub fn not_logged_in() -> Self {
        Self::Auth(anyhow::anyhow!("not logged in (run `gwadmin login` first)"))
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.anyhow())
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.anyhow().as_ref())
    }
}

impl From<AuthError> for CommandError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Storage(_) => Self::Runtime(err.into()),
            _ => Self::Auth(err.into()),
        }
    }
}

impl From<ApiError> for CommandError {
    fn from(err: ApiError) -> Self {
        if err.status() == Some(401) {
            Self::Auth(anyhow::Error::new(err).context("session rejected by the gateway"))
        } else {
            Self::Gateway(err.into())
        }
    }
}

impl From<ConsoleError> for CommandError {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::Config(_) => Self::InvalidInput(err.into()),
            ConsoleError::Storage(_) => Self::Runtime(err.into()),
        }
    }
}
