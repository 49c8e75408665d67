use thiserror::Error;

use crate::schedule::ScheduleError;

/// Failure kinds of a control cycle. `Auth` and `Transport` are the ones worth
/// retrying; `Config` and `Hardware` are surfaced immediately.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("sensor unreadable: {0}")]
    Hardware(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ControlError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Hardware(_) => "hardware",
            Self::Auth(_) => "auth",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<ScheduleError> for ControlError {
    fn from(err: ScheduleError) -> Self {
        Self::Config(err.to_string())
    }
}
