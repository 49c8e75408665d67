use serde::Deserialize;
use tracing::debug;

use controlbot_common::{ControlError, ReportedStatus, WEBAPP_GET_STATUS, WEBAPP_UPDATE_STATUS};

use crate::cycle::StatusService;

#[derive(Debug, Deserialize)]
struct StopFlag {
    stop: bool,
}

/// Companion web service: publishes what the bot is doing and carries its
/// kill-switch.
pub struct WebappClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl WebappClient {
    pub fn new(http: reqwest::Client, base_url: String, secret: String) -> Self {
        Self {
            http,
            base_url,
            secret,
        }
    }
}

impl StatusService for WebappClient {
    async fn stop_requested(&self) -> Result<bool, ControlError> {
        let url = format!("{}{WEBAPP_GET_STATUS}", self.base_url);
        let flag: StopFlag = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(flag.stop)
    }

    async fn report(&self, status: ReportedStatus) -> Result<(), ControlError> {
        let url = format!("{}{WEBAPP_UPDATE_STATUS}", self.base_url);
        debug!(
            target = status.wire_target(),
            room = status.room_temp,
            "updating webapp status"
        );
        self.http
            .post(&url)
            .form(&status_form(&self.secret, &status))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport)?;
        Ok(())
    }
}

fn status_form(secret: &str, status: &ReportedStatus) -> [(&'static str, String); 3] {
    let target = match status.target_temp {
        Some(target) => format!("{target:?}"),
        None => format!("{}", ReportedStatus::NO_TARGET as i32),
    };

    [
        ("password", secret.to_string()),
        ("target_temperature", target),
        ("room_temperature", format!("{:.2}", status.room_temp)),
    ]
}

fn transport(err: reqwest::Error) -> ControlError {
    ControlError::Transport(err.to_string())
}
