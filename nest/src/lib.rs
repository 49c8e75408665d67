//! Thin client for the Nest mobile cloud API: log in, load the status
//! document, push partial updates. No retries happen here; callers wrap each
//! call in their own policy.

mod wire;

use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info};

use controlbot_common::{
    config::NestConfig, types::round_to, ControlError, Credentials, TemperatureUnit,
    NEST_BUCKET_DEVICE, NEST_BUCKET_SHARED, NEST_BUCKET_STRUCTURE, NEST_MOBILE_STATUS_PATH,
    NEST_PROTOCOL_VERSION,
};

use crate::wire::{
    away_update, fan_update, login_error, parse_login, put_url, resolve_status,
    target_type_update, target_update, DeviceRecord, MobileStatus, SharedRecord,
};

/// Authenticated but not yet loaded.
#[derive(Debug, Clone)]
pub struct NestSession {
    transport_url: String,
    access_token: String,
    user_id: String,
    serial: Option<String>,
}

/// Session plus the last fetched status of one device.
#[derive(Debug, Clone)]
pub struct LoadedSession {
    session: NestSession,
    unit: TemperatureUnit,
    structure_id: String,
    serial: String,
    away: bool,
    shared: SharedRecord,
    device: DeviceRecord,
}

impl LoadedSession {
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn structure_id(&self) -> &str {
        &self.structure_id
    }

    /// Ambient temperature measured by the thermostat, display units, one decimal.
    pub fn current_temp(&self) -> f32 {
        round_to(self.unit.from_celsius(self.shared.current_temperature), 1)
    }

    pub fn target_temp(&self) -> f32 {
        self.unit.from_celsius(self.shared.target_temperature)
    }

    /// `target_temperature_type`, e.g. `heat`, `cool`, `range`, `off`.
    pub fn current_mode(&self) -> Option<&str> {
        self.shared.target_temperature_type.as_deref()
    }

    pub fn fan_mode(&self) -> Option<&str> {
        self.device.fan_mode.as_deref()
    }

    pub fn is_away(&self) -> bool {
        self.away
    }
}

pub struct NestClient {
    http: reqwest::Client,
    config: NestConfig,
    unit: TemperatureUnit,
}

impl NestClient {
    pub fn new(http: reqwest::Client, config: NestConfig, unit: TemperatureUnit) -> Self {
        Self { http, config, unit }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<NestSession, ControlError> {
        debug!(url = %self.config.login_url, "logging in to nest");
        let response = self
            .http
            .post(&self.config.login_url)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .form(&[
                ("username", credentials.login.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        if let Some(err) = login_error(response.status()) {
            return Err(err);
        }
        let body = response.bytes().await.map_err(transport)?;
        let login = parse_login(&body)?;

        Ok(NestSession {
            transport_url: login.urls.transport_url,
            access_token: login.access_token,
            user_id: login.userid,
            serial: credentials.serial.clone(),
        })
    }

    pub async fn fetch_status(&self, session: &NestSession) -> Result<LoadedSession, ControlError> {
        let url = format!(
            "{}{NEST_MOBILE_STATUS_PATH}{}",
            session.transport_url.trim_end_matches('/'),
            session.user_id
        );
        let status: MobileStatus = self
            .authorized(self.http.get(&url), session)
            .header("X-nl-user-id", &session.user_id)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;

        let resolved = resolve_status(status, session.serial.as_deref(), self.config.device_index)?;
        debug!(
            structure = %resolved.structure_id,
            serial = %resolved.serial,
            "nest status loaded"
        );

        Ok(LoadedSession {
            session: session.clone(),
            unit: self.unit,
            structure_id: resolved.structure_id,
            serial: resolved.serial,
            away: resolved.away,
            shared: resolved.shared,
            device: resolved.device,
        })
    }

    /// `temp` is in display units.
    pub async fn set_target(&self, loaded: &LoadedSession, temp: f32) -> Result<(), ControlError> {
        let target_c = self.unit.to_celsius(temp);
        info!(
            "setting nest {} target to {temp:.1}{} ({target_c:.2}C)",
            loaded.serial,
            self.unit.as_str()
        );
        self.put(
            &loaded.session,
            NEST_BUCKET_SHARED,
            &loaded.serial,
            &target_update(target_c),
        )
        .await
    }

    pub async fn set_target_type(
        &self,
        loaded: &LoadedSession,
        mode: &str,
    ) -> Result<(), ControlError> {
        self.put(
            &loaded.session,
            NEST_BUCKET_SHARED,
            &loaded.serial,
            &target_type_update(mode),
        )
        .await
    }

    pub async fn set_fan_mode(
        &self,
        loaded: &LoadedSession,
        mode: &str,
    ) -> Result<(), ControlError> {
        self.put(
            &loaded.session,
            NEST_BUCKET_DEVICE,
            &loaded.serial,
            &fan_update(mode),
        )
        .await
    }

    /// Flips the structure's away state relative to the loaded status.
    pub async fn toggle_away(&self, loaded: &LoadedSession) -> Result<(), ControlError> {
        self.put(
            &loaded.session,
            NEST_BUCKET_STRUCTURE,
            &loaded.structure_id,
            &away_update(loaded.away),
        )
        .await
    }

    async fn put(
        &self,
        session: &NestSession,
        bucket: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), ControlError> {
        let url = put_url(&session.transport_url, bucket, id);
        debug!(%url, %body, "nest put");
        self.authorized(self.http.post(&url), session)
            .json(body)
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(transport)?;
        Ok(())
    }

    fn authorized(&self, request: RequestBuilder, session: &NestSession) -> RequestBuilder {
        request
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", session.access_token),
            )
            .header("X-nl-protocol-version", NEST_PROTOCOL_VERSION)
    }
}

fn transport(err: reqwest::Error) -> ControlError {
    ControlError::Transport(err.to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn loaded(unit: TemperatureUnit) -> LoadedSession {
        let status: MobileStatus = serde_json::from_value(json!({
            "structure": { "s1": { "devices": ["device.ABC"], "away": true } },
            "shared": {
                "ABC": {
                    "current_temperature": 20.04,
                    "target_temperature": 21.0,
                    "target_temperature_type": "heat"
                }
            }
        }))
        .unwrap();
        let resolved = resolve_status(status, None, 0).unwrap();

        LoadedSession {
            session: NestSession {
                transport_url: "https://transport.example.test".to_string(),
                access_token: "token".to_string(),
                user_id: "1".to_string(),
                serial: None,
            },
            unit,
            structure_id: resolved.structure_id,
            serial: resolved.serial,
            away: resolved.away,
            shared: resolved.shared,
            device: resolved.device,
        }
    }

    #[test]
    fn reads_convert_to_display_units() {
        let fahrenheit = loaded(TemperatureUnit::Fahrenheit);
        // 20.04 C = 68.072 F, shown with one decimal.
        assert!((fahrenheit.current_temp() - 68.1).abs() < 1e-3);
        assert!((fahrenheit.target_temp() - 69.8).abs() < 1e-3);

        let celsius = loaded(TemperatureUnit::Celsius);
        assert!((celsius.current_temp() - 20.0).abs() < 1e-3);
        assert_eq!(celsius.target_temp(), 21.0);
    }

    #[test]
    fn exposes_mode_fan_and_away() {
        let session = loaded(TemperatureUnit::Fahrenheit);
        assert_eq!(session.current_mode(), Some("heat"));
        assert_eq!(session.fan_mode(), None);
        assert!(session.is_away());
        assert_eq!(session.serial(), "ABC");
        assert_eq!(session.structure_id(), "s1");
    }
}
