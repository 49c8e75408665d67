use std::collections::{BTreeMap, HashMap};

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use controlbot_common::{ControlError, NEST_PUT_PATH};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    pub urls: LoginUrls,
    pub access_token: String,
    pub userid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginUrls {
    pub transport_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MobileStatus {
    pub structure: BTreeMap<String, StructureRecord>,
    #[serde(default)]
    pub device: HashMap<String, DeviceRecord>,
    pub shared: HashMap<String, SharedRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StructureRecord {
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub away: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DeviceRecord {
    #[serde(default)]
    pub fan_mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SharedRecord {
    pub current_temperature: f32,
    pub target_temperature: f32,
    #[serde(default)]
    pub target_temperature_type: Option<String>,
}

/// Rejected credentials come back as 400/401/403; anything else that is not a
/// success is the transport's fault.
pub(crate) fn login_error(status: StatusCode) -> Option<ControlError> {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(
            ControlError::Auth(format!("login rejected with {status}")),
        ),
        status if !status.is_success() => Some(ControlError::Transport(format!(
            "login failed with {status}"
        ))),
        _ => None,
    }
}

pub(crate) fn parse_login(body: &[u8]) -> Result<LoginResponse, ControlError> {
    serde_json::from_slice(body)
        .map_err(|err| ControlError::Auth(format!("unexpected login response: {err}")))
}

/// The pieces of a status document the client acts on.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedStatus {
    pub structure_id: String,
    pub serial: String,
    pub away: bool,
    pub shared: SharedRecord,
    pub device: DeviceRecord,
}

/// Picks the first structure and, unless `serial` is given, the device at
/// `device_index` within it (`"device.<serial>"`).
pub(crate) fn resolve_status(
    mut status: MobileStatus,
    serial: Option<&str>,
    device_index: usize,
) -> Result<ResolvedStatus, ControlError> {
    let (structure_id, structure) = status
        .structure
        .into_iter()
        .next()
        .ok_or_else(|| ControlError::Transport("status has no structure".to_string()))?;

    let serial = match serial {
        Some(serial) => serial.to_string(),
        None => {
            let device_id = structure.devices.get(device_index).ok_or_else(|| {
                ControlError::Transport(format!(
                    "structure {structure_id} has no device at index {device_index}"
                ))
            })?;
            device_id
                .split_once('.')
                .map(|(_, serial)| serial.to_string())
                .ok_or_else(|| {
                    ControlError::Transport(format!("unexpected device id {device_id:?}"))
                })?
        }
    };

    let shared = status
        .shared
        .remove(&serial)
        .ok_or_else(|| ControlError::Transport(format!("no shared record for {serial}")))?;
    let device = status.device.remove(&serial).unwrap_or_default();

    Ok(ResolvedStatus {
        structure_id,
        serial,
        away: structure.away,
        shared,
        device,
    })
}

pub(crate) fn put_url(transport_url: &str, bucket: &str, id: &str) -> String {
    format!(
        "{}{NEST_PUT_PATH}{bucket}.{id}",
        transport_url.trim_end_matches('/')
    )
}

pub(crate) fn target_update(target_c: f32) -> Value {
    json!({
        "target_change_pending": true,
        "target_temperature": target_c,
    })
}

pub(crate) fn target_type_update(mode: &str) -> Value {
    json!({ "target_temperature_type": mode })
}

pub(crate) fn fan_update(mode: &str) -> Value {
    json!({ "fan_mode": mode })
}

pub(crate) fn away_update(was_away: bool) -> Value {
    json!({ "away": !was_away })
}
