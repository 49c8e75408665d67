use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Context;
use tracing::warn;

use controlbot_common::{
    config::FileConfig, ControlError, Credentials, RuntimeConfig, Schedule,
};

use crate::cycle::ScheduleSource;

pub async fn load_runtime_config(path: &Path) -> anyhow::Result<RuntimeConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<RuntimeConfig>(&raw)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Contents of a one-value file with trailing whitespace removed. Missing and
/// empty files both read as `None`.
async fn read_value(path: &Path) -> Result<Option<String>, ControlError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => {
            let value = raw.trim_end();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ControlError::Config(format!(
            "failed to read {}: {err}",
            path.display()
        ))),
    }
}

async fn require_value(path: &Path) -> Result<String, ControlError> {
    read_value(path)
        .await?
        .ok_or_else(|| ControlError::Config(format!("must create {}", path.display())))
}

pub async fn load_credentials(files: &FileConfig) -> Result<Credentials, ControlError> {
    let login = require_value(&files.login).await?;
    let password = require_value(&files.password).await?;
    let webapp_password = require_value(&files.webapp_password).await?;
    let serial = read_value(&files.serial).await?;
    if serial.is_none() {
        warn!(
            "{} not found, using the first device of the account",
            files.serial.display()
        );
    }

    Ok(Credentials {
        login,
        password,
        serial,
        webapp_password,
    })
}

/// Re-reads the schedule file on every load so edits apply on the next cycle.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    path: PathBuf,
}

impl ScheduleStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ScheduleSource for ScheduleStore {
    async fn load(&self) -> Result<Schedule, ControlError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            ControlError::Config(format!("failed to read {}: {err}", self.path.display()))
        })?;
        Ok(Schedule::from_json(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("controlbot-store-{name}-{nanos}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn files_in(dir: &Path) -> FileConfig {
        FileConfig {
            schedule: dir.join("schedules.json"),
            login: dir.join(".nest_username"),
            password: dir.join(".nest_password"),
            serial: dir.join(".serial"),
            webapp_password: dir.join(".webapp_password"),
        }
    }

    #[tokio::test]
    async fn credentials_are_trimmed_and_serial_optional() {
        let dir = scratch_dir("credentials");
        let files = files_in(&dir);
        std::fs::write(&files.login, "me@example.test\n").unwrap();
        std::fs::write(&files.password, "hunter2  \n").unwrap();
        std::fs::write(&files.webapp_password, "s3cret\r\n").unwrap();

        let credentials = load_credentials(&files).await.unwrap();
        assert_eq!(credentials.login, "me@example.test");
        assert_eq!(credentials.password, "hunter2");
        assert_eq!(credentials.webapp_password, "s3cret");
        assert_eq!(credentials.serial, None);

        std::fs::write(&files.serial, "02AA01AC\n").unwrap();
        let credentials = load_credentials(&files).await.unwrap();
        assert_eq!(credentials.serial.as_deref(), Some("02AA01AC"));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn missing_password_is_config_error() {
        let dir = scratch_dir("missing");
        let files = files_in(&dir);
        std::fs::write(&files.login, "me@example.test\n").unwrap();
        std::fs::write(&files.password, "\n").unwrap();
        std::fs::write(&files.webapp_password, "s3cret\n").unwrap();

        let err = load_credentials(&files).await.unwrap_err();
        assert!(matches!(err, ControlError::Config(message) if message.contains(".nest_password")));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn schedule_is_reloaded_on_every_call() {
        let dir = scratch_dir("schedule");
        let path = dir.join("schedules.json");
        let store = ScheduleStore::new(path.clone());

        assert!(matches!(store.load().await, Err(ControlError::Config(_))));

        std::fs::write(&path, r#"{"schedules": []}"#).unwrap();
        assert!(store.load().await.unwrap().entries.is_empty());

        std::fs::write(
            &path,
            r#"{"schedules": [{"start-time": "07:00", "end-time": "09:00",
                "target-temp": "70", "target-temp-range": "2", "heat": "True",
                "managed-by-nest": "False", "added-by": "test"}]}"#,
        )
        .unwrap();
        assert_eq!(store.load().await.unwrap().entries.len(), 1);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(store.load().await, Err(ControlError::Config(_))));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn missing_config_file_means_defaults() {
        let dir = scratch_dir("config");
        let config = load_runtime_config(&dir.join("controlbot.json")).await.unwrap();
        assert_eq!(config.control.poll_interval_secs, 300);

        std::fs::write(dir.join("bad.json"), "{ broken").unwrap();
        assert!(load_runtime_config(&dir.join("bad.json")).await.is_err());

        std::fs::remove_dir_all(dir).ok();
    }
}
