use std::{fmt, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{schedule::OverlapPolicy, types::TemperatureUnit};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub poll_interval_secs: u64,
    /// Nudge applied to the thermostat setpoint while heating, display units.
    pub heat_step: f32,
    /// Nudge applied to the thermostat setpoint while cooling, display units.
    pub cool_step: f32,
    pub overlap: OverlapPolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 300,
            heat_step: 1.0,
            cool_step: 1.5,
            overlap: OverlapPolicy::ApplyAll,
        }
    }
}

impl ControlConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            backoff_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub schedule: PathBuf,
    pub login: PathBuf,
    pub password: PathBuf,
    pub serial: PathBuf,
    pub webapp_password: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            schedule: PathBuf::from("schedules.json"),
            login: PathBuf::from(".nest_username"),
            password: PathBuf::from(".nest_password"),
            serial: PathBuf::from(".serial"),
            webapp_password: PathBuf::from(".webapp_password"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NestConfig {
    pub login_url: String,
    pub user_agent: String,
    /// Which device of the first structure to drive when no serial is configured.
    pub device_index: usize,
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            login_url: "https://home.nest.com/user/login".to_string(),
            user_agent: "Nest/1.1.0.10 CFNetwork/548.0.4".to_string(),
            device_index: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebappConfig {
    pub base_url: String,
}

impl Default for WebappConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mistry-nest-controlbot.appspot.com/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub w1_devices_dir: PathBuf,
    pub sensor_id: Option<String>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            w1_devices_dir: PathBuf::from("/sys/bus/w1/devices"),
            sensor_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: "nest_controlbot".to_string(),
            max_files: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub control: ControlConfig,
    pub retry: RetryConfig,
    pub files: FileConfig,
    pub nest: NestConfig,
    pub webapp: WebappConfig,
    pub sensor: SensorConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
    pub unit: TemperatureUnit,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            retry: RetryConfig::default(),
            files: FileConfig::default(),
            nest: NestConfig::default(),
            webapp: WebappConfig::default(),
            sensor: SensorConfig::default(),
            logging: LoggingConfig::default(),
            timezone: "US/Eastern".to_string(),
            unit: TemperatureUnit::Fahrenheit,
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.control.poll_interval_secs = self.control.poll_interval_secs.clamp(10, 3_600);
        self.control.heat_step = self.control.heat_step.clamp(0.1, 5.0);
        self.control.cool_step = self.control.cool_step.clamp(0.1, 5.0);

        if self.retry.max_attempts == 0 {
            self.retry.max_attempts = 1;
        }
        self.retry.backoff_secs = self.retry.backoff_secs.min(3_600);

        if self.logging.max_files == 0 {
            self.logging.max_files = 1;
        }

        if !self.webapp.base_url.ends_with('/') {
            self.webapp.base_url.push('/');
        }
    }
}

/// Account secrets read from the credential files at startup.
#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
    pub serial: Option<String>,
    pub webapp_password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("serial", &self.serial)
            .field("webapp_password", &"<redacted>")
            .finish()
    }
}
