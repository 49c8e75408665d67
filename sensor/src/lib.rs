//! Room temperature from a 1-Wire thermometer (DS18B20 and friends) through
//! the Linux `w1_therm` sysfs interface.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use controlbot_common::{types::round_to, ControlError, TemperatureUnit};
use thiserror::Error;
use tracing::{debug, info};

/// Family codes of the thermometers `w1_therm` knows how to read.
const THERMOMETER_FAMILIES: &[&str] = &["10", "22", "28", "3b", "42"];

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no 1-Wire thermometer found under {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CRC check failed for {0}")]
    Crc(String),
    #[error("unexpected w1_slave payload: {0:?}")]
    Malformed(String),
}

impl From<SensorError> for ControlError {
    fn from(err: SensorError) -> Self {
        ControlError::Hardware(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct W1ThermSensor {
    id: String,
    slave_path: PathBuf,
}

impl W1ThermSensor {
    /// Uses the configured sensor id if any, otherwise the first thermometer
    /// under `devices_dir` in sorted order.
    pub async fn open(devices_dir: &Path, sensor_id: Option<&str>) -> Result<Self, SensorError> {
        match sensor_id {
            Some(id) => Ok(Self::with_id(devices_dir, id)),
            None => Self::discover(devices_dir).await,
        }
    }

    pub fn with_id(devices_dir: &Path, id: &str) -> Self {
        Self {
            id: id.to_string(),
            slave_path: devices_dir.join(id).join("w1_slave"),
        }
    }

    pub async fn discover(devices_dir: &Path) -> Result<Self, SensorError> {
        let mut entries = match tokio::fs::read_dir(devices_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(SensorError::NotFound(devices_dir.to_path_buf()))
            }
            Err(source) => {
                return Err(SensorError::Io {
                    path: devices_dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut candidates = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| SensorError::Io {
                path: devices_dir.to_path_buf(),
                source,
            })?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_thermometer(&name) {
                candidates.push(name);
            }
        }

        candidates.sort();
        let id = candidates
            .into_iter()
            .next()
            .ok_or_else(|| SensorError::NotFound(devices_dir.to_path_buf()))?;

        info!("using 1-Wire thermometer {id}");
        Ok(Self::with_id(devices_dir, &id))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn read_celsius(&self) -> Result<f32, SensorError> {
        let raw = tokio::fs::read_to_string(&self.slave_path)
            .await
            .map_err(|source| SensorError::Io {
                path: self.slave_path.clone(),
                source,
            })?;
        parse_w1_slave(&self.id, &raw)
    }

    /// Temperature in `unit`, rounded to two decimals.
    pub async fn read(&self, unit: TemperatureUnit) -> Result<f32, SensorError> {
        let temp_c = self.read_celsius().await?;
        let temp = round_to(unit.from_celsius(temp_c), 2);
        debug!(sensor = %self.id, "room temperature {temp:.2}{}", unit.as_str());
        Ok(temp)
    }
}

fn is_thermometer(name: &str) -> bool {
    name.split_once('-')
        .map(|(family, _)| THERMOMETER_FAMILIES.contains(&family.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Parses the two-line `w1_slave` format:
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
pub fn parse_w1_slave(id: &str, raw: &str) -> Result<f32, SensorError> {
    let mut lines = raw.lines();
    let crc_line = lines
        .next()
        .ok_or_else(|| SensorError::Malformed(raw.to_string()))?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(SensorError::Crc(id.to_string()));
    }

    let millis = lines
        .next()
        .and_then(|line| line.rsplit_once("t="))
        .and_then(|(_, value)| value.trim().parse::<i32>().ok())
        .ok_or_else(|| SensorError::Malformed(raw.to_string()))?;

    Ok(millis as f32 / 1000.0)
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    const GOOD: &str = "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("controlbot-sensor-{name}-{nanos}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn add_device(root: &Path, id: &str, payload: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("w1_slave"), payload).unwrap();
    }

    #[test]
    fn parses_positive_and_negative_readings() {
        assert_eq!(parse_w1_slave("28-a", GOOD).unwrap(), 23.125);

        let freezing = GOOD.replace("t=23125", "t=-1250");
        assert_eq!(parse_w1_slave("28-a", &freezing).unwrap(), -1.25);
    }

    #[test]
    fn rejects_failed_crc() {
        let bad = GOOD.replace("YES", "NO");
        assert!(matches!(parse_w1_slave("28-a", &bad), Err(SensorError::Crc(_))));
    }

    #[test]
    fn rejects_missing_temperature() {
        let truncated = GOOD.lines().next().unwrap();
        assert!(matches!(
            parse_w1_slave("28-a", truncated),
            Err(SensorError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn discovers_first_thermometer_and_reads_fahrenheit() {
        let root = scratch_dir("discover");
        std::fs::create_dir_all(root.join("w1_bus_master1")).unwrap();
        add_device(&root, "28-0000000000bb", &GOOD.replace("t=23125", "t=20000"));
        add_device(&root, "28-0000000000aa", GOOD);

        let sensor = W1ThermSensor::open(&root, None).await.unwrap();
        assert_eq!(sensor.id(), "28-0000000000aa");

        // 23.125 C = 73.625 F
        let temp = sensor.read(TemperatureUnit::Fahrenheit).await.unwrap();
        assert!((temp - 73.625).abs() < 0.01, "got {temp}");

        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn configured_id_skips_discovery() {
        let root = scratch_dir("configured");
        add_device(&root, "28-0000000000aa", GOOD);
        add_device(&root, "28-0000000000bb", &GOOD.replace("t=23125", "t=19500"));

        let sensor = W1ThermSensor::open(&root, Some("28-0000000000bb"))
            .await
            .unwrap();
        assert_eq!(sensor.read(TemperatureUnit::Celsius).await.unwrap(), 19.5);

        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn missing_bus_is_a_hardware_error() {
        let parent = scratch_dir("empty");
        let err = W1ThermSensor::open(&parent.join("absent"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SensorError::NotFound(_)));
        assert!(matches!(ControlError::from(err), ControlError::Hardware(_)));

        std::fs::remove_dir_all(parent).ok();
    }

    #[tokio::test]
    async fn unplugged_sensor_fails_to_read() {
        let root = scratch_dir("unplugged");
        let sensor = W1ThermSensor::with_id(&root, "28-000000000404");
        assert!(matches!(
            sensor.read_celsius().await,
            Err(SensorError::Io { .. })
        ));
        std::fs::remove_dir_all(root).ok();
    }
}
