use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use chrono_tz::Tz;
use tracing::{info, warn};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use controlbot_common::{
    config::LoggingConfig, ControlError, Credentials, RuntimeConfig, TemperatureUnit,
    ThermostatEngine, TimeOfDay,
};
use controlbot_sensor::W1ThermSensor;
use nest_client::{LoadedSession, NestClient};

use crate::{
    cycle::{Controller, RoomSensor, Thermostat},
    retry::RetryPolicy,
    store::{load_credentials, load_runtime_config, ScheduleStore},
    webapp::WebappClient,
};

impl RoomSensor for W1ThermSensor {
    async fn room_temperature(&self, unit: TemperatureUnit) -> Result<f32, ControlError> {
        Ok(self.read(unit).await?)
    }
}

/// Nest account bound to its credentials; one session per cycle.
struct NestThermostat {
    client: NestClient,
    credentials: Credentials,
}

impl Thermostat for NestThermostat {
    type Session = LoadedSession;

    async fn open_session(&self) -> Result<LoadedSession, ControlError> {
        let session = self.client.login(&self.credentials).await?;
        self.client.fetch_status(&session).await
    }

    fn current_temp(&self, session: &LoadedSession) -> f32 {
        session.current_temp()
    }

    fn target_temp(&self, session: &LoadedSession) -> f32 {
        session.target_temp()
    }

    async fn set_target(&self, session: &LoadedSession, temp: f32) -> Result<(), ControlError> {
        self.client.set_target(session, temp).await
    }
}

pub async fn run() -> anyhow::Result<()> {
    let config_path = std::env::var("CONTROLBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./controlbot.json"));
    let mut runtime = load_runtime_config(&config_path).await?;
    apply_env_overrides(&mut runtime);
    runtime.sanitize();

    let _log_guard = init_tracing(&runtime.logging)?;

    let timezone: Tz = runtime
        .timezone
        .parse()
        .map_err(|_| ControlError::Config(format!("unknown timezone {:?}", runtime.timezone)))?;

    let credentials = load_credentials(&runtime.files)
        .await
        .context("failed to load credentials")?;

    let sensor = W1ThermSensor::open(
        &runtime.sensor.w1_devices_dir,
        runtime.sensor.sensor_id.as_deref(),
    )
    .await
    .map_err(ControlError::from)
    .context("failed to locate room sensor")?;

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let controller = Controller {
        engine: ThermostatEngine::new(runtime.control.clone()),
        retry: RetryPolicy::from_config(&runtime.retry),
        unit: runtime.unit,
        sensor,
        schedule: ScheduleStore::new(runtime.files.schedule.clone()),
        status: WebappClient::new(
            http.clone(),
            runtime.webapp.base_url.clone(),
            credentials.webapp_password.clone(),
        ),
        thermostat: NestThermostat {
            client: NestClient::new(http, runtime.nest.clone(), runtime.unit),
            credentials,
        },
    };

    let poll_interval = runtime.control.poll_interval();
    info!(
        "controlbot started: timezone {timezone}, unit {}, polling every {}s",
        runtime.unit.as_str(),
        poll_interval.as_secs()
    );

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C"),
            Err(err) => {
                warn!("failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    controller
        .run_until(|| now_in_timezone(timezone), poll_interval, shutdown)
        .await
        .context("control cycle failed")
}

fn apply_env_overrides(runtime: &mut RuntimeConfig) {
    if let Ok(timezone) = std::env::var("CONTROLBOT_TIMEZONE") {
        runtime.timezone = timezone;
    }
    if let Ok(url) = std::env::var("CONTROLBOT_WEBAPP_URL") {
        runtime.webapp.base_url = url;
    }
    if let Ok(path) = std::env::var("CONTROLBOT_SCHEDULE_FILE") {
        runtime.files.schedule = PathBuf::from(path);
    }
}

/// Stdout plus a rotating log file. The returned guard flushes the file
/// writer on drop.
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(logging.file_prefix.clone())
        .filename_suffix("log")
        .max_log_files(logging.max_files)
        .build(&logging.directory)
        .with_context(|| {
            format!(
                "failed to open log directory {}",
                logging.directory.display()
            )
        })?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(guard)
}

fn now_in_timezone(timezone: Tz) -> TimeOfDay {
    TimeOfDay::from_chrono(&Utc::now().with_timezone(&timezone))
}
