pub mod config;
pub mod endpoints;
pub mod error;
pub mod schedule;
pub mod thermostat;
pub mod types;

pub use config::{Credentials, RuntimeConfig};
pub use endpoints::*;
pub use error::ControlError;
pub use schedule::{OverlapPolicy, Schedule, ScheduleEntry, ScheduleError};
pub use thermostat::{EngineAction, ThermostatEngine};
pub use types::{ReportedStatus, TemperatureUnit, ThermostatMode, TimeOfDay};
