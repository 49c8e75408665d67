use std::{fmt, str::FromStr};

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatMode {
    Heat,
    Cool,
}

impl ThermostatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "HEAT",
            Self::Cool => "COOL",
        }
    }
}

/// Unit temperatures are displayed, scheduled and reported in. The thermostat
/// itself always works in Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    Celsius,
}

impl TemperatureUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fahrenheit => "F",
            Self::Celsius => "C",
        }
    }

    pub fn from_celsius(self, temp_c: f32) -> f32 {
        match self {
            Self::Fahrenheit => temp_c * 1.8 + 32.0,
            Self::Celsius => temp_c,
        }
    }

    pub fn to_celsius(self, temp: f32) -> f32 {
        match self {
            Self::Fahrenheit => (temp - 32.0) / 1.8,
            Self::Celsius => temp,
        }
    }
}

/// Minute-resolution wall clock time, written `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn from_chrono<T: Timelike>(time: &T) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time of day {0:?}, expected HH:MM")]
pub struct InvalidTimeOfDay(pub String);

impl FromStr for TimeOfDay {
    type Err = InvalidTimeOfDay;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidTimeOfDay(value.to_string());
        let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

/// What gets pushed to the companion web service once per cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportedStatus {
    /// `None` when no schedule entry is active (or the bot is stopped).
    pub target_temp: Option<f32>,
    pub room_temp: f32,
}

impl ReportedStatus {
    pub const NO_TARGET: f32 = -1.0;

    pub fn idle(room_temp: f32) -> Self {
        Self {
            target_temp: None,
            room_temp,
        }
    }

    pub fn wire_target(&self) -> f32 {
        self.target_temp.unwrap_or(Self::NO_TARGET)
    }
}

pub fn round_to(value: f32, decimals: i32) -> f32 {
    let factor = 10f32.powi(decimals);
    (value * factor).round() / factor
}
