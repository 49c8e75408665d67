use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{InvalidTimeOfDay, ThermostatMode, TimeOfDay};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("malformed schedule document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schedule entry {index}: {source}")]
    Time {
        index: usize,
        #[source]
        source: InvalidTimeOfDay,
    },
    #[error("schedule entry {index}: field {field} is not a number ({value:?})")]
    Number {
        index: usize,
        field: &'static str,
        value: String,
    },
    #[error("schedule entry {index}: field {field} is not True/False ({value:?})")]
    Flag {
        index: usize,
        field: &'static str,
        value: String,
    },
    #[error("schedule entry {index}: start {start} is after end {end}")]
    InvertedWindow {
        index: usize,
        start: TimeOfDay,
        end: TimeOfDay,
    },
    #[error("schedule entry {index}: negative dead-band {deadband}")]
    NegativeDeadband { index: usize, deadband: f32 },
    #[error("entries {first} and {second} are both active at {at}")]
    Overlap {
        first: usize,
        second: usize,
        at: TimeOfDay,
    },
}

/// Text or native JSON scalar; schedule files carry numbers and booleans as
/// strings (`"70"`, `"True"`) but plain JSON values are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl RawScalar {
    fn describe(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
            Self::Bool(flag) => flag.to_string(),
        }
    }

    fn as_number(&self, index: usize, field: &'static str) -> Result<f32, ScheduleError> {
        let parsed = match self {
            Self::Number(number) => Some(*number as f32),
            Self::Text(text) => text.trim().parse::<f32>().ok(),
            Self::Bool(_) => None,
        };

        parsed
            .filter(|value| value.is_finite())
            .ok_or_else(|| ScheduleError::Number {
                index,
                field,
                value: self.describe(),
            })
    }

    fn as_flag(&self, index: usize, field: &'static str) -> Result<bool, ScheduleError> {
        match self {
            Self::Bool(flag) => Ok(*flag),
            Self::Text(text) if text.trim().eq_ignore_ascii_case("true") => Ok(true),
            Self::Text(text) if text.trim().eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(ScheduleError::Flag {
                index,
                field,
                value: self.describe(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawScheduleFile {
    schedules: Vec<RawScheduleEntry>,
}

#[derive(Debug, Deserialize)]
struct RawScheduleEntry {
    #[serde(rename = "start-time")]
    start_time: String,
    #[serde(rename = "end-time")]
    end_time: String,
    #[serde(rename = "target-temp")]
    target_temp: RawScalar,
    #[serde(rename = "target-temp-range")]
    target_temp_range: RawScalar,
    heat: RawScalar,
    #[serde(rename = "managed-by-nest")]
    managed_by_nest: RawScalar,
    #[serde(rename = "added-by", default)]
    added_by: String,
}

impl RawScheduleEntry {
    fn into_entry(self, index: usize) -> Result<ScheduleEntry, ScheduleError> {
        let parse_time = |raw: &str| {
            raw.parse::<TimeOfDay>()
                .map_err(|source| ScheduleError::Time { index, source })
        };

        let start = parse_time(&self.start_time)?;
        let end = parse_time(&self.end_time)?;
        if start > end {
            return Err(ScheduleError::InvertedWindow { index, start, end });
        }

        let target_temp = self.target_temp.as_number(index, "target-temp")?;
        let deadband = self.target_temp_range.as_number(index, "target-temp-range")?;
        if deadband < 0.0 {
            return Err(ScheduleError::NegativeDeadband { index, deadband });
        }

        let mode = if self.heat.as_flag(index, "heat")? {
            ThermostatMode::Heat
        } else {
            ThermostatMode::Cool
        };

        Ok(ScheduleEntry {
            start,
            end,
            target_temp,
            deadband,
            mode,
            managed_by_thermostat: self.managed_by_nest.as_flag(index, "managed-by-nest")?,
            added_by: self.added_by,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub target_temp: f32,
    pub deadband: f32,
    pub mode: ThermostatMode,
    /// Delegate regulation to the thermostat's own loop; no dead-band nudging.
    pub managed_by_thermostat: bool,
    pub added_by: String,
}

impl ScheduleEntry {
    /// Both ends inclusive.
    pub fn is_active_at(&self, now: TimeOfDay) -> bool {
        self.start <= now && now <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Apply every active entry in file order; the last one is reported.
    #[default]
    ApplyAll,
    /// Apply only the first active entry.
    FirstMatch,
    /// Treat two simultaneously active entries as a broken schedule.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schedule {
    pub entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn from_json(raw: &str) -> Result<Self, ScheduleError> {
        let file: RawScheduleFile = serde_json::from_str(raw)?;
        let entries = file
            .schedules
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_entry(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn active_at(
        &self,
        now: TimeOfDay,
        policy: OverlapPolicy,
    ) -> Result<Vec<&ScheduleEntry>, ScheduleError> {
        let mut active = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_active_at(now));

        match policy {
            OverlapPolicy::ApplyAll => Ok(active.map(|(_, entry)| entry).collect()),
            OverlapPolicy::FirstMatch => Ok(active
                .next()
                .map(|(_, entry)| entry)
                .into_iter()
                .collect()),
            OverlapPolicy::Reject => {
                let first = active.next();
                if let (Some((first, _)), Some((second, _))) = (first, active.next()) {
                    return Err(ScheduleError::Overlap {
                        first,
                        second,
                        at: now,
                    });
                }
                Ok(first.map(|(_, entry)| entry).into_iter().collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(raw: &str) -> TimeOfDay {
        raw.parse().unwrap()
    }

    const TWO_WINDOWS: &str = r#"{
        "schedules": [
            {
                "start-time": "07:00",
                "end-time": "09:00",
                "target-temp": "70",
                "target-temp-range": "2",
                "heat": "True",
                "managed-by-nest": "False",
                "added-by": "kitchen"
            },
            {
                "start-time": "08:30",
                "end-time": "22:00",
                "target-temp": 66.5,
                "target-temp-range": 1.5,
                "heat": "False",
                "managed-by-nest": true,
                "added-by": "hallway"
            }
        ]
    }"#;

    #[test]
    fn parses_string_encoded_fields() {
        let schedule = Schedule::from_json(TWO_WINDOWS).unwrap();

        assert_eq!(
            schedule.entries[0],
            ScheduleEntry {
                start: at("07:00"),
                end: at("09:00"),
                target_temp: 70.0,
                deadband: 2.0,
                mode: ThermostatMode::Heat,
                managed_by_thermostat: false,
                added_by: "kitchen".to_string(),
            }
        );
        assert_eq!(schedule.entries[1].mode, ThermostatMode::Cool);
        assert!(schedule.entries[1].managed_by_thermostat);
        assert_eq!(schedule.entries[1].target_temp, 66.5);
    }

    #[test]
    fn window_is_inclusive_at_both_ends() {
        let schedule = Schedule::from_json(TWO_WINDOWS).unwrap();
        let entry = &schedule.entries[0];

        assert!(!entry.is_active_at(at("06:59")));
        assert!(entry.is_active_at(at("07:00")));
        assert!(entry.is_active_at(at("08:00")));
        assert!(entry.is_active_at(at("09:00")));
        assert!(!entry.is_active_at(at("09:01")));
    }

    #[test]
    fn apply_all_keeps_file_order() {
        let schedule = Schedule::from_json(TWO_WINDOWS).unwrap();
        let active = schedule.active_at(at("08:45"), OverlapPolicy::ApplyAll).unwrap();

        let owners: Vec<_> = active.iter().map(|entry| entry.added_by.as_str()).collect();
        assert_eq!(owners, vec!["kitchen", "hallway"]);
    }

    #[test]
    fn first_match_applies_only_earliest_entry() {
        let schedule = Schedule::from_json(TWO_WINDOWS).unwrap();
        let active = schedule
            .active_at(at("08:45"), OverlapPolicy::FirstMatch)
            .unwrap();

        assert_eq!(active.len(), 1);
        assert_eq!(active[0].added_by, "kitchen");
    }

    #[test]
    fn reject_policy_flags_overlap() {
        let schedule = Schedule::from_json(TWO_WINDOWS).unwrap();

        let err = schedule
            .active_at(at("08:45"), OverlapPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::Overlap { first: 0, second: 1, .. }));

        let single = schedule.active_at(at("12:00"), OverlapPolicy::Reject).unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn nothing_active_outside_windows() {
        let schedule = Schedule::from_json(TWO_WINDOWS).unwrap();
        assert!(schedule
            .active_at(at("23:15"), OverlapPolicy::ApplyAll)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rejects_bad_flag_spelling() {
        let raw = TWO_WINDOWS.replace("\"heat\": \"True\"", "\"heat\": \"yes\"");
        let err = Schedule::from_json(&raw).unwrap_err();
        assert!(matches!(err, ScheduleError::Flag { index: 0, field: "heat", .. }));
    }

    #[test]
    fn rejects_inverted_window() {
        let raw = TWO_WINDOWS.replace("\"end-time\": \"09:00\"", "\"end-time\": \"06:00\"");
        let err = Schedule::from_json(&raw).unwrap_err();
        assert!(matches!(err, ScheduleError::InvertedWindow { index: 0, .. }));
    }

    #[test]
    fn rejects_non_numeric_target() {
        let raw = TWO_WINDOWS.replace("\"target-temp\": \"70\"", "\"target-temp\": \"warm\"");
        let err = Schedule::from_json(&raw).unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::Number {
                index: 0,
                field: "target-temp",
                ..
            }
        ));
    }

    #[test]
    fn rejects_document_without_schedules() {
        assert!(matches!(
            Schedule::from_json(r#"{"rules": []}"#),
            Err(ScheduleError::Json(_))
        ));
    }
}
