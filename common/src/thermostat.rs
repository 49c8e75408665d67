use crate::{
    config::ControlConfig,
    schedule::{Schedule, ScheduleEntry, ScheduleError},
    types::{ThermostatMode, TimeOfDay},
};

/// Outcome of evaluating one active schedule entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineAction {
    /// Entry is thermostat-managed; hand it the schedule target as-is.
    SetManaged(f32),
    /// Room is outside the dead-band on the far side; push the setpoint toward the goal.
    StepToward(f32),
    /// Goal reached; push the setpoint away so the thermostat idles.
    StepAway(f32),
    /// Room is inside the dead-band.
    Hold,
}

impl EngineAction {
    /// Setpoint to push to the thermostat, if any.
    pub fn setpoint(self) -> Option<f32> {
        match self {
            Self::SetManaged(temp) | Self::StepToward(temp) | Self::StepAway(temp) => Some(temp),
            Self::Hold => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThermostatEngine {
    pub config: ControlConfig,
}

impl ThermostatEngine {
    pub fn new(config: ControlConfig) -> Self {
        Self { config }
    }

    pub fn active_entries<'a>(
        &self,
        schedule: &'a Schedule,
        now: TimeOfDay,
    ) -> Result<Vec<&'a ScheduleEntry>, ScheduleError> {
        schedule.active_at(now, self.config.overlap)
    }

    /// Target reported upstream for a set of active entries: the last one applied.
    pub fn reported_target(&self, active: &[&ScheduleEntry]) -> Option<f32> {
        active.last().map(|entry| entry.target_temp)
    }

    pub fn decide(
        &self,
        entry: &ScheduleEntry,
        room_temp: f32,
        thermostat_temp: f32,
    ) -> EngineAction {
        if entry.managed_by_thermostat {
            return EngineAction::SetManaged(entry.target_temp);
        }

        let (activate, outside_range, step) = match entry.mode {
            ThermostatMode::Heat => (
                room_temp < entry.target_temp - entry.deadband,
                room_temp >= entry.target_temp,
                self.config.heat_step,
            ),
            ThermostatMode::Cool => (
                room_temp > entry.target_temp + entry.deadband,
                room_temp <= entry.target_temp,
                -self.config.cool_step,
            ),
        };

        if activate {
            EngineAction::StepToward(thermostat_temp + step)
        } else if outside_range {
            EngineAction::StepAway(thermostat_temp - step)
        } else {
            EngineAction::Hold
        }
    }
}
