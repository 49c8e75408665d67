use std::{future::Future, time::Duration};

use tracing::{debug, error, info};

use controlbot_common::{
    ControlError, EngineAction, ReportedStatus, Schedule, TemperatureUnit, ThermostatEngine,
    TimeOfDay,
};

use crate::retry::RetryPolicy;

pub(crate) trait RoomSensor {
    async fn room_temperature(&self, unit: TemperatureUnit) -> Result<f32, ControlError>;
}

pub(crate) trait ScheduleSource {
    async fn load(&self) -> Result<Schedule, ControlError>;
}

pub(crate) trait StatusService {
    async fn stop_requested(&self) -> Result<bool, ControlError>;
    async fn report(&self, status: ReportedStatus) -> Result<(), ControlError>;
}

pub(crate) trait Thermostat {
    type Session;

    /// Log in and load the device status.
    async fn open_session(&self) -> Result<Self::Session, ControlError>;
    fn current_temp(&self, session: &Self::Session) -> f32;
    fn target_temp(&self, session: &Self::Session) -> f32;
    async fn set_target(&self, session: &Self::Session, temp: f32) -> Result<(), ControlError>;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CycleOutcome {
    pub status: ReportedStatus,
    pub actions: Vec<EngineAction>,
    pub stopped: bool,
}

pub(crate) struct Controller<S, D, R, T> {
    pub engine: ThermostatEngine,
    pub retry: RetryPolicy,
    pub unit: TemperatureUnit,
    pub sensor: S,
    pub schedule: D,
    pub status: R,
    pub thermostat: T,
}

impl<S, D, R, T> Controller<S, D, R, T>
where
    S: RoomSensor,
    D: ScheduleSource,
    R: StatusService,
    T: Thermostat,
{
    pub async fn run_cycle(&self, now: TimeOfDay) -> Result<CycleOutcome, ControlError> {
        let room_temp = self.sensor.room_temperature(self.unit).await?;

        let stopped = self
            .retry
            .run("webapp stop flag", || self.status.stop_requested())
            .await?;
        if stopped {
            info!("controlbot is turned off from the webapp");
            let status = ReportedStatus::idle(room_temp);
            self.report(status).await?;
            return Ok(CycleOutcome {
                status,
                actions: Vec::new(),
                stopped: true,
            });
        }

        let schedule = self.schedule.load().await?;
        let active = self.engine.active_entries(&schedule, now)?;
        let mut actions = Vec::with_capacity(active.len());

        if active.is_empty() {
            info!("no schedule active at {now}, room temperature is {room_temp:.2}");
        } else {
            let session = self
                .retry
                .run("thermostat status", || self.thermostat.open_session())
                .await?;
            let session = &session;
            let thermostat_temp = self.thermostat.current_temp(session);

            for entry in &active {
                info!(
                    "schedule {} to {} with target {} is active (added by {})",
                    entry.start, entry.end, entry.target_temp, entry.added_by
                );
                let action = self.engine.decide(entry, room_temp, thermostat_temp);
                match action {
                    EngineAction::SetManaged(target) => {
                        info!("schedule is managed by the thermostat, setting it to {target}");
                    }
                    EngineAction::StepToward(target) => info!(
                        "room is {room_temp:.2}, {} needs to run: moving target {} -> {target}",
                        entry.mode.as_str(),
                        self.thermostat.target_temp(session)
                    ),
                    EngineAction::StepAway(target) => info!(
                        "room is {room_temp:.2}, goal {} reached: moving target away from current {thermostat_temp} to {target}",
                        entry.target_temp
                    ),
                    EngineAction::Hold => {
                        info!("room is {room_temp:.2}, inside the dead-band, doing nothing");
                    }
                }

                if let Some(setpoint) = action.setpoint() {
                    self.retry
                        .run("thermostat set target", || {
                            self.thermostat.set_target(session, setpoint)
                        })
                        .await?;
                }
                actions.push(action);
            }

            info!(
                "room is {room_temp:.2}, thermostat reads {thermostat_temp}, its target was {}",
                self.thermostat.target_temp(session)
            );
        }

        let status = ReportedStatus {
            target_temp: self.engine.reported_target(&active),
            room_temp,
        };
        self.report(status).await?;

        Ok(CycleOutcome {
            status,
            actions,
            stopped: false,
        })
    }

    /// Runs a cycle every `poll_interval` until `shutdown` resolves, which may
    /// interrupt a cycle that is still in flight.
    pub async fn run_until<C, F>(
        &self,
        clock: C,
        poll_interval: Duration,
        shutdown: F,
    ) -> Result<(), ControlError>
    where
        C: Fn() -> TimeOfDay,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let now = clock();
            tokio::select! {
                result = self.run_cycle(now) => match result {
                    Ok(outcome) if outcome.stopped => debug!("cycle at {now} skipped, bot is stopped"),
                    Ok(outcome) => debug!(
                        commands = outcome.actions.iter().filter_map(|action| action.setpoint()).count(),
                        reported_target = outcome.status.wire_target(),
                        "cycle at {now} complete"
                    ),
                    Err(err) => {
                        error!(kind = err.kind(), "control cycle at {now} failed: {err}");
                        return Err(err);
                    }
                },
                _ = &mut shutdown => {
                    info!("shutting down, abandoning the cycle started at {now}");
                    return Ok(());
                }
            }
            info!("{}", "-".repeat(50));

            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn report(&self, status: ReportedStatus) -> Result<(), ControlError> {
        self.retry
            .run("webapp status update", || self.status.report(status))
            .await
    }
}
