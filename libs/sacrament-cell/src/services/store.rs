// libs/sacrament-cell/src/services/store.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, SacramentError, Schedule, ServiceDefinition};
use crate::services::availability::SlotAvailabilityTracker;

/// Persistence seam for the engine.
///
/// `insert_appointment_checked` and `replace_appointment` are the two
/// write paths that must be atomic in any implementation.
#[async_trait]
pub trait SacramentStore: Send + Sync {
    async fn upsert_service(&self, service: ServiceDefinition) -> Result<ServiceDefinition, SacramentError>;

    async fn get_service(&self, service_id: Uuid) -> Result<ServiceDefinition, SacramentError>;

    async fn upsert_schedule(&self, schedule: Schedule) -> Result<Schedule, SacramentError>;

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Schedule, SacramentError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SacramentError>;

    async fn list_appointments(&self, service_filter: Option<Uuid>) -> Result<Vec<Appointment>, SacramentError>;

    /// Appointments booked on a schedule for the given dates.
    async fn schedule_appointments(
        &self,
        schedule_id: Uuid,
        dates: &[NaiveDate],
    ) -> Result<Vec<Appointment>, SacramentError>;

    /// Re-reads the schedule and the slot's active count, then inserts, as
    /// one atomic unit. Fails with `SlotUnavailable` when the slot is full.
    async fn insert_appointment_checked(&self, appointment: Appointment) -> Result<Appointment, SacramentError>;

    /// Compare-and-swap on `version`. The stored copy gets
    /// `expected_version + 1`.
    async fn replace_appointment(
        &self,
        appointment: Appointment,
        expected_version: u64,
    ) -> Result<Appointment, SacramentError>;
}

#[derive(Default)]
struct StoreState {
    services: HashMap<Uuid, ServiceDefinition>,
    schedules: HashMap<Uuid, Schedule>,
    appointments: HashMap<Uuid, Appointment>,
}

/// Process-local store. One lock guards the whole aggregate so the capacity
/// check and the insert cannot interleave with another booking.
#[derive(Default)]
pub struct InMemorySacramentStore {
    state: Mutex<StoreState>,
    availability: SlotAvailabilityTracker,
}

impl InMemorySacramentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SacramentStore for InMemorySacramentStore {
    async fn upsert_service(&self, service: ServiceDefinition) -> Result<ServiceDefinition, SacramentError> {
        let mut state = self.state.lock().await;
        state.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn get_service(&self, service_id: Uuid) -> Result<ServiceDefinition, SacramentError> {
        let state = self.state.lock().await;
        state
            .services
            .get(&service_id)
            .cloned()
            .ok_or(SacramentError::ServiceNotFound(service_id))
    }

    async fn upsert_schedule(&self, schedule: Schedule) -> Result<Schedule, SacramentError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.schedules.get(&schedule.id) {
            if existing.service_id != schedule.service_id {
                return Err(SacramentError::ValidationError(format!(
                    "Schedule {} already belongs to service {}",
                    schedule.id, existing.service_id
                )));
            }
        }
        state.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Schedule, SacramentError> {
        let state = self.state.lock().await;
        state
            .schedules
            .get(&schedule_id)
            .cloned()
            .ok_or(SacramentError::ScheduleNotFound(schedule_id))
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SacramentError> {
        let state = self.state.lock().await;
        state
            .appointments
            .get(&appointment_id)
            .cloned()
            .ok_or(SacramentError::AppointmentNotFound(appointment_id))
    }

    async fn list_appointments(&self, service_filter: Option<Uuid>) -> Result<Vec<Appointment>, SacramentError> {
        let state = self.state.lock().await;
        let mut appointments: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|a| service_filter.map_or(true, |id| a.service_id == id))
            .cloned()
            .collect();
        appointments.sort_by_key(|a| (a.date, a.created_at));
        Ok(appointments)
    }

    async fn schedule_appointments(
        &self,
        schedule_id: Uuid,
        dates: &[NaiveDate],
    ) -> Result<Vec<Appointment>, SacramentError> {
        let state = self.state.lock().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| a.schedule_id == schedule_id && dates.contains(&a.date))
            .cloned()
            .collect())
    }

    async fn insert_appointment_checked(&self, mut appointment: Appointment) -> Result<Appointment, SacramentError> {
        let mut state = self.state.lock().await;

        let schedule = state
            .schedules
            .get(&appointment.schedule_id)
            .ok_or(SacramentError::ScheduleNotFound(appointment.schedule_id))?;

        if !self.availability.has_capacity(
            schedule,
            appointment.time_window_id,
            appointment.date,
            state.appointments.values(),
        ) {
            warn!(
                "Slot full: schedule {} window {} on {}",
                appointment.schedule_id, appointment.time_window_id, appointment.date
            );
            return Err(SacramentError::SlotUnavailable);
        }

        appointment.version = 1;
        state.appointments.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);
        Ok(appointment)
    }

    async fn replace_appointment(
        &self,
        mut appointment: Appointment,
        expected_version: u64,
    ) -> Result<Appointment, SacramentError> {
        let mut state = self.state.lock().await;

        let current = state
            .appointments
            .get(&appointment.id)
            .ok_or(SacramentError::AppointmentNotFound(appointment.id))?;

        if current.version != expected_version {
            warn!(
                "Stale write on appointment {}: expected version {}, found {}",
                appointment.id, expected_version, current.version
            );
            return Err(SacramentError::StaleState {
                expected: expected_version,
                actual: current.version,
            });
        }

        appointment.version = expected_version + 1;
        state.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }
}
