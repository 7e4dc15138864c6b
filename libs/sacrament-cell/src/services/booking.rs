// libs/sacrament-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{
    Appointment, AppointmentStatus, BulkCompletionReport, Capability, CertificateEligibility,
    CreateAppointmentRequest, DateAvailability, FailedCompletion, LifecyclePolicy, PermissionSet,
    SacramentError, ScanReport, Schedule, ServiceChecklist, ServiceDefinition, SlotRemaining,
    StatusUpdateRequest, SubmissionKind,
};
use crate::services::availability::SlotAvailabilityTracker;
use crate::services::clock::{ClockSource, SystemClock};
use crate::services::lifecycle::{AppointmentLifecycleService, Transition};
use crate::services::recurrence::RecurrenceResolver;
use crate::services::requirements::SubServiceRequirementTracker;
use crate::services::scanner::ExpirationAndDueScanner;
use crate::services::store::{InMemorySacramentStore, SacramentStore};

/// Checklist edits retry this many times when they lose a version race.
const MAX_CHECKLIST_WRITE_ATTEMPTS: usize = 3;

pub struct SacramentBookingService {
    store: Arc<dyn SacramentStore>,
    clock: Arc<dyn ClockSource>,
    resolver: RecurrenceResolver,
    availability: SlotAvailabilityTracker,
    requirements: SubServiceRequirementTracker,
    lifecycle_service: AppointmentLifecycleService,
    scanner: ExpirationAndDueScanner,
}

impl SacramentBookingService {
    pub fn new(
        store: Arc<dyn SacramentStore>,
        clock: Arc<dyn ClockSource>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            store,
            clock,
            resolver: RecurrenceResolver::new(),
            availability: SlotAvailabilityTracker::new(),
            requirements: SubServiceRequirementTracker::new(),
            lifecycle_service: AppointmentLifecycleService::new(),
            scanner: ExpirationAndDueScanner::new(policy),
        }
    }

    /// In-memory store and system clock, configured from the environment.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(InMemorySacramentStore::new()),
            Arc::new(SystemClock::new(config.parish_utc_offset_minutes)),
            LifecyclePolicy::from_config(config),
        )
    }

    pub fn clock(&self) -> &Arc<dyn ClockSource> {
        &self.clock
    }

    // ==========================================================================
    // CATALOGUE
    // ==========================================================================

    pub async fn register_service(&self, service: ServiceDefinition) -> Result<ServiceDefinition, SacramentError> {
        if service.name.trim().is_empty() {
            return Err(SacramentError::ValidationError("Service name is required".to_string()));
        }
        self.requirements.validate_ids(&service.checklist)?;

        let stored = self.store.upsert_service(service).await?;
        info!("Registered service {} ({})", stored.id, stored.name);
        Ok(stored)
    }

    pub async fn get_service(&self, service_id: Uuid) -> Result<ServiceDefinition, SacramentError> {
        self.store.get_service(service_id).await
    }

    /// Create a schedule or replace the capacity, rule and windows of an
    /// existing one.
    pub async fn register_schedule(&self, schedule: Schedule) -> Result<Schedule, SacramentError> {
        debug!("Registering schedule {} for service {}", schedule.id, schedule.service_id);

        if schedule.capacity < 1 {
            return Err(SacramentError::ValidationError("Capacity must be at least 1".to_string()));
        }
        if schedule.time_windows.is_empty() {
            return Err(SacramentError::ValidationError(
                "A schedule needs at least one time window".to_string(),
            ));
        }
        if let Some(window) = schedule.time_windows.iter().find(|w| w.start_time >= w.end_time) {
            return Err(SacramentError::ValidationError(format!(
                "Time window {} must start before it ends",
                window.id
            )));
        }
        self.resolver.validate_rule(&schedule.rule)?;

        let service = self.store.get_service(schedule.service_id).await?;
        if let Some(variant_id) = schedule.variant_id {
            if !service.has_variant(variant_id) {
                return Err(SacramentError::ValidationError(format!(
                    "Service {} has no variant {}",
                    service.id, variant_id
                )));
            }
        }

        let stored = self.store.upsert_schedule(schedule).await?;
        info!("Schedule {} offers {} with capacity {}", stored.id, stored.rule, stored.capacity);
        Ok(stored)
    }

    pub async fn get_schedule(&self, schedule_id: Uuid) -> Result<Schedule, SacramentError> {
        self.store.get_schedule(schedule_id).await
    }

    // ==========================================================================
    // BOOKING
    // ==========================================================================

    pub async fn create_appointment(&self, request: CreateAppointmentRequest) -> Result<Appointment, SacramentError> {
        info!(
            "Booking service {} on schedule {} for {}",
            request.service_id, request.schedule_id, request.date
        );

        let schedule = self.store.get_schedule(request.schedule_id).await?;
        let service = self.store.get_service(request.service_id).await?;

        let appointment = self
            .lifecycle_service
            .open_appointment(&request, &schedule, &service, self.clock.now(), self.clock.today())?;

        let stored = self.store.insert_appointment_checked(appointment).await?;
        info!("Appointment {} created as {}", stored.id, stored.status);
        Ok(stored)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SacramentError> {
        self.store.get_appointment(appointment_id).await
    }

    pub async fn get_remaining_slots(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<SlotRemaining>, SacramentError> {
        let schedule = self.store.get_schedule(schedule_id).await?;
        if !self.resolver.matches_schedule(&schedule, date) {
            return Err(SacramentError::DateNotOnSchedule { date });
        }

        let appointments = self.store.schedule_appointments(schedule_id, &[date]).await?;
        Ok(self.availability.remaining_per_window(&schedule, date, &appointments))
    }

    /// The time window to book when the caller did not choose one. Only a
    /// schedule with a single window that still has a seat qualifies.
    pub async fn auto_select_time_window(
        &self,
        schedule_id: Uuid,
        date: NaiveDate,
    ) -> Result<Uuid, SacramentError> {
        let schedule = self.store.get_schedule(schedule_id).await?;
        if schedule.time_windows.len() > 1 {
            return Err(SacramentError::ValidationError(
                "This schedule offers several time windows, choose one".to_string(),
            ));
        }

        let appointments = self.store.schedule_appointments(schedule_id, &[date]).await?;
        self.availability
            .auto_select_window(&schedule, date, &appointments)
            .map(|window| window.id)
            .ok_or(SacramentError::SlotUnavailable)
    }

    /// Dates a picker should offer for one month, with the seats left
    /// across all windows. Days before today are left out.
    pub async fn get_available_dates(
        &self,
        schedule_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Vec<DateAvailability>, SacramentError> {
        let schedule = self.store.get_schedule(schedule_id).await?;
        let today = self.clock.today();
        let dates: Vec<NaiveDate> = self
            .resolver
            .matching_dates_in_month(&schedule, year, month)?
            .into_iter()
            .filter(|date| *date >= today)
            .collect();
        let appointments = self.store.schedule_appointments(schedule_id, &dates).await?;

        Ok(dates
            .into_iter()
            .map(|date| DateAvailability {
                date,
                remaining: self
                    .availability
                    .remaining_per_window(&schedule, date, &appointments)
                    .iter()
                    .map(|slot| slot.remaining)
                    .sum(),
            })
            .collect())
    }

    // ==========================================================================
    // LIFECYCLE
    // ==========================================================================

    pub async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        request: StatusUpdateRequest,
        permissions: &PermissionSet,
    ) -> Result<Appointment, SacramentError> {
        debug!("Updating appointment {} to {}", appointment_id, request.target_status);

        let current = self.store.get_appointment(appointment_id).await?;

        if let Some(expected) = request.expected_version {
            if expected != current.version {
                return Err(SacramentError::StaleState {
                    expected,
                    actual: current.version,
                });
            }
        }

        match self
            .lifecycle_service
            .apply_transition(&current, &request, permissions, self.clock.now())?
        {
            Transition::Applied(updated) => self.store.replace_appointment(updated, current.version).await,
            Transition::Unchanged => Ok(current),
        }
    }

    pub async fn set_requirement_submission(
        &self,
        appointment_id: Uuid,
        requirement_id: Uuid,
        submitted: bool,
    ) -> Result<ServiceChecklist, SacramentError> {
        self.update_checklist(appointment_id, requirement_id, submitted, |kind| {
            matches!(kind, SubmissionKind::Requirement | SubmissionKind::SubServiceRequirement)
        })
        .await
    }

    pub async fn set_sub_service_completion(
        &self,
        appointment_id: Uuid,
        sub_service_id: Uuid,
        completed: bool,
    ) -> Result<ServiceChecklist, SacramentError> {
        self.update_checklist(appointment_id, sub_service_id, completed, |kind| {
            kind == SubmissionKind::SubServiceCompletion
        })
        .await
    }

    async fn update_checklist<F>(
        &self,
        appointment_id: Uuid,
        item_id: Uuid,
        value: bool,
        accepts: F,
    ) -> Result<ServiceChecklist, SacramentError>
    where
        F: Fn(SubmissionKind) -> bool + Send + Sync,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let current = self.store.get_appointment(appointment_id).await?;
            if current.status.is_terminal() {
                return Err(SacramentError::ValidationError(format!(
                    "Checklist of a {} appointment can no longer change",
                    current.status
                )));
            }

            let kind = self
                .requirements
                .locate(&current.checklist, item_id)
                .filter(|kind| accepts(*kind))
                .ok_or(SacramentError::ChecklistItemNotFound(item_id))?;

            let checklist = self
                .requirements
                .set_submission(&current.checklist, item_id, kind, value)?;

            let mut updated = current.clone();
            updated.checklist = checklist;
            updated.updated_at = self.clock.now();

            match self.store.replace_appointment(updated, current.version).await {
                Ok(stored) => {
                    info!("Checklist item {} on {} set to {}", item_id, appointment_id, value);
                    return Ok(stored.checklist);
                }
                Err(SacramentError::StaleState { .. }) if attempt < MAX_CHECKLIST_WRITE_ATTEMPTS => {
                    debug!("Checklist write on {} lost a race (attempt {})", appointment_id, attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Completes every due approved appointment, each through the regular
    /// completion guard. Failures are collected, never abort the batch.
    pub async fn bulk_auto_complete(
        &self,
        service_filter: Option<Uuid>,
        today: Option<NaiveDate>,
        permissions: &PermissionSet,
    ) -> Result<BulkCompletionReport, SacramentError> {
        if !permissions.allows(Capability::Complete) {
            return Err(SacramentError::PermissionDenied {
                capability: Capability::Complete,
            });
        }

        let today = today.unwrap_or_else(|| self.clock.today());
        let appointments = self.store.list_appointments(service_filter).await?;
        let candidates = self
            .scanner
            .select_auto_completable(&appointments, today, service_filter);

        info!("Auto-completing {} appointment(s) due by {}", candidates.len(), today);

        let request = StatusUpdateRequest::to_status(AppointmentStatus::Completed);
        let mut report = BulkCompletionReport::default();

        for candidate in candidates {
            let outcome = match self
                .lifecycle_service
                .apply_transition(candidate, &request, permissions, self.clock.now())
            {
                Ok(Transition::Applied(updated)) => self
                    .store
                    .replace_appointment(updated, candidate.version)
                    .await
                    .map(|_| ()),
                Ok(Transition::Unchanged) => Ok(()),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(()) => report.succeeded_ids.push(candidate.id),
                Err(err) => {
                    warn!("Auto-complete of {} failed: {}", candidate.id, err);
                    report.failed.push(FailedCompletion {
                        appointment_id: candidate.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            "Auto-complete finished: {} succeeded, {} failed",
            report.succeeded_ids.len(),
            report.failed.len()
        );
        Ok(report)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn scan_appointments(&self, service_filter: Option<Uuid>) -> Result<ScanReport, SacramentError> {
        let appointments = self.store.list_appointments(service_filter).await?;
        Ok(self
            .scanner
            .scan(&appointments, self.clock.now(), self.clock.today()))
    }

    pub async fn certificate_eligibility(&self, appointment_id: Uuid) -> Result<CertificateEligibility, SacramentError> {
        let appointment = self.store.get_appointment(appointment_id).await?;
        let service = self.store.get_service(appointment.service_id).await?;

        Ok(CertificateEligibility {
            appointment_id,
            eligible: self.lifecycle_service.is_certificate_eligible(&appointment, &service),
        })
    }
}
