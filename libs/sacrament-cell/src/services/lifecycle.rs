// libs/sacrament-cell/src/services/lifecycle.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, CancellationCategory, Capability, CreateAppointmentRequest,
    PermissionSet, SacramentError, Schedule, ServiceDefinition, StatusUpdateRequest,
};
use crate::services::recurrence::RecurrenceResolver;
use crate::services::requirements::SubServiceRequirementTracker;

/// Result of applying a status change to one appointment.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied(Appointment),
    /// The appointment already was in the target status.
    Unchanged,
}

pub struct AppointmentLifecycleService {
    resolver: RecurrenceResolver,
    requirements: SubServiceRequirementTracker,
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self {
            resolver: RecurrenceResolver::new(),
            requirements: SubServiceRequirementTracker::new(),
        }
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Approved,
                AppointmentStatus::Rejected,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Approved => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Rejected => vec![],
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn required_capability(&self, target: &AppointmentStatus) -> Option<Capability> {
        match target {
            AppointmentStatus::Pending => None,
            AppointmentStatus::Approved => Some(Capability::Accept),
            AppointmentStatus::Rejected | AppointmentStatus::Cancelled => Some(Capability::Reject),
            AppointmentStatus::Completed => Some(Capability::Complete),
        }
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), SacramentError> {
        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(SacramentError::InvalidTransition {
                from: *current_status,
                to: *new_status,
            });
        }
        Ok(())
    }

    /// Build a new `Pending` appointment once the date is legal for the
    /// schedule and not before `today`. Capacity is checked by the store
    /// inside its write lock.
    pub fn open_appointment(
        &self,
        request: &CreateAppointmentRequest,
        schedule: &Schedule,
        service: &ServiceDefinition,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Appointment, SacramentError> {
        debug!(
            "Opening appointment on schedule {} window {} for {}",
            schedule.id, request.time_window_id, request.date
        );

        if schedule.service_id != request.service_id || service.id != request.service_id {
            return Err(SacramentError::ValidationError(format!(
                "Schedule {} does not belong to service {}",
                schedule.id, request.service_id
            )));
        }

        if schedule.time_window(request.time_window_id).is_none() {
            return Err(SacramentError::TimeWindowNotFound(request.time_window_id));
        }

        if !self.resolver.matches_schedule(schedule, request.date) {
            warn!("Date {} is not on schedule {} ({})", request.date, schedule.id, schedule.rule);
            return Err(SacramentError::DateNotOnSchedule { date: request.date });
        }

        if request.date < today {
            warn!("Date {} is before today ({})", request.date, today);
            return Err(SacramentError::DateInPast { date: request.date });
        }

        Ok(Appointment {
            id: Uuid::new_v4(),
            service_id: request.service_id,
            schedule_id: schedule.id,
            time_window_id: request.time_window_id,
            date: request.date,
            status: AppointmentStatus::Pending,
            applicant_form: if request.applicant_form.is_null() {
                Value::Object(Default::default())
            } else {
                request.applicant_form.clone()
            },
            checklist: self.requirements.fresh_snapshot(&service.checklist),
            cancellation_category: None,
            cancellation_note: None,
            rejection_note: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply one status change, enforcing capability, transition table and
    /// guards. The input appointment is never modified.
    pub fn apply_transition(
        &self,
        appointment: &Appointment,
        request: &StatusUpdateRequest,
        permissions: &PermissionSet,
        now: DateTime<Utc>,
    ) -> Result<Transition, SacramentError> {
        let target = request.target_status;
        debug!(
            "Applying transition {} -> {} on appointment {}",
            appointment.status, target, appointment.id
        );

        if let Some(capability) = self.required_capability(&target) {
            if !permissions.allows(capability) {
                warn!(
                    "Transition {} -> {} on {} denied: missing '{}'",
                    appointment.status, target, appointment.id, capability
                );
                return Err(SacramentError::PermissionDenied { capability });
            }
        }

        if appointment.status == target {
            return self.repeat_transition(appointment, request, now);
        }

        self.validate_status_transition(&appointment.status, &target)?;

        let mut updated = appointment.clone();
        match target {
            AppointmentStatus::Approved => {
                let checklist = self
                    .requirements
                    .assign_sub_service_schedules(&appointment.checklist, &request.sub_service_schedules)?;

                let mut unmet = self.requirements.outstanding_requirements(&checklist);
                unmet.extend(self.requirements.unscheduled_sub_services(&checklist));
                if !unmet.is_empty() {
                    warn!("Approval of {} blocked: {} unmet condition(s)", appointment.id, unmet.len());
                    return Err(SacramentError::GuardNotSatisfied { unmet });
                }
                updated.checklist = checklist;
            }
            AppointmentStatus::Completed => {
                let unmet = self.requirements.incomplete_sub_services(&appointment.checklist);
                if !unmet.is_empty() {
                    warn!("Completion of {} blocked: {} unmet condition(s)", appointment.id, unmet.len());
                    return Err(SacramentError::GuardNotSatisfied { unmet });
                }
            }
            AppointmentStatus::Cancelled => {
                let (category, note) = self.validate_cancellation(request)?;
                updated.cancellation_category = Some(category);
                updated.cancellation_note = Some(note);
            }
            AppointmentStatus::Rejected => {
                updated.rejection_note = request
                    .cancellation_note
                    .as_ref()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty());
            }
            AppointmentStatus::Pending => {}
        }

        updated.status = target;
        updated.updated_at = now;

        info!("Appointment {} moved {} -> {}", appointment.id, appointment.status, target);
        Ok(Transition::Applied(updated))
    }

    /// Same-status requests are no-ops, except an explicit overwrite of an
    /// existing cancellation note.
    fn repeat_transition(
        &self,
        appointment: &Appointment,
        request: &StatusUpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<Transition, SacramentError> {
        if appointment.status == AppointmentStatus::Cancelled && request.overwrite_cancellation_note {
            let (category, note) = self.validate_cancellation(request)?;
            let mut updated = appointment.clone();
            updated.cancellation_category = Some(category);
            updated.cancellation_note = Some(note);
            updated.updated_at = now;
            info!("Cancellation note of {} overwritten", appointment.id);
            return Ok(Transition::Applied(updated));
        }

        debug!("Appointment {} already {}, nothing to do", appointment.id, appointment.status);
        Ok(Transition::Unchanged)
    }

    fn validate_cancellation(
        &self,
        request: &StatusUpdateRequest,
    ) -> Result<(CancellationCategory, String), SacramentError> {
        let category = request.cancellation_category.ok_or_else(|| {
            SacramentError::InvalidCancellation("a cancellation category is required".to_string())
        })?;

        let note = request
            .cancellation_note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                SacramentError::InvalidCancellation("a cancellation note is required".to_string())
            })?;

        Ok((category, note.to_string()))
    }

    /// Certificates are a read-only capability of completed appointments,
    /// not a status.
    pub fn is_certificate_eligible(&self, appointment: &Appointment, service: &ServiceDefinition) -> bool {
        appointment.status == AppointmentStatus::Completed && service.certificate_enabled
    }
}
