// libs/sacrament-cell/src/services/scanner.rs
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, LifecyclePolicy, ScanReport};

/// Flags time-sensitive appointments: pending ones left unreviewed too long
/// and approved ones whose date has arrived.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationAndDueScanner {
    policy: LifecyclePolicy,
}

impl ExpirationAndDueScanner {
    pub fn new(policy: LifecyclePolicy) -> Self {
        Self { policy }
    }

    pub fn is_expired_pending(&self, appointment: &Appointment, now: DateTime<Utc>) -> bool {
        appointment.status == AppointmentStatus::Pending
            && now - appointment.created_at >= self.policy.pending_review_window
    }

    /// Due today counts; future dates do not.
    pub fn is_due_or_overdue(&self, appointment: &Appointment, today: NaiveDate) -> bool {
        appointment.status == AppointmentStatus::Approved && appointment.date <= today
    }

    /// Candidates for bulk `Approved -> Completed`. Selection only; every
    /// candidate still goes through the completion guard.
    pub fn select_auto_completable<'a>(
        &self,
        appointments: &'a [Appointment],
        today: NaiveDate,
        service_filter: Option<Uuid>,
    ) -> Vec<&'a Appointment> {
        let selected: Vec<&Appointment> = appointments
            .iter()
            .filter(|a| service_filter.map_or(true, |service_id| a.service_id == service_id))
            .filter(|a| self.is_due_or_overdue(a, today))
            .collect();

        debug!(
            "{} of {} appointment(s) due on or before {}",
            selected.len(),
            appointments.len(),
            today
        );
        selected
    }

    pub fn scan(
        &self,
        appointments: &[Appointment],
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> ScanReport {
        ScanReport {
            expired_pending: appointments
                .iter()
                .filter(|a| self.is_expired_pending(a, now))
                .map(|a| a.id)
                .collect(),
            due_or_overdue: appointments
                .iter()
                .filter(|a| self.is_due_or_overdue(a, today))
                .map(|a| a.id)
                .collect(),
        }
    }
}
