// libs/sacrament-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use shared_config::{review_window_or_default, AppConfig, DEFAULT_PENDING_REVIEW_WINDOW_HOURS};
use shared_models::auth::User;

// ==============================================================================
// SERVICE CATALOGUE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceVariant {
    pub id: Uuid,
    pub name: String,
}

/// A bookable sacrament or mass service and the checklist every booking
/// against it starts from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub variants: Vec<ServiceVariant>,
    #[serde(default)]
    pub checklist: ServiceChecklist,
    #[serde(default)]
    pub certificate_enabled: bool,
}

impl ServiceDefinition {
    pub fn has_variant(&self, variant_id: Uuid) -> bool {
        self.variants.iter().any(|v| v.id == variant_id)
    }
}

// ==============================================================================
// SCHEDULE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecurrenceRule {
    OneTime { date: NaiveDate },
    Weekly { day_of_week: Weekday },
    /// `ordinal` is 1..=5; 5 is the rare fifth occurrence in a month.
    NthWeekdayOfMonth { day_of_week: Weekday, ordinal: u8 },
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::OneTime { date } => write!(f, "once on {}", date),
            RecurrenceRule::Weekly { day_of_week } => write!(f, "every {}", day_of_week),
            RecurrenceRule::NthWeekdayOfMonth { day_of_week, ordinal } => {
                write!(f, "{} #{} of every month", day_of_week, ordinal)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: Uuid,
    pub service_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub capacity: u32,
    /// Recurring occurrences before this date are never offered.
    pub start_date: NaiveDate,
    pub rule: RecurrenceRule,
    pub time_windows: Vec<TimeWindow>,
}

impl Schedule {
    pub fn time_window(&self, time_window_id: Uuid) -> Option<&TimeWindow> {
        self.time_windows.iter().find(|w| w.id == time_window_id)
    }
}

/// One bookable slot: a time window of a schedule on a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub schedule_id: Uuid,
    pub time_window_id: Uuid,
    pub date: NaiveDate,
}

// ==============================================================================
// REQUIREMENT CHECKLIST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirement {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub needed: bool,
    #[serde(default)]
    pub is_submitted: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubServiceSchedule {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubService {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Assigned when the parent appointment is approved.
    #[serde(default)]
    pub schedule: Option<SubServiceSchedule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceChecklist {
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub sub_services: Vec<SubService>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Requirement,
    SubServiceRequirement,
    SubServiceCompletion,
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    /// Statuses that hold a seat on their slot.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancellationCategory {
    NoFee,
    WithFee,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub service_id: Uuid,
    pub schedule_id: Uuid,
    pub time_window_id: Uuid,
    pub date: NaiveDate,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub applicant_form: Value,
    /// Snapshot of the service checklist taken at booking time.
    pub checklist: ServiceChecklist,
    pub cancellation_category: Option<CancellationCategory>,
    pub cancellation_note: Option<String>,
    pub rejection_note: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            schedule_id: self.schedule_id,
            time_window_id: self.time_window_id,
            date: self.date,
        }
    }
}

// ==============================================================================
// PERMISSION MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Accept,
    Reject,
    Complete,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Accept => write!(f, "accept"),
            Capability::Reject => write!(f, "reject"),
            Capability::Complete => write!(f, "complete"),
        }
    }
}

/// Capabilities the caller holds, passed explicitly into every lifecycle call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionSet {
    pub accept: bool,
    pub reject: bool,
    pub complete: bool,
}

impl PermissionSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            accept: true,
            reject: true,
            complete: true,
        }
    }

    pub fn with(mut self, capability: Capability) -> Self {
        match capability {
            Capability::Accept => self.accept = true,
            Capability::Reject => self.reject = true,
            Capability::Complete => self.complete = true,
        }
        self
    }

    pub fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::Accept => self.accept,
            Capability::Reject => self.reject,
            Capability::Complete => self.complete,
        }
    }

    /// Unknown names are ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().fold(Self::none(), |set, name| {
            match name.as_ref().trim().to_lowercase().as_str() {
                "accept" => set.with(Capability::Accept),
                "reject" => set.with(Capability::Reject),
                "complete" => set.with(Capability::Complete),
                _ => set,
            }
        })
    }

    pub fn from_user(user: &User) -> Self {
        if user.is_admin() {
            return Self::all();
        }
        Self::from_names(&user.permissions)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub service_id: Uuid,
    pub schedule_id: Uuid,
    pub time_window_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub applicant_form: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubServiceAssignment {
    pub sub_service_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub target_status: AppointmentStatus,
    pub cancellation_category: Option<CancellationCategory>,
    pub cancellation_note: Option<String>,
    #[serde(default)]
    pub sub_service_schedules: Vec<SubServiceAssignment>,
    /// Version the caller last read; a mismatch fails with `StaleState`.
    pub expected_version: Option<u64>,
    /// Re-cancelling keeps the first note unless this is set.
    #[serde(default)]
    pub overwrite_cancellation_note: bool,
}

impl StatusUpdateRequest {
    pub fn to_status(target_status: AppointmentStatus) -> Self {
        Self {
            target_status,
            cancellation_category: None,
            cancellation_note: None,
            sub_service_schedules: vec![],
            expected_version: None,
            overwrite_cancellation_note: false,
        }
    }

    pub fn cancel(category: CancellationCategory, note: &str) -> Self {
        Self {
            cancellation_category: Some(category),
            cancellation_note: Some(note.to_string()),
            ..Self::to_status(AppointmentStatus::Cancelled)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotRemaining {
    pub time_window_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateAvailability {
    pub date: NaiveDate,
    pub remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedCompletion {
    pub appointment_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BulkCompletionReport {
    pub succeeded_ids: Vec<Uuid>,
    pub failed: Vec<FailedCompletion>,
}

impl BulkCompletionReport {
    pub fn failed_ids(&self) -> Vec<Uuid> {
        self.failed.iter().map(|f| f.appointment_id).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScanReport {
    pub expired_pending: Vec<Uuid>,
    pub due_or_overdue: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CertificateEligibility {
    pub appointment_id: Uuid,
    pub eligible: bool,
}

// ==============================================================================
// POLICY
// ==============================================================================

#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    pub pending_review_window: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            pending_review_window: Duration::hours(DEFAULT_PENDING_REVIEW_WINDOW_HOURS),
        }
    }
}

impl LifecyclePolicy {
    /// Out-of-range windows fall back to the default.
    pub fn from_config(config: &AppConfig) -> Self {
        let hours = review_window_or_default(config.pending_review_window_hours);
        Duration::try_hours(hours)
            .map(|pending_review_window| Self { pending_review_window })
            .unwrap_or_default()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
pub enum SacramentError {
    #[error("Date {date} is not offered by this schedule")]
    DateNotOnSchedule { date: NaiveDate },

    #[error("Date {date} has already passed")]
    DateInPast { date: NaiveDate },

    #[error("Requested slot is no longer available")]
    SlotUnavailable,

    #[error("Guard not satisfied: {} outstanding ({})", .unmet.len(), .unmet.join("; "))]
    GuardNotSatisfied { unmet: Vec<String> },

    #[error("Permission denied: '{capability}' capability required")]
    PermissionDenied { capability: Capability },

    #[error("Appointment was modified concurrently (expected version {expected}, found {actual})")]
    StaleState { expected: u64, actual: u64 },

    #[error("Invalid cancellation: {0}")]
    InvalidCancellation(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Appointment {0} not found")]
    AppointmentNotFound(Uuid),

    #[error("Schedule {0} not found")]
    ScheduleNotFound(Uuid),

    #[error("Service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("Time window {0} is not offered by the schedule")]
    TimeWindowNotFound(Uuid),

    #[error("Checklist item {0} not found")]
    ChecklistItemNotFound(Uuid),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
