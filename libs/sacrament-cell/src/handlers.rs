// libs/sacrament-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateAppointmentRequest, PermissionSet, SacramentError, Schedule, ServiceDefinition,
    StatusUpdateRequest,
};
use crate::router::SacramentState;

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

impl From<SacramentError> for AppError {
    fn from(e: SacramentError) -> Self {
        match e {
            SacramentError::DateNotOnSchedule { .. }
            | SacramentError::DateInPast { .. }
            | SacramentError::InvalidCancellation(_) => AppError::BadRequest(e.to_string()),
            SacramentError::ValidationError(_) => AppError::ValidationError(e.to_string()),
            SacramentError::PermissionDenied { .. } => AppError::Forbidden(e.to_string()),
            SacramentError::AppointmentNotFound(_)
            | SacramentError::ScheduleNotFound(_)
            | SacramentError::ServiceNotFound(_)
            | SacramentError::TimeWindowNotFound(_)
            | SacramentError::ChecklistItemNotFound(_) => AppError::NotFound(e.to_string()),
            SacramentError::SlotUnavailable
            | SacramentError::StaleState { .. }
            | SacramentError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            SacramentError::GuardNotSatisfied { .. } => AppError::Unprocessable(e.to_string()),
        }
    }
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Only parish administrators can edit the catalogue".to_string()));
    }
    Ok(())
}

// ==============================================================================
// REQUEST BODIES AND QUERY PARAMETERS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct BookingBody {
    pub service_id: Uuid,
    pub schedule_id: Uuid,
    /// Omitted when the schedule offers a single time window.
    pub time_window_id: Option<Uuid>,
    pub date: NaiveDate,
    #[serde(default)]
    pub applicant_form: Value,
}

#[derive(Debug, Deserialize)]
pub struct RemainingQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionBody {
    pub submitted: bool,
}

#[derive(Debug, Deserialize)]
pub struct CompletionBody {
    pub completed: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoCompleteBody {
    pub service_id: Option<Uuid>,
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    pub service_id: Option<Uuid>,
}

// ==============================================================================
// CATALOGUE HANDLERS
// ==============================================================================

pub async fn register_service(
    State(state): State<Arc<SacramentState>>,
    Extension(user): Extension<User>,
    Json(service): Json<ServiceDefinition>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = state.booking.register_service(service).await?;

    Ok(Json(json!({
        "success": true,
        "service": service
    })))
}

pub async fn register_schedule(
    State(state): State<Arc<SacramentState>>,
    Extension(user): Extension<User>,
    Json(schedule): Json<Schedule>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let schedule = state.booking.register_schedule(schedule).await?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

pub async fn get_remaining_slots(
    State(state): State<Arc<SacramentState>>,
    Path(schedule_id): Path<Uuid>,
    Query(query): Query<RemainingQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state.booking.get_remaining_slots(schedule_id, query.date).await?;
    let booked_out = slots.iter().all(|slot| slot.remaining == 0);

    Ok(Json(json!({
        "success": true,
        "schedule_id": schedule_id,
        "date": query.date,
        "booked_out": booked_out,
        "slots": slots
    })))
}

pub async fn get_available_dates(
    State(state): State<Arc<SacramentState>>,
    Path(schedule_id): Path<Uuid>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Value>, AppError> {
    let dates = state
        .booking
        .get_available_dates(schedule_id, query.year, query.month)
        .await?;

    Ok(Json(json!({
        "success": true,
        "schedule_id": schedule_id,
        "dates": dates
    })))
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

pub async fn create_appointment(
    State(state): State<Arc<SacramentState>>,
    Json(body): Json<BookingBody>,
) -> Result<Json<Value>, AppError> {
    let time_window_id = match body.time_window_id {
        Some(id) => id,
        None => state.booking.auto_select_time_window(body.schedule_id, body.date).await?,
    };

    let appointment = state
        .booking
        .create_appointment(CreateAppointmentRequest {
            service_id: body.service_id,
            schedule_id: body.schedule_id,
            time_window_id,
            date: body.date,
            applicant_form: body.applicant_form,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment request received and awaiting review"
    })))
}

pub async fn get_appointment(
    State(state): State<Arc<SacramentState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn update_appointment_status(
    State(state): State<Arc<SacramentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let permissions = PermissionSet::from_user(&user);

    let appointment = state
        .booking
        .update_appointment_status(appointment_id, request, &permissions)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

pub async fn set_requirement_submission(
    State(state): State<Arc<SacramentState>>,
    Path((appointment_id, requirement_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SubmissionBody>,
) -> Result<Json<Value>, AppError> {
    let checklist = state
        .booking
        .set_requirement_submission(appointment_id, requirement_id, body.submitted)
        .await?;

    Ok(Json(json!({
        "success": true,
        "checklist": checklist
    })))
}

pub async fn set_sub_service_completion(
    State(state): State<Arc<SacramentState>>,
    Path((appointment_id, sub_service_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<CompletionBody>,
) -> Result<Json<Value>, AppError> {
    let checklist = state
        .booking
        .set_sub_service_completion(appointment_id, sub_service_id, body.completed)
        .await?;

    Ok(Json(json!({
        "success": true,
        "checklist": checklist
    })))
}

pub async fn get_certificate_eligibility(
    State(state): State<Arc<SacramentState>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let eligibility = state.booking.certificate_eligibility(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "certificate": eligibility
    })))
}

// ==============================================================================
// BATCH HANDLERS
// ==============================================================================

pub async fn bulk_auto_complete(
    State(state): State<Arc<SacramentState>>,
    Extension(user): Extension<User>,
    Json(body): Json<AutoCompleteBody>,
) -> Result<Json<Value>, AppError> {
    let permissions = PermissionSet::from_user(&user);

    let report = state
        .booking
        .bulk_auto_complete(body.service_id, body.today, &permissions)
        .await?;

    Ok(Json(json!({
        "success": true,
        "succeeded_ids": report.succeeded_ids,
        "failed_ids": report.failed_ids(),
        "failures": report.failed
    })))
}

pub async fn scan_appointments(
    State(state): State<Arc<SacramentState>>,
    Query(query): Query<ScanQuery>,
) -> Result<Json<Value>, AppError> {
    let report = state.booking.scan_appointments(query.service_id).await?;
    let today = state.booking.clock().today();

    Ok(Json(json!({
        "success": true,
        "today": today,
        "weekday": today.weekday().to_string(),
        "expired_pending": report.expired_pending,
        "due_or_overdue": report.due_or_overdue
    })))
}
