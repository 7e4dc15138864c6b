use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use serde_json::json;
use uuid::Uuid;

use sacrament_cell::models::*;
use sacrament_cell::services::{
    ClockSource, FixedClock, InMemorySacramentStore, SacramentBookingService, SacramentStore,
};

struct Parish {
    booking: Arc<SacramentBookingService>,
    clock: Arc<FixedClock>,
    service: ServiceDefinition,
    schedule: Schedule,
    birth_certificate: Uuid,
    seminar: Uuid,
    seminar_form: Uuid,
}

impl Parish {
    fn window(&self) -> Uuid {
        self.schedule.time_windows[0].id
    }

    fn request(&self, date: NaiveDate) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            service_id: self.service.id,
            schedule_id: self.schedule.id,
            time_window_id: self.window(),
            date,
            applicant_form: json!({ "child_name": "Maria Santos" }),
        }
    }

    async fn book(&self, date: NaiveDate) -> Appointment {
        self.booking.create_appointment(self.request(date)).await.unwrap()
    }

    /// Submits everything approval needs, then approves.
    async fn approve(&self, appointment_id: Uuid) -> Appointment {
        self.booking
            .set_requirement_submission(appointment_id, self.birth_certificate, true)
            .await
            .unwrap();
        self.booking
            .set_requirement_submission(appointment_id, self.seminar_form, true)
            .await
            .unwrap();

        let request = StatusUpdateRequest {
            sub_service_schedules: vec![SubServiceAssignment {
                sub_service_id: self.seminar,
                date: day(2024, 6, 5),
                time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            }],
            ..StatusUpdateRequest::to_status(AppointmentStatus::Approved)
        };
        self.booking
            .update_appointment_status(appointment_id, request, &PermissionSet::all())
            .await
            .unwrap()
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn requirement(name: &str, needed: bool) -> Requirement {
    Requirement {
        id: Uuid::new_v4(),
        name: name.to_string(),
        needed,
        is_submitted: false,
    }
}

/// Bumps one appointment's version just before the next write to it lands,
/// the way a second reviewer saving first would.
#[derive(Default)]
struct InterleavingStore {
    inner: InMemorySacramentStore,
    contended: Mutex<Option<Uuid>>,
}

impl InterleavingStore {
    fn contend(&self, appointment_id: Uuid) {
        *self.contended.lock().unwrap() = Some(appointment_id);
    }
}

#[async_trait]
impl SacramentStore for InterleavingStore {
    async fn upsert_service(&self, service: ServiceDefinition) -> Result<ServiceDefinition, SacramentError> {
        self.inner.upsert_service(service).await
    }

    async fn get_service(&self, service_id: Uuid) -> Result<ServiceDefinition, SacramentError> {
        self.inner.get_service(service_id).await
    }

    async fn upsert_schedule(&self, schedule: Schedule) -> Result<Schedule, SacramentError> {
        self.inner.upsert_schedule(schedule).await
    }

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Schedule, SacramentError> {
        self.inner.get_schedule(schedule_id).await
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SacramentError> {
        self.inner.get_appointment(appointment_id).await
    }

    async fn list_appointments(&self, service_filter: Option<Uuid>) -> Result<Vec<Appointment>, SacramentError> {
        self.inner.list_appointments(service_filter).await
    }

    async fn schedule_appointments(
        &self,
        schedule_id: Uuid,
        dates: &[NaiveDate],
    ) -> Result<Vec<Appointment>, SacramentError> {
        self.inner.schedule_appointments(schedule_id, dates).await
    }

    async fn insert_appointment_checked(&self, appointment: Appointment) -> Result<Appointment, SacramentError> {
        self.inner.insert_appointment_checked(appointment).await
    }

    async fn replace_appointment(
        &self,
        appointment: Appointment,
        expected_version: u64,
    ) -> Result<Appointment, SacramentError> {
        let contended = self.contended.lock().unwrap().take();
        if contended == Some(appointment.id) {
            let current = self.inner.get_appointment(appointment.id).await?;
            let version = current.version;
            self.inner.replace_appointment(current, version).await?;
        }
        self.inner.replace_appointment(appointment, expected_version).await
    }
}

/// Baptism on Saturdays from 2024-06-01, one 09:00-10:00 window.
/// The clock starts on Monday 2024-06-03.
async fn setup_parish(capacity: u32) -> Parish {
    setup_parish_with_store(capacity, Arc::new(InMemorySacramentStore::new())).await
}

async fn setup_parish_with_store(capacity: u32, store: Arc<dyn SacramentStore>) -> Parish {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()));
    let booking = Arc::new(SacramentBookingService::new(
        store,
        clock.clone(),
        LifecyclePolicy::default(),
    ));

    let birth_certificate = requirement("Birth certificate", true);
    let photo = requirement("Family photo", false);
    let seminar_form = requirement("Seminar registration form", true);
    let seminar = SubService {
        id: Uuid::new_v4(),
        name: "Pre-baptism seminar".to_string(),
        is_completed: false,
        requirements: vec![seminar_form.clone()],
        schedule: None,
    };

    let service = booking
        .register_service(ServiceDefinition {
            id: Uuid::new_v4(),
            name: "Baptism".to_string(),
            variants: vec![],
            checklist: ServiceChecklist {
                requirements: vec![birth_certificate.clone(), photo],
                sub_services: vec![seminar.clone()],
            },
            certificate_enabled: true,
        })
        .await
        .unwrap();

    let schedule = booking
        .register_schedule(Schedule {
            id: Uuid::new_v4(),
            service_id: service.id,
            variant_id: None,
            capacity,
            start_date: day(2024, 6, 1),
            rule: RecurrenceRule::Weekly { day_of_week: Weekday::Sat },
            time_windows: vec![TimeWindow {
                id: Uuid::new_v4(),
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            }],
        })
        .await
        .unwrap();

    Parish {
        booking,
        clock,
        service,
        schedule,
        birth_certificate: birth_certificate.id,
        seminar: seminar.id,
        seminar_form: seminar_form.id,
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn test_new_appointment_is_pending_with_fresh_checklist() {
    let parish = setup_parish(2).await;

    let appointment = parish.book(day(2024, 6, 8)).await;

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.version, 1);
    assert!(appointment.checklist.requirements.iter().all(|r| !r.is_submitted));
    assert!(appointment.checklist.sub_services.iter().all(|s| !s.is_completed));
    assert_eq!(appointment.created_at, parish.clock.now());
}

#[tokio::test]
async fn test_booking_off_schedule_date_is_rejected() {
    let parish = setup_parish(2).await;

    // Sunday
    let result = parish.booking.create_appointment(parish.request(day(2024, 6, 9))).await;
    assert_matches!(result, Err(SacramentError::DateNotOnSchedule { date }) if date == day(2024, 6, 9));

    // Saturday before the schedule starts
    let result = parish.booking.create_appointment(parish.request(day(2024, 5, 25))).await;
    assert_matches!(result, Err(SacramentError::DateNotOnSchedule { .. }));
}

#[tokio::test]
async fn test_unknown_time_window_is_rejected() {
    let parish = setup_parish(2).await;
    let request = CreateAppointmentRequest {
        time_window_id: Uuid::new_v4(),
        ..parish.request(day(2024, 6, 8))
    };

    let result = parish.booking.create_appointment(request).await;
    assert_matches!(result, Err(SacramentError::TimeWindowNotFound(_)));
}

#[tokio::test]
async fn test_full_slot_rejects_and_cancellation_frees_a_seat() {
    let parish = setup_parish(2).await;
    let date = day(2024, 6, 8);

    let first = parish.book(date).await;
    parish.book(date).await;

    let result = parish.booking.create_appointment(parish.request(date)).await;
    assert_matches!(result, Err(SacramentError::SlotUnavailable));

    let slots = parish.booking.get_remaining_slots(parish.schedule.id, date).await.unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].remaining, 0);

    parish
        .booking
        .update_appointment_status(
            first.id,
            StatusUpdateRequest::cancel(CancellationCategory::NoFee, "Family moved away"),
            &PermissionSet::none().with(Capability::Reject),
        )
        .await
        .unwrap();

    let slots = parish.booking.get_remaining_slots(parish.schedule.id, date).await.unwrap();
    assert_eq!(slots[0].remaining, 1);
    parish.book(date).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_never_oversubscribe() {
    let parish = setup_parish(1).await;
    let date = day(2024, 6, 15);

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let booking = parish.booking.clone();
            let request = parish.request(date);
            tokio::spawn(async move { booking.create_appointment(request).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let booked = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(SacramentError::SlotUnavailable)))
        .count();

    assert_eq!(booked, 1);
    assert_eq!(refused, 11);

    let slots = parish.booking.get_remaining_slots(parish.schedule.id, date).await.unwrap();
    assert_eq!(slots[0].remaining, 0);
}

#[tokio::test]
async fn test_remaining_slots_for_off_schedule_date() {
    let parish = setup_parish(2).await;

    let result = parish.booking.get_remaining_slots(parish.schedule.id, day(2024, 6, 10)).await;
    assert_matches!(result, Err(SacramentError::DateNotOnSchedule { .. }));

    let result = parish.booking.get_remaining_slots(Uuid::new_v4(), day(2024, 6, 8)).await;
    assert_matches!(result, Err(SacramentError::ScheduleNotFound(_)));
}

#[tokio::test]
async fn test_available_dates_for_month() {
    let parish = setup_parish(2).await;
    parish.book(day(2024, 6, 8)).await;

    let dates = parish
        .booking
        .get_available_dates(parish.schedule.id, 2024, 6)
        .await
        .unwrap();

    // 2024-06-01 is before today (2024-06-03) and is not offered
    let days: Vec<NaiveDate> = dates.iter().map(|d| d.date).collect();
    assert_eq!(
        days,
        vec![day(2024, 6, 8), day(2024, 6, 15), day(2024, 6, 22), day(2024, 6, 29)]
    );
    assert_eq!(dates[0].remaining, 1);
    assert_eq!(dates[1].remaining, 2);
}

#[tokio::test]
async fn test_booking_a_past_date_is_rejected() {
    let parish = setup_parish(2).await;

    let result = parish.booking.create_appointment(parish.request(day(2024, 6, 1))).await;
    assert_matches!(result, Err(SacramentError::DateInPast { date }) if date == day(2024, 6, 1));

    // today itself is still bookable once the clock reaches a Saturday
    parish.clock.set(Utc.with_ymd_and_hms(2024, 6, 8, 6, 0, 0).unwrap());
    parish.book(day(2024, 6, 8)).await;
}

#[tokio::test]
async fn test_auto_select_single_window() {
    let parish = setup_parish(1).await;
    let date = day(2024, 6, 8);

    let window = parish.booking.auto_select_time_window(parish.schedule.id, date).await.unwrap();
    assert_eq!(window, parish.window());

    parish.book(date).await;
    let result = parish.booking.auto_select_time_window(parish.schedule.id, date).await;
    assert_matches!(result, Err(SacramentError::SlotUnavailable));
}

// ==============================================================================
// CATALOGUE VALIDATION
// ==============================================================================

#[tokio::test]
async fn test_schedule_validation() {
    let parish = setup_parish(2).await;

    let zero_capacity = Schedule {
        id: Uuid::new_v4(),
        capacity: 0,
        ..parish.schedule.clone()
    };
    assert_matches!(
        parish.booking.register_schedule(zero_capacity).await,
        Err(SacramentError::ValidationError(_))
    );

    let sixth_sunday = Schedule {
        id: Uuid::new_v4(),
        rule: RecurrenceRule::NthWeekdayOfMonth { day_of_week: Weekday::Sun, ordinal: 6 },
        ..parish.schedule.clone()
    };
    assert_matches!(
        parish.booking.register_schedule(sixth_sunday).await,
        Err(SacramentError::ValidationError(_))
    );

    let unknown_service = Schedule {
        id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        ..parish.schedule.clone()
    };
    assert_matches!(
        parish.booking.register_schedule(unknown_service).await,
        Err(SacramentError::ServiceNotFound(_))
    );
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[tokio::test]
async fn test_approval_blocked_until_requirements_submitted() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;

    let result = parish
        .booking
        .update_appointment_status(
            appointment.id,
            StatusUpdateRequest::to_status(AppointmentStatus::Approved),
            &PermissionSet::all(),
        )
        .await;

    // birth certificate, seminar form, seminar schedule; the optional photo is not listed
    assert_matches!(result, Err(SacramentError::GuardNotSatisfied { unmet }) if unmet.len() == 3);

    let approved = parish.approve(appointment.id).await;
    assert_eq!(approved.status, AppointmentStatus::Approved);
    assert_eq!(
        approved.checklist.sub_services[0].schedule.map(|s| s.date),
        Some(day(2024, 6, 5))
    );
}

#[tokio::test]
async fn test_missing_capability_is_denied() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;

    let result = parish
        .booking
        .update_appointment_status(
            appointment.id,
            StatusUpdateRequest::to_status(AppointmentStatus::Approved),
            &PermissionSet::none().with(Capability::Reject),
        )
        .await;

    assert_matches!(result, Err(SacramentError::PermissionDenied { capability: Capability::Accept }));
    let unchanged = parish.booking.get_appointment(appointment.id).await.unwrap();
    assert_eq!(unchanged.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn test_second_reviewer_gets_stale_state() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;
    let seen_version = appointment.version;

    let reject = StatusUpdateRequest {
        expected_version: Some(seen_version),
        cancellation_note: Some("Incomplete documents".to_string()),
        ..StatusUpdateRequest::to_status(AppointmentStatus::Rejected)
    };
    let rejected = parish
        .booking
        .update_appointment_status(appointment.id, reject, &PermissionSet::all())
        .await
        .unwrap();
    assert_eq!(rejected.status, AppointmentStatus::Rejected);
    assert_eq!(rejected.rejection_note.as_deref(), Some("Incomplete documents"));

    let cancel = StatusUpdateRequest {
        expected_version: Some(seen_version),
        ..StatusUpdateRequest::cancel(CancellationCategory::WithFee, "Requested by family")
    };
    let result = parish
        .booking
        .update_appointment_status(appointment.id, cancel, &PermissionSet::all())
        .await;

    assert_matches!(
        result,
        Err(SacramentError::StaleState { expected, actual }) if expected == seen_version && actual == seen_version + 1
    );
}

#[tokio::test]
async fn test_terminal_status_cannot_move() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;

    parish
        .booking
        .update_appointment_status(
            appointment.id,
            StatusUpdateRequest::to_status(AppointmentStatus::Rejected),
            &PermissionSet::all(),
        )
        .await
        .unwrap();

    let result = parish
        .booking
        .update_appointment_status(
            appointment.id,
            StatusUpdateRequest::to_status(AppointmentStatus::Approved),
            &PermissionSet::all(),
        )
        .await;
    assert_matches!(
        result,
        Err(SacramentError::InvalidTransition {
            from: AppointmentStatus::Rejected,
            to: AppointmentStatus::Approved
        })
    );
}

#[tokio::test]
async fn test_completion_requires_sub_services_and_enables_certificate() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;
    parish.approve(appointment.id).await;

    let complete = || StatusUpdateRequest::to_status(AppointmentStatus::Completed);

    let result = parish
        .booking
        .update_appointment_status(appointment.id, complete(), &PermissionSet::all())
        .await;
    assert_matches!(result, Err(SacramentError::GuardNotSatisfied { unmet }) if unmet.len() == 1);

    let eligibility = parish.booking.certificate_eligibility(appointment.id).await.unwrap();
    assert!(!eligibility.eligible);

    parish
        .booking
        .set_sub_service_completion(appointment.id, parish.seminar, true)
        .await
        .unwrap();

    let completed = parish
        .booking
        .update_appointment_status(appointment.id, complete(), &PermissionSet::all())
        .await
        .unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);

    let eligibility = parish.booking.certificate_eligibility(appointment.id).await.unwrap();
    assert!(eligibility.eligible);
}

#[tokio::test]
async fn test_cancellation_requires_category_and_note() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;

    let blank_note = StatusUpdateRequest::cancel(CancellationCategory::NoFee, "   ");
    let result = parish
        .booking
        .update_appointment_status(appointment.id, blank_note, &PermissionSet::all())
        .await;
    assert_matches!(result, Err(SacramentError::InvalidCancellation(_)));

    let no_category = StatusUpdateRequest {
        cancellation_note: Some("Illness".to_string()),
        ..StatusUpdateRequest::to_status(AppointmentStatus::Cancelled)
    };
    let result = parish
        .booking
        .update_appointment_status(appointment.id, no_category, &PermissionSet::all())
        .await;
    assert_matches!(result, Err(SacramentError::InvalidCancellation(_)));
}

#[tokio::test]
async fn test_recancel_keeps_note_unless_overwritten() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;

    parish
        .booking
        .update_appointment_status(
            appointment.id,
            StatusUpdateRequest::cancel(CancellationCategory::NoFee, "Family moved away"),
            &PermissionSet::all(),
        )
        .await
        .unwrap();

    let again = parish
        .booking
        .update_appointment_status(
            appointment.id,
            StatusUpdateRequest::cancel(CancellationCategory::WithFee, "Different reason"),
            &PermissionSet::all(),
        )
        .await
        .unwrap();
    assert_eq!(again.cancellation_note.as_deref(), Some("Family moved away"));
    assert_eq!(again.cancellation_category, Some(CancellationCategory::NoFee));

    let overwrite = StatusUpdateRequest {
        overwrite_cancellation_note: true,
        ..StatusUpdateRequest::cancel(CancellationCategory::WithFee, "Different reason")
    };
    let overwritten = parish
        .booking
        .update_appointment_status(appointment.id, overwrite, &PermissionSet::all())
        .await
        .unwrap();
    assert_eq!(overwritten.cancellation_note.as_deref(), Some("Different reason"));
    assert_eq!(overwritten.cancellation_category, Some(CancellationCategory::WithFee));
}

// ==============================================================================
// CHECKLIST
// ==============================================================================

#[tokio::test]
async fn test_checklist_updates() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;

    let checklist = parish
        .booking
        .set_requirement_submission(appointment.id, parish.birth_certificate, true)
        .await
        .unwrap();
    assert!(checklist.requirements.iter().any(|r| r.id == parish.birth_certificate && r.is_submitted));

    // the template on the service is untouched
    let service = parish.booking.get_service(parish.service.id).await.unwrap();
    assert!(service.checklist.requirements.iter().all(|r| !r.is_submitted));

    let result = parish
        .booking
        .set_requirement_submission(appointment.id, Uuid::new_v4(), true)
        .await;
    assert_matches!(result, Err(SacramentError::ChecklistItemNotFound(_)));

    // a sub-service id is not a requirement
    let result = parish
        .booking
        .set_requirement_submission(appointment.id, parish.seminar, true)
        .await;
    assert_matches!(result, Err(SacramentError::ChecklistItemNotFound(_)));
}

#[tokio::test]
async fn test_terminal_checklist_is_frozen() {
    let parish = setup_parish(2).await;
    let appointment = parish.book(day(2024, 6, 8)).await;

    parish
        .booking
        .update_appointment_status(
            appointment.id,
            StatusUpdateRequest::to_status(AppointmentStatus::Rejected),
            &PermissionSet::all(),
        )
        .await
        .unwrap();

    let result = parish
        .booking
        .set_requirement_submission(appointment.id, parish.birth_certificate, true)
        .await;
    assert_matches!(result, Err(SacramentError::ValidationError(_)));
}

// ==============================================================================
// SCANNING AND BULK COMPLETION
// ==============================================================================

#[tokio::test]
async fn test_bulk_auto_complete_reports_partial_success() {
    let parish = setup_parish(3).await;
    let date = day(2024, 6, 8);

    let ready = parish.book(date).await;
    let unready = parish.book(date).await;
    let future = parish.book(day(2024, 6, 15)).await;
    for id in [ready.id, unready.id, future.id] {
        parish.approve(id).await;
    }
    parish
        .booking
        .set_sub_service_completion(ready.id, parish.seminar, true)
        .await
        .unwrap();

    let result = parish
        .booking
        .bulk_auto_complete(None, Some(date), &PermissionSet::none().with(Capability::Accept))
        .await;
    assert_matches!(result, Err(SacramentError::PermissionDenied { capability: Capability::Complete }));

    parish.clock.advance(Duration::days(5));
    let report = parish
        .booking
        .bulk_auto_complete(Some(parish.service.id), None, &PermissionSet::none().with(Capability::Complete))
        .await
        .unwrap();

    assert_eq!(report.succeeded_ids, vec![ready.id]);
    assert_eq!(report.failed_ids(), vec![unready.id]);

    let untouched = parish.booking.get_appointment(future.id).await.unwrap();
    assert_eq!(untouched.status, AppointmentStatus::Approved);
    let failed = parish.booking.get_appointment(unready.id).await.unwrap();
    assert_eq!(failed.status, AppointmentStatus::Approved);
}

#[tokio::test]
async fn test_bulk_auto_complete_survives_a_stale_write() {
    let store = Arc::new(InterleavingStore::default());
    let parish = setup_parish_with_store(3, store.clone()).await;
    let date = day(2024, 6, 8);

    let first = parish.book(date).await;
    let second = parish.book(date).await;
    for id in [first.id, second.id] {
        parish.approve(id).await;
        parish
            .booking
            .set_sub_service_completion(id, parish.seminar, true)
            .await
            .unwrap();
    }

    store.contend(second.id);
    parish.clock.advance(Duration::days(5));
    let report = parish
        .booking
        .bulk_auto_complete(None, None, &PermissionSet::all())
        .await
        .unwrap();

    assert_eq!(report.succeeded_ids, vec![first.id]);
    assert_eq!(report.failed_ids(), vec![second.id]);
    assert!(report.failed[0].reason.contains("modified concurrently"));

    let completed = parish.booking.get_appointment(first.id).await.unwrap();
    assert_eq!(completed.status, AppointmentStatus::Completed);
    let stale = parish.booking.get_appointment(second.id).await.unwrap();
    assert_eq!(stale.status, AppointmentStatus::Approved);
}

#[tokio::test]
async fn test_scan_flags_expired_and_due() {
    let parish = setup_parish(3).await;

    let stale = parish.book(day(2024, 6, 15)).await;
    let due = parish.book(day(2024, 6, 8)).await;
    parish.approve(due.id).await;

    parish.clock.advance(Duration::hours(71) + Duration::minutes(59));
    let report = parish.booking.scan_appointments(None).await.unwrap();
    assert!(report.expired_pending.is_empty());
    assert!(report.due_or_overdue.is_empty());

    parish.clock.advance(Duration::minutes(1));
    let report = parish.booking.scan_appointments(None).await.unwrap();
    assert_eq!(report.expired_pending, vec![stale.id]);

    parish.clock.set(Utc.with_ymd_and_hms(2024, 6, 8, 7, 0, 0).unwrap());
    let report = parish.booking.scan_appointments(Some(parish.service.id)).await.unwrap();
    assert_eq!(report.due_or_overdue, vec![due.id]);
}
