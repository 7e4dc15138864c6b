// libs/sacrament-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post, put},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::SacramentBookingService;

/// Shared state behind every sacrament route.
pub struct SacramentState {
    pub config: Arc<AppConfig>,
    pub booking: Arc<SacramentBookingService>,
}

impl SacramentState {
    pub fn new(config: Arc<AppConfig>, booking: Arc<SacramentBookingService>) -> Self {
        Self { config, booking }
    }

    /// In-memory engine wired from the loaded configuration.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let booking = Arc::new(SacramentBookingService::from_config(&config));
        Self { config, booking }
    }
}

pub fn sacrament_routes(state: Arc<SacramentState>) -> Router {
    // Every operation requires an authenticated caller
    let protected_routes = Router::new()
        // Catalogue (admin only)
        .route("/services", post(handlers::register_service))
        .route("/schedules", post(handlers::register_schedule))

        // Availability
        .route("/schedules/{schedule_id}/remaining", get(handlers::get_remaining_slots))
        .route("/schedules/{schedule_id}/dates", get(handlers::get_available_dates))

        // Appointments
        .route("/appointments", post(handlers::create_appointment))
        .route("/appointments/auto-complete", post(handlers::bulk_auto_complete))
        .route("/appointments/scan", get(handlers::scan_appointments))
        .route("/appointments/{appointment_id}", get(handlers::get_appointment))
        .route("/appointments/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route(
            "/appointments/{appointment_id}/requirements/{requirement_id}",
            put(handlers::set_requirement_submission),
        )
        .route(
            "/appointments/{appointment_id}/sub-services/{sub_service_id}",
            put(handlers::set_sub_service_completion),
        )
        .route("/appointments/{appointment_id}/certificate", get(handlers::get_certificate_eligibility))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
