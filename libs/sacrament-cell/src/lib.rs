// =====================================================================================
// SACRAMENT CELL - SCHEDULING & APPOINTMENT LIFECYCLE ENGINE
// =====================================================================================
//
// Decides which dates a schedule offers, how many seats a slot has left,
// and which status changes an appointment may take given its checklist.
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Appointment, AppointmentStatus, Capability, PermissionSet, RecurrenceRule, SacramentError,
    Schedule, ServiceChecklist, ServiceDefinition, TimeWindow,
};
pub use router::{sacrament_routes, SacramentState};
pub use services::SacramentBookingService;
