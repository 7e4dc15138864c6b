pub mod availability;
pub mod booking;
pub mod clock;
pub mod lifecycle;
pub mod recurrence;
pub mod requirements;
pub mod scanner;
pub mod store;

pub use availability::SlotAvailabilityTracker;
pub use booking::SacramentBookingService;
pub use clock::{ClockSource, FixedClock, SystemClock};
pub use lifecycle::{AppointmentLifecycleService, Transition};
pub use recurrence::RecurrenceResolver;
pub use requirements::SubServiceRequirementTracker;
pub use scanner::ExpirationAndDueScanner;
pub use store::{InMemorySacramentStore, SacramentStore};
