// libs/sacrament-cell/src/services/availability.rs
use chrono::NaiveDate;
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::{Appointment, Schedule, SlotKey, SlotRemaining, TimeWindow};

/// Counts seats taken on a (schedule, time window, date) slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotAvailabilityTracker;

impl SlotAvailabilityTracker {
    pub fn new() -> Self {
        Self
    }

    /// Pending and approved appointments on the slot. Other statuses
    /// never hold a seat.
    pub fn active_count<'a, I>(
        &self,
        schedule: &Schedule,
        time_window_id: Uuid,
        date: NaiveDate,
        appointments: I,
    ) -> u32
    where
        I: IntoIterator<Item = &'a Appointment>,
    {
        let slot = SlotKey {
            schedule_id: schedule.id,
            time_window_id,
            date,
        };

        appointments
            .into_iter()
            .filter(|a| a.slot_key() == slot && a.status.occupies_slot())
            .count() as u32
    }

    /// Seats left, floored at zero. An over-subscribed slot is logged as a
    /// data-integrity fault.
    pub fn remaining<'a, I>(
        &self,
        schedule: &Schedule,
        time_window_id: Uuid,
        date: NaiveDate,
        appointments: I,
    ) -> u32
    where
        I: IntoIterator<Item = &'a Appointment>,
    {
        let active = self.active_count(schedule, time_window_id, date, appointments);

        if active > schedule.capacity {
            error!(
                "Slot over-subscribed: schedule {} window {} on {} has {} active appointments for capacity {}",
                schedule.id, time_window_id, date, active, schedule.capacity
            );
        }

        schedule.capacity.saturating_sub(active)
    }

    pub fn has_capacity<'a, I>(
        &self,
        schedule: &Schedule,
        time_window_id: Uuid,
        date: NaiveDate,
        appointments: I,
    ) -> bool
    where
        I: IntoIterator<Item = &'a Appointment>,
    {
        self.remaining(schedule, time_window_id, date, appointments) > 0
    }

    pub fn remaining_per_window(
        &self,
        schedule: &Schedule,
        date: NaiveDate,
        appointments: &[Appointment],
    ) -> Vec<SlotRemaining> {
        schedule
            .time_windows
            .iter()
            .map(|window| SlotRemaining {
                time_window_id: window.id,
                start_time: window.start_time,
                end_time: window.end_time,
                remaining: self.remaining(schedule, window.id, date, appointments),
            })
            .collect()
    }

    /// The lone time window of a schedule, when it still has a seat.
    /// Returns `None` when the caller has to pick a window or the slot is
    /// booked out.
    pub fn auto_select_window<'s>(
        &self,
        schedule: &'s Schedule,
        date: NaiveDate,
        appointments: &[Appointment],
    ) -> Option<&'s TimeWindow> {
        match schedule.time_windows.as_slice() {
            [only] if self.has_capacity(schedule, only.id, date, appointments) => {
                debug!("Auto-selecting window {} for schedule {} on {}", only.id, schedule.id, date);
                Some(only)
            }
            _ => None,
        }
    }
}
