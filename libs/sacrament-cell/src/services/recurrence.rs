// libs/sacrament-cell/src/services/recurrence.rs
use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::models::{RecurrenceRule, SacramentError, Schedule};

pub const MAX_WEEKDAY_ORDINAL: u8 = 5;

/// Decides which calendar days a schedule offers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecurrenceResolver;

impl RecurrenceResolver {
    pub fn new() -> Self {
        Self
    }

    /// Whether `candidate` is an occurrence of `rule`.
    ///
    /// Dates are plain calendar days, so there is no time-of-day to normalize.
    /// `OneTime` ignores `schedule_start`; the recurring rules never match
    /// before it.
    pub fn matches(
        &self,
        rule: &RecurrenceRule,
        schedule_start: NaiveDate,
        candidate: NaiveDate,
    ) -> bool {
        match *rule {
            RecurrenceRule::OneTime { date } => candidate == date,
            RecurrenceRule::Weekly { day_of_week } => {
                candidate.weekday() == day_of_week && candidate >= schedule_start
            }
            RecurrenceRule::NthWeekdayOfMonth { day_of_week, ordinal } => {
                candidate.weekday() == day_of_week
                    && candidate >= schedule_start
                    && week_ordinal(candidate) == ordinal
            }
        }
    }

    pub fn matches_schedule(&self, schedule: &Schedule, candidate: NaiveDate) -> bool {
        self.matches(&schedule.rule, schedule.start_date, candidate)
    }

    /// Every offered date in the given month, in calendar order.
    pub fn matching_dates_in_month(
        &self,
        schedule: &Schedule,
        year: i32,
        month: u32,
    ) -> Result<Vec<NaiveDate>, SacramentError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            SacramentError::ValidationError(format!("{}-{:02} is not a valid month", year, month))
        })?;

        let dates: Vec<NaiveDate> = first
            .iter_days()
            .take_while(|d| d.month() == month)
            .filter(|d| self.matches_schedule(schedule, *d))
            .collect();

        debug!(
            "Schedule {} offers {} date(s) in {}-{:02}",
            schedule.id,
            dates.len(),
            year,
            month
        );
        Ok(dates)
    }

    pub fn validate_rule(&self, rule: &RecurrenceRule) -> Result<(), SacramentError> {
        if let RecurrenceRule::NthWeekdayOfMonth { ordinal, .. } = rule {
            if *ordinal == 0 || *ordinal > MAX_WEEKDAY_ORDINAL {
                return Err(SacramentError::ValidationError(format!(
                    "Weekday ordinal must be between 1 and {}, got {}",
                    MAX_WEEKDAY_ORDINAL, ordinal
                )));
            }
        }
        Ok(())
    }
}

/// 1 for days 1-7, 2 for days 8-14, and so on up to 5.
pub fn week_ordinal(date: NaiveDate) -> u8 {
    ((date.day() - 1) / 7 + 1) as u8
}
