use async_trait::async_trait;
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::AttendanceError;
use crate::policy::evaluator::PolicyWindows;

/// Parameters of one "how often did this employee use extended grace" lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraceUsageQuery {
    pub employee_id: u64,
    pub month_start: NaiveDate,
    pub month_end_exclusive: NaiveDate,
    pub grace_limit: NaiveDateTime,
    pub extended_grace_limit: NaiveDateTime,
    /// The day being evaluated; its own record never counts.
    pub evaluated_date: NaiveDate,
}

impl GraceUsageQuery {
    pub fn for_day(employee_id: u64, windows: &PolicyWindows, day: NaiveDate) -> Self {
        let (month_start, month_end_exclusive) = month_bounds(day);
        Self {
            employee_id,
            month_start,
            month_end_exclusive,
            grace_limit: windows.grace_limit,
            extended_grace_limit: windows.extended_grace_limit,
            evaluated_date: day,
        }
    }

    /// The band as seconds past midnight of the evaluated day. The upper end
    /// runs past 86 400 when the band crosses midnight.
    pub fn band_seconds(&self) -> (i64, i64) {
        let midnight = self.evaluated_date.and_time(NaiveTime::MIN);
        (
            (self.grace_limit - midnight).num_seconds(),
            (self.extended_grace_limit - midnight).num_seconds(),
        )
    }

    /// Whether a stored punch on another day of the month counts as a grace use.
    ///
    /// The punch is placed on its own day the way the evaluator projects the
    /// policy there, so bands crossing midnight still match.
    pub fn counts(&self, attendance_date: NaiveDate, in_time: NaiveDateTime) -> bool {
        let (after, up_to) = self.band_seconds();
        let offset = i64::from(in_time.time().num_seconds_from_midnight());
        attendance_date >= self.month_start
            && attendance_date < self.month_end_exclusive
            && attendance_date != self.evaluated_date
            && offset > after
            && offset <= up_to
    }
}

/// First day of `day`'s month and first day of the following month.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day - Duration::days(i64::from(day.day0()));
    (start, start + Months::new(1))
}

/// Read side of the monthly grace budget.
#[async_trait]
pub trait GraceUsageLedger: Send + Sync {
    /// Count committed records matching `query`. Failures must surface,
    /// a guessed count would over-grant grace.
    async fn count_grace_usage(&self, query: &GraceUsageQuery) -> Result<u32, AttendanceError>;
}
