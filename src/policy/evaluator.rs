use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::model::attendance_policy::AttendancePolicy;
use crate::policy::clock::{DEFAULT_OFFICE_END, DEFAULT_OFFICE_START, on_date, on_date_or};

/// Working less than this many hours in a day is always a half day.
const HALF_DAY_MIN_HOURS: f64 = 4.0;

/// Hours beyond this count as overtime.
const STANDARD_HOURS: f64 = 8.0;

/// Outcome of evaluating a day. Richer than what the legacy status column stores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    HalfDay,
    EarlyLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "status": "LATE",
    "deduction": 0.25,
    "used_grace_this_time": false
}))]
pub struct Evaluation {
    pub status: AttendanceStatus,
    /// Fraction of a day's pay withheld, 0.0 to 1.0.
    pub deduction: f64,
    /// Arrival was forgiven from the monthly extended-grace budget.
    pub used_grace_this_time: bool,
}

impl Evaluation {
    fn new(status: AttendanceStatus, deduction: f64) -> Self {
        Self {
            status,
            deduction,
            used_grace_this_time: false,
        }
    }

    /// Raise the deduction to at least `floor`; never lowers it.
    fn ratchet(&mut self, floor: f64) {
        self.deduction = self.deduction.max(floor);
    }

    /// Mark an early departure unless the day is already a half day.
    fn mark_early_leave(&mut self) {
        if self.status != AttendanceStatus::HalfDay {
            self.status = AttendanceStatus::EarlyLeave;
        }
    }
}

/// Longest offset a grace limit may sit past office start.
pub const MAX_GRACE_SPAN_MINUTES: i64 = 24 * 60;

/// `base` shifted by `minutes`, clamped to one day so unchecked policies
/// cannot overflow.
fn minutes_after(base: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    let minutes = minutes.clamp(0, MAX_GRACE_SPAN_MINUTES);
    base.checked_add_signed(Duration::minutes(minutes))
        .unwrap_or(NaiveDateTime::MAX)
}

/// All policy boundaries for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyWindows {
    pub office_start: NaiveDateTime,
    pub office_end: NaiveDateTime,
    pub grace_limit: NaiveDateTime,
    pub extended_grace_limit: NaiveDateTime,
    pub quarter_day_late: Option<(NaiveDateTime, NaiveDateTime)>,
    pub half_day_late_after: Option<NaiveDateTime>,
    pub quarter_day_early: Option<(NaiveDateTime, NaiveDateTime)>,
    pub half_day_early_before: Option<NaiveDateTime>,
}

impl PolicyWindows {
    pub fn resolve(policy: &AttendancePolicy, day: NaiveDate) -> Self {
        let office_start = on_date_or(
            day,
            policy.office_start_time.as_deref(),
            *DEFAULT_OFFICE_START,
        );
        let office_end = on_date_or(day, policy.office_end_time.as_deref(), *DEFAULT_OFFICE_END);

        let grace = policy.grace_minutes();
        let grace_limit = minutes_after(office_start, grace);
        let extended_grace_limit = minutes_after(
            office_start,
            grace
                .checked_mul(i64::from(policy.max_grace()))
                .unwrap_or(i64::MAX),
        );

        let window = |start: &Option<String>, end: &Option<String>| {
            on_date(day, start.as_deref()).zip(on_date(day, end.as_deref()))
        };

        Self {
            office_start,
            office_end,
            grace_limit,
            extended_grace_limit,
            quarter_day_late: window(&policy.quarter_day_late_start, &policy.quarter_day_late_end),
            half_day_late_after: on_date(day, policy.half_day_late_after.as_deref()),
            quarter_day_early: window(
                &policy.quarter_day_early_start,
                &policy.quarter_day_early_end,
            ),
            half_day_early_before: on_date(day, policy.half_day_early_before.as_deref()),
        }
    }

    /// Arrival after basic grace but inside the extended-grace band.
    pub fn in_extended_band(&self, in_time: NaiveDateTime) -> bool {
        in_time > self.grace_limit && in_time <= self.extended_grace_limit
    }
}

/// Classify one day of punches against a company policy.
///
/// `grace_used_this_month` is the number of earlier days this month the
/// employee arrived inside the extended-grace band. The function does no
/// I/O: identical inputs always produce the identical result.
pub fn evaluate(
    policy: Option<&AttendancePolicy>,
    in_time: Option<NaiveDateTime>,
    out_time: Option<NaiveDateTime>,
    grace_used_this_month: u32,
) -> Evaluation {
    let Some(policy) = policy else {
        return match in_time {
            Some(_) => Evaluation::new(AttendanceStatus::Present, 0.0),
            None => Evaluation::new(AttendanceStatus::Absent, 1.0),
        };
    };

    let Some(in_time) = in_time else {
        return Evaluation::new(AttendanceStatus::Absent, policy.full_day_deduction());
    };

    let windows = PolicyWindows::resolve(policy, in_time.date());
    let mut outcome = classify_arrival(policy, &windows, in_time, grace_used_this_month);

    if let Some(out_time) = out_time {
        apply_departure(policy, &windows, in_time, out_time, &mut outcome);
    }

    if outcome.status == AttendanceStatus::Absent {
        outcome.deduction = policy.full_day_deduction();
    }

    outcome
}

fn classify_arrival(
    policy: &AttendancePolicy,
    windows: &PolicyWindows,
    in_time: NaiveDateTime,
    grace_used_this_month: u32,
) -> Evaluation {
    if in_time <= windows.grace_limit {
        return Evaluation::new(AttendanceStatus::Present, 0.0);
    }

    if windows.in_extended_band(in_time) && grace_used_this_month < policy.max_grace() {
        return Evaluation {
            status: AttendanceStatus::Present,
            deduction: 0.0,
            used_grace_this_time: true,
        };
    }

    if let Some((start, end)) = windows.quarter_day_late {
        if in_time >= start && in_time <= end {
            return Evaluation::new(AttendanceStatus::Late, policy.quarter_day_deduction());
        }
    }

    if let Some(cutoff) = windows.half_day_late_after {
        if in_time > cutoff {
            return Evaluation::new(AttendanceStatus::HalfDay, policy.half_day_deduction());
        }
    }

    // late, but outside every configured window
    Evaluation::new(AttendanceStatus::Late, policy.quarter_day_deduction())
}

fn apply_departure(
    policy: &AttendancePolicy,
    windows: &PolicyWindows,
    in_time: NaiveDateTime,
    out_time: NaiveDateTime,
    outcome: &mut Evaluation,
) {
    let worked = hours_between(in_time, out_time);
    if worked > 0.0 && worked < HALF_DAY_MIN_HOURS {
        outcome.status = AttendanceStatus::HalfDay;
        outcome.ratchet(policy.half_day_deduction());
        return;
    }

    if let Some((start, end)) = windows.quarter_day_early {
        if out_time >= start && out_time <= end {
            outcome.mark_early_leave();
            outcome.ratchet(policy.quarter_day_deduction());
            return;
        }
    }

    if let Some(cutoff) = windows.half_day_early_before {
        if out_time < cutoff {
            outcome.status = AttendanceStatus::HalfDay;
            outcome.ratchet(policy.half_day_deduction());
            return;
        }
    }

    if out_time < windows.office_end {
        outcome.mark_early_leave();
        outcome.ratchet(policy.quarter_day_deduction());
    }
}

fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct WorkHours {
    pub total_hours: f64,
    pub overtime_hours: f64,
}

/// Hours on site, rounded to two decimals, with overtime past an 8h day.
pub fn work_hours(in_time: Option<NaiveDateTime>, out_time: Option<NaiveDateTime>) -> WorkHours {
    match in_time.zip(out_time) {
        Some((start, end)) => {
            let total = hours_between(start, end).max(0.0);
            WorkHours {
                total_hours: round2(total),
                overtime_hours: round2((total - STANDARD_HOURS).max(0.0)),
            }
        }
        None => WorkHours {
            total_hours: 0.0,
            overtime_hours: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use std::str::FromStr;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    /// 09:00-18:00, 15 min grace, two extended-grace days (up to 09:30).
    fn policy() -> AttendancePolicy {
        AttendancePolicy {
            id: 1,
            company_id: 1,
            office_start_time: Some("09:00".into()),
            office_end_time: Some("18:00".into()),
            grace_period_mins: Some(15),
            max_grace_exceptions: Some(2),
            quarter_day_late_start: Some("09:15".into()),
            quarter_day_late_end: Some("09:45".into()),
            half_day_late_after: Some("11:00".into()),
            quarter_day_early_start: Some("16:30".into()),
            quarter_day_early_end: Some("17:30".into()),
            half_day_early_before: Some("14:00".into()),
            deduction_full_day: Some(1.0),
            deduction_half_day: Some(0.5),
            deduction_quarter_day: Some(0.25),
        }
    }

    fn result(status: AttendanceStatus, deduction: f64, used: bool) -> Evaluation {
        Evaluation {
            status,
            deduction,
            used_grace_this_time: used,
        }
    }

    #[test]
    fn within_basic_grace_is_present() {
        let p = policy();
        let out = evaluate(Some(&p), Some(at(9, 10)), None, 0);
        assert_eq!(out, result(AttendanceStatus::Present, 0.0, false));

        // the limit itself is inclusive
        let out = evaluate(Some(&p), Some(at(9, 15)), None, 5);
        assert_eq!(out, result(AttendanceStatus::Present, 0.0, false));
    }

    #[test]
    fn oversized_grace_is_clamped_to_a_day() {
        let p = AttendancePolicy {
            grace_period_mins: Some(u32::MAX),
            max_grace_exceptions: Some(u32::MAX),
            ..policy()
        };
        let windows = PolicyWindows::resolve(&p, day());
        let next_morning = at(9, 0) + Duration::days(1);
        assert_eq!(windows.grace_limit, next_morning);
        assert_eq!(windows.extended_grace_limit, next_morning);

        let out = evaluate(Some(&p), Some(at(9, 20)), None, 0);
        assert_eq!(out, result(AttendanceStatus::Present, 0.0, false));
    }

    #[test]
    fn extended_grace_consumes_budget() {
        let p = policy();
        let out = evaluate(Some(&p), Some(at(9, 20)), None, 0);
        assert_eq!(out, result(AttendanceStatus::Present, 0.0, true));

        let out = evaluate(Some(&p), Some(at(9, 30)), None, 1);
        assert_eq!(out, result(AttendanceStatus::Present, 0.0, true));
    }

    #[test]
    fn exhausted_budget_falls_to_late_windows() {
        let p = policy();
        for used in [2, 3, 10] {
            let out = evaluate(Some(&p), Some(at(9, 20)), None, used);
            assert_eq!(out, result(AttendanceStatus::Late, 0.25, false));
        }
    }

    #[test]
    fn past_extended_band_ignores_budget() {
        let p = policy();
        let out = evaluate(Some(&p), Some(at(9, 40)), None, 0);
        assert_eq!(out, result(AttendanceStatus::Late, 0.25, false));
    }

    #[test]
    fn arrival_after_half_day_cutoff() {
        let p = policy();
        let out = evaluate(Some(&p), Some(at(11, 1)), None, 0);
        assert_eq!(out, result(AttendanceStatus::HalfDay, 0.5, false));
    }

    #[test]
    fn unclassified_lateness_is_quarter_day() {
        let p = policy();
        // between the quarter window end (09:45) and half-day cutoff (11:00)
        let out = evaluate(Some(&p), Some(at(10, 30)), None, 0);
        assert_eq!(out, result(AttendanceStatus::Late, 0.25, false));

        let bare = AttendancePolicy {
            quarter_day_late_start: None,
            quarter_day_late_end: None,
            half_day_late_after: None,
            ..policy()
        };
        let out = evaluate(Some(&bare), Some(at(13, 0)), None, 0);
        assert_eq!(out, result(AttendanceStatus::Late, 0.25, false));
    }

    #[test]
    fn short_day_is_half_day_regardless_of_arrival() {
        let p = policy();
        let out = evaluate(Some(&p), Some(at(9, 0)), Some(at(11, 0)), 0);
        assert_eq!(out, result(AttendanceStatus::HalfDay, 0.5, false));

        // a granted grace keeps its flag even when the day ends up short
        let out = evaluate(Some(&p), Some(at(9, 20)), Some(at(12, 0)), 0);
        assert_eq!(out, result(AttendanceStatus::HalfDay, 0.5, true));
    }

    #[test]
    fn early_leave_windows() {
        let p = policy();

        let out = evaluate(Some(&p), Some(at(9, 0)), Some(at(17, 0)), 0);
        assert_eq!(out, result(AttendanceStatus::EarlyLeave, 0.25, false));

        let out = evaluate(Some(&p), Some(at(9, 0)), Some(at(13, 30)), 0);
        assert_eq!(out, result(AttendanceStatus::HalfDay, 0.5, false));

        // left before office end but outside the configured windows
        let out = evaluate(Some(&p), Some(at(9, 0)), Some(at(17, 45)), 0);
        assert_eq!(out, result(AttendanceStatus::EarlyLeave, 0.25, false));

        let out = evaluate(Some(&p), Some(at(9, 0)), Some(at(18, 0)), 0);
        assert_eq!(out, result(AttendanceStatus::Present, 0.0, false));
    }

    #[test]
    fn early_leave_keeps_half_day_and_never_lowers_deduction() {
        let p = policy();
        let out = evaluate(Some(&p), Some(at(11, 30)), Some(at(17, 0)), 0);
        assert_eq!(out, result(AttendanceStatus::HalfDay, 0.5, false));

        let out = evaluate(Some(&p), Some(at(9, 20)), Some(at(17, 0)), 2);
        assert_eq!(out, result(AttendanceStatus::EarlyLeave, 0.25, false));
    }

    #[test]
    fn deductions_combine_by_max_not_sum() {
        let p = AttendancePolicy {
            deduction_quarter_day: Some(0.3),
            deduction_half_day: Some(0.6),
            ..policy()
        };
        let out = evaluate(Some(&p), Some(at(9, 40)), Some(at(17, 0)), 2);
        assert_eq!(out.status, AttendanceStatus::EarlyLeave);
        assert_eq!(out.deduction, 0.3);
    }

    #[test]
    fn out_punch_before_in_punch_skips_hours_rule() {
        let p = policy();
        let out = evaluate(Some(&p), Some(at(9, 0)), Some(at(8, 0)), 0);
        assert_eq!(out, result(AttendanceStatus::HalfDay, 0.5, false));
    }

    #[test]
    fn missing_in_time_is_absent_whatever_the_out_time() {
        let p = AttendancePolicy {
            deduction_full_day: Some(0.9),
            ..policy()
        };
        for out in [None, Some(at(18, 0)), Some(at(12, 0))] {
            let r = evaluate(Some(&p), None, out, 0);
            assert_eq!(r, result(AttendanceStatus::Absent, 0.9, false));
        }
    }

    #[test]
    fn no_policy_fallback() {
        assert_eq!(
            evaluate(None, Some(at(9, 0)), None, 0),
            result(AttendanceStatus::Present, 0.0, false)
        );
        assert_eq!(
            evaluate(None, Some(at(13, 0)), Some(at(14, 0)), 9),
            result(AttendanceStatus::Present, 0.0, false)
        );
        assert_eq!(
            evaluate(None, None, None, 0),
            result(AttendanceStatus::Absent, 1.0, false)
        );
    }

    #[test]
    fn unset_fields_use_defaults() {
        let p = AttendancePolicy {
            id: 1,
            company_id: 1,
            office_start_time: Some("garbage".into()),
            ..Default::default()
        };
        let w = PolicyWindows::resolve(&p, day());
        assert_eq!(w.office_start, at(10, 0));
        assert_eq!(w.office_end, at(18, 30));
        assert_eq!(w.grace_limit, at(10, 0));
        assert_eq!(w.extended_grace_limit, at(10, 0));
        assert_eq!(w.quarter_day_late, None);

        assert_eq!(
            evaluate(Some(&p), Some(at(10, 0)), None, 0),
            result(AttendanceStatus::Present, 0.0, false)
        );
        assert_eq!(
            evaluate(Some(&p), Some(at(10, 1)), None, 0),
            result(AttendanceStatus::Late, 0.25, false)
        );
        assert_eq!(
            evaluate(Some(&p), None, None, 0),
            result(AttendanceStatus::Absent, 1.0, false)
        );
    }

    #[test]
    fn half_open_window_is_skipped() {
        let p = AttendancePolicy {
            quarter_day_late_end: Some("not a time".into()),
            ..policy()
        };
        // quarter window unusable, half-day cutoff still applies
        let out = evaluate(Some(&p), Some(at(9, 40)), None, 2);
        assert_eq!(out, result(AttendanceStatus::Late, 0.25, false));
        let out = evaluate(Some(&p), Some(at(11, 5)), None, 2);
        assert_eq!(out, result(AttendanceStatus::HalfDay, 0.5, false));
    }

    #[test]
    fn deduction_never_decreases_as_arrival_worsens() {
        let p = policy();
        for used in [0, 2] {
            let mut last = 0.0;
            for minutes in (0..=6 * 60).step_by(5) {
                let in_time = at(8, 0) + Duration::minutes(minutes);
                let d = evaluate(Some(&p), Some(in_time), None, used).deduction;
                assert!(d >= last, "deduction dropped at {in_time} (used={used})");
                last = d;
            }
        }
    }

    #[test]
    fn deduction_never_decreases_as_departure_worsens() {
        let p = policy();
        let mut last = 0.0;
        // walk the out punch backwards from 19:00 to 13:05
        for step in 0..72i64 {
            let out_time = at(19, 0) - Duration::minutes(step * 5);
            let d = evaluate(Some(&p), Some(at(9, 0)), Some(out_time), 0).deduction;
            assert!(d >= last, "deduction dropped at {out_time}");
            last = d;
        }
    }

    #[test]
    fn evaluation_is_repeatable() {
        let p = policy();
        let first = evaluate(Some(&p), Some(at(9, 25)), Some(at(17, 10)), 1);
        for _ in 0..10 {
            assert_eq!(evaluate(Some(&p), Some(at(9, 25)), Some(at(17, 10)), 1), first);
        }
    }

    #[test]
    fn status_text_round_trips_through_strum() {
        assert_eq!(AttendanceStatus::EarlyLeave.to_string(), "EARLY_LEAVE");
        assert_eq!(
            AttendanceStatus::from_str("HALF_DAY").unwrap(),
            AttendanceStatus::HalfDay
        );
        assert!(AttendanceStatus::from_str("LEAVE").is_err());
    }

    #[test]
    fn work_hours_with_overtime() {
        let h = work_hours(Some(at(9, 0)), Some(at(19, 20)));
        assert_eq!(h.total_hours, 10.33);
        assert_eq!(h.overtime_hours, 2.33);

        let h = work_hours(Some(at(9, 0)), None);
        assert_eq!(h.total_hours, 0.0);

        let h = work_hours(Some(at(9, 0)), Some(at(8, 0)));
        assert_eq!(h, WorkHours { total_hours: 0.0, overtime_hours: 0.0 });
    }
}
