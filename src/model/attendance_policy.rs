use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_DEDUCTION_FULL_DAY: f64 = 1.0;
pub const DEFAULT_DEDUCTION_HALF_DAY: f64 = 0.5;
pub const DEFAULT_DEDUCTION_QUARTER_DAY: f64 = 0.25;

/// Per-company attendance rules. Time-of-day fields are "HH:MM" strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "company_id": 1,
        "office_start_time": "09:00",
        "office_end_time": "18:00",
        "grace_period_mins": 15,
        "max_grace_exceptions": 2,
        "quarter_day_late_start": "09:15",
        "quarter_day_late_end": "09:45",
        "half_day_late_after": "11:00",
        "quarter_day_early_start": "16:30",
        "quarter_day_early_end": "17:59",
        "half_day_early_before": "14:00",
        "deduction_full_day": 1.0,
        "deduction_half_day": 0.5,
        "deduction_quarter_day": 0.25
    })
)]
pub struct AttendancePolicy {
    pub id: u64,
    pub company_id: u64,

    #[schema(example = "09:00", nullable = true)]
    pub office_start_time: Option<String>,
    #[schema(example = "18:00", nullable = true)]
    pub office_end_time: Option<String>,

    pub grace_period_mins: Option<u32>,
    pub max_grace_exceptions: Option<u32>,

    pub quarter_day_late_start: Option<String>,
    pub quarter_day_late_end: Option<String>,
    pub half_day_late_after: Option<String>,

    pub quarter_day_early_start: Option<String>,
    pub quarter_day_early_end: Option<String>,
    pub half_day_early_before: Option<String>,

    pub deduction_full_day: Option<f64>,
    pub deduction_half_day: Option<f64>,
    pub deduction_quarter_day: Option<f64>,
}

impl AttendancePolicy {
    pub fn grace_minutes(&self) -> i64 {
        i64::from(self.grace_period_mins.unwrap_or(0))
    }

    pub fn max_grace(&self) -> u32 {
        self.max_grace_exceptions.unwrap_or(0)
    }

    pub fn full_day_deduction(&self) -> f64 {
        self.deduction_full_day.unwrap_or(DEFAULT_DEDUCTION_FULL_DAY)
    }

    pub fn half_day_deduction(&self) -> f64 {
        self.deduction_half_day.unwrap_or(DEFAULT_DEDUCTION_HALF_DAY)
    }

    pub fn quarter_day_deduction(&self) -> f64 {
        self.deduction_quarter_day
            .unwrap_or(DEFAULT_DEDUCTION_QUARTER_DAY)
    }

    /// Every time-of-day field with its name, used to validate input.
    pub fn time_fields(&self) -> [(&'static str, Option<&str>); 8] {
        [
            ("office_start_time", self.office_start_time.as_deref()),
            ("office_end_time", self.office_end_time.as_deref()),
            ("quarter_day_late_start", self.quarter_day_late_start.as_deref()),
            ("quarter_day_late_end", self.quarter_day_late_end.as_deref()),
            ("half_day_late_after", self.half_day_late_after.as_deref()),
            ("quarter_day_early_start", self.quarter_day_early_start.as_deref()),
            ("quarter_day_early_end", self.quarter_day_early_end.as_deref()),
            ("half_day_early_before", self.half_day_early_before.as_deref()),
        ]
    }

    /// Deduction fractions that are set, with their names.
    pub fn deduction_fields(&self) -> [(&'static str, Option<f64>); 3] {
        [
            ("deduction_full_day", self.deduction_full_day),
            ("deduction_half_day", self.deduction_half_day),
            ("deduction_quarter_day", self.deduction_quarter_day),
        ]
    }
}

/// Partial policy update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PolicyPatch {
    #[schema(example = "09:30")]
    pub office_start_time: Option<String>,
    pub office_end_time: Option<String>,
    #[schema(example = 10)]
    pub grace_period_mins: Option<u32>,
    pub max_grace_exceptions: Option<u32>,
    pub quarter_day_late_start: Option<String>,
    pub quarter_day_late_end: Option<String>,
    pub half_day_late_after: Option<String>,
    pub quarter_day_early_start: Option<String>,
    pub quarter_day_early_end: Option<String>,
    pub half_day_early_before: Option<String>,
    pub deduction_full_day: Option<f64>,
    pub deduction_half_day: Option<f64>,
    pub deduction_quarter_day: Option<f64>,
}

impl PolicyPatch {
    pub fn apply(self, policy: &mut AttendancePolicy) {
        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut policy.office_start_time, self.office_start_time);
        set(&mut policy.office_end_time, self.office_end_time);
        set(&mut policy.grace_period_mins, self.grace_period_mins);
        set(&mut policy.max_grace_exceptions, self.max_grace_exceptions);
        set(&mut policy.quarter_day_late_start, self.quarter_day_late_start);
        set(&mut policy.quarter_day_late_end, self.quarter_day_late_end);
        set(&mut policy.half_day_late_after, self.half_day_late_after);
        set(&mut policy.quarter_day_early_start, self.quarter_day_early_start);
        set(&mut policy.quarter_day_early_end, self.quarter_day_early_end);
        set(&mut policy.half_day_early_before, self.half_day_early_before);
        set(&mut policy.deduction_full_day, self.deduction_full_day);
        set(&mut policy.deduction_half_day, self.deduction_half_day);
        set(&mut policy.deduction_quarter_day, self.deduction_quarter_day);
    }

    /// A fresh, unsaved policy for `company_id` holding just these rules.
    pub fn into_policy(self, company_id: u64) -> AttendancePolicy {
        let mut policy = AttendancePolicy {
            company_id,
            ..Default::default()
        };
        self.apply(&mut policy);
        policy
    }
}
