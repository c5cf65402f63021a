use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future;
use std::collections::HashMap;
use std::task::Poll;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, NewAttendance};
use crate::model::attendance_policy::AttendancePolicy;
use crate::policy::ledger::{GraceUsageLedger, GraceUsageQuery};
use crate::store::{AttendanceFilter, AttendanceStore, EmployeeRef};

#[derive(Default)]
struct State {
    employees: HashMap<u64, EmployeeRef>,
    records: Vec<AttendanceRecord>,
    policies: Vec<AttendancePolicy>,
    next_record_id: u64,
    next_policy_id: u64,
}

/// In-process store for tests. The ledger yields once per count so
/// concurrent evaluations can interleave the way they would against a database.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_ledger: AtomicBool,
    ledger_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employee(self, id: u64, company_id: Option<u64>) -> Self {
        self.state
            .lock()
            .unwrap()
            .employees
            .insert(id, EmployeeRef { id, company_id });
        self
    }

    pub fn with_policy(self, policy: AttendancePolicy) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_policy_id = state.next_policy_id.max(policy.id);
            state.policies.push(policy);
        }
        self
    }

    pub fn fail_ledger(&self, fail: bool) {
        self.fail_ledger.store(fail, Ordering::SeqCst);
    }

    pub fn ledger_calls(&self) -> usize {
        self.ledger_calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.state.lock().unwrap().records.clone()
    }
}

/// Return Pending once so other futures on the same executor get polled.
async fn yield_once() {
    let mut yielded = false;
    future::poll_fn(|cx| {
        if yielded {
            Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    })
    .await
}

#[async_trait]
impl GraceUsageLedger for MemoryStore {
    async fn count_grace_usage(&self, query: &GraceUsageQuery) -> Result<u32, AttendanceError> {
        self.ledger_calls.fetch_add(1, Ordering::SeqCst);
        yield_once().await;

        if self.fail_ledger.load(Ordering::SeqCst) {
            return Err(AttendanceError::Ledger("ledger unavailable".into()));
        }

        let state = self.state.lock().unwrap();
        let count = state
            .records
            .iter()
            .filter(|r| r.employee_id == query.employee_id)
            .filter(|r| {
                r.in_time
                    .is_some_and(|in_time| query.counts(r.attendance_date, in_time))
            })
            .count();
        Ok(count as u32)
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_employee(&self, employee_id: u64) -> Result<Option<EmployeeRef>, AttendanceError> {
        Ok(self.state.lock().unwrap().employees.get(&employee_id).copied())
    }

    async fn policy_for_company(
        &self,
        company_id: u64,
    ) -> Result<Option<AttendancePolicy>, AttendanceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .policies
            .iter()
            .find(|p| p.company_id == company_id)
            .cloned())
    }

    async fn find_day(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .find(|r| r.employee_id == employee_id && r.attendance_date == date)
            .cloned())
    }

    async fn find_record(&self, id: u64) -> Result<Option<AttendanceRecord>, AttendanceError> {
        let state = self.state.lock().unwrap();
        Ok(state.records.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_day(&self, day: NewAttendance) -> Result<AttendanceRecord, AttendanceError> {
        let mut state = self.state.lock().unwrap();
        if state
            .records
            .iter()
            .any(|r| r.employee_id == day.employee_id && r.attendance_date == day.attendance_date)
        {
            return Err(AttendanceError::AlreadyCheckedIn);
        }
        state.next_record_id += 1;
        let record = day.into_record(state.next_record_id);
        state.records.push(record.clone());
        Ok(record)
    }

    async fn upsert_day(&self, day: NewAttendance) -> Result<AttendanceRecord, AttendanceError> {
        let mut state = self.state.lock().unwrap();
        let existing = state
            .records
            .iter()
            .position(|r| r.employee_id == day.employee_id && r.attendance_date == day.attendance_date);

        match existing {
            Some(index) => {
                let previous = &state.records[index];
                let remarks = day.remarks.clone().or_else(|| previous.remarks.clone());
                let record = AttendanceRecord {
                    remarks,
                    ..day.into_record(previous.id)
                };
                state.records[index] = record.clone();
                Ok(record)
            }
            None => {
                state.next_record_id += 1;
                let record = day.into_record(state.next_record_id);
                state.records.push(record.clone());
                Ok(record)
            }
        }
    }

    async fn update_record(&self, record: &AttendanceRecord) -> Result<(), AttendanceError> {
        let mut state = self.state.lock().unwrap();
        if let Some(slot) = state.records.iter_mut().find(|r| r.id == record.id) {
            *slot = record.clone();
        }
        Ok(())
    }

    async fn delete_record(&self, id: u64) -> Result<bool, AttendanceError> {
        let mut state = self.state.lock().unwrap();
        let before = state.records.len();
        state.records.retain(|r| r.id != id);
        Ok(state.records.len() < before)
    }

    async fn list_records(
        &self,
        filter: &AttendanceFilter,
    ) -> Result<(Vec<AttendanceRecord>, i64), AttendanceError> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<_> = state
            .records
            .iter()
            .filter(|r| filter.employee_id.is_none_or(|id| r.employee_id == id))
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| filter.start_date.is_none_or(|d| r.attendance_date >= d))
            .filter(|r| filter.end_date.is_none_or(|d| r.attendance_date <= d))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.attendance_date
                .cmp(&a.attendance_date)
                .then(b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.per_page() as usize)
            .collect();
        Ok((page, total))
    }

    async fn records_between(
        &self,
        employee_id: u64,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<_> = state
            .records
            .iter()
            .filter(|r| {
                r.employee_id == employee_id
                    && r.attendance_date >= start
                    && r.attendance_date < end_exclusive
            })
            .cloned()
            .collect();
        records.sort_by_key(|r| r.attendance_date);
        Ok(records)
    }

    async fn create_policy(
        &self,
        policy: &AttendancePolicy,
    ) -> Result<AttendancePolicy, AttendanceError> {
        let mut state = self.state.lock().unwrap();
        if state.policies.iter().any(|p| p.company_id == policy.company_id) {
            return Err(AttendanceError::PolicyExists);
        }
        state.next_policy_id += 1;
        let created = AttendancePolicy {
            id: state.next_policy_id,
            ..policy.clone()
        };
        state.policies.push(created.clone());
        Ok(created)
    }

    async fn list_policies(&self) -> Result<Vec<AttendancePolicy>, AttendanceError> {
        Ok(self.state.lock().unwrap().policies.clone())
    }

    async fn get_policy(&self, id: u64) -> Result<Option<AttendancePolicy>, AttendanceError> {
        let state = self.state.lock().unwrap();
        Ok(state.policies.iter().find(|p| p.id == id).cloned())
    }

    async fn update_policy(&self, policy: &AttendancePolicy) -> Result<bool, AttendanceError> {
        let mut state = self.state.lock().unwrap();
        match state.policies.iter_mut().find(|p| p.id == policy.id) {
            Some(slot) => {
                *slot = policy.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_policy(&self, id: u64) -> Result<bool, AttendanceError> {
        let mut state = self.state.lock().unwrap();
        let before = state.policies.len();
        state.policies.retain(|p| p.id != id);
        Ok(state.policies.len() < before)
    }
}
