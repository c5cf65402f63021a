use chrono::{Datelike, NaiveDate};
use futures::lock::{Mutex, OwnedMutexGuard};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use std::time::{Duration, Instant};

/// (employee_id, year, month)
type MonthKey = (u64, i32, u32);

struct Slot {
    lock: Arc<Mutex<()>>,
    touched: Instant,
}

struct Registry {
    slots: HashMap<MonthKey, Slot>,
    last_sweep: Instant,
}

impl Registry {
    /// Drop locks nobody holds or waits on that have been idle for `idle`.
    fn sweep(&mut self, now: Instant, idle: Duration) {
        self.slots.retain(|_, slot| {
            Arc::strong_count(&slot.lock) > 1 || now.duration_since(slot.touched) < idle
        });
        self.last_sweep = now;
    }
}

/// One async lock per employee-month.
///
/// Grace usage is counted from committed rows, so two evaluations in the
/// same month must not interleave their count and their write. A lock is
/// never dropped from the registry while a guard or a waiter holds it.
#[derive(Clone)]
pub struct MonthLocks {
    registry: Arc<SyncMutex<Registry>>,
    idle: Duration,
}

impl MonthLocks {
    /// Unheld locks idle for longer than `idle` are dropped from the registry.
    pub fn new(idle: Duration) -> Self {
        Self {
            registry: Arc::new(SyncMutex::new(Registry {
                slots: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            idle,
        }
    }

    pub async fn acquire(&self, employee_id: u64, day: NaiveDate) -> OwnedMutexGuard<()> {
        let key = (employee_id, day.year(), day.month());
        let lock = {
            // only map bookkeeping happens under this lock, it cannot be left half-done
            let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            let now = Instant::now();
            if now.duration_since(registry.last_sweep) >= self.idle {
                registry.sweep(now, self.idle);
            }
            let slot = registry.slots.entry(key).or_insert_with(|| Slot {
                lock: Arc::new(Mutex::new(())),
                touched: now,
            });
            slot.touched = now;
            slot.lock.clone()
        };

        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[actix_web::test]
    async fn same_month_shares_a_lock() {
        let locks = MonthLocks::new(Duration::from_secs(60));

        let held = locks.acquire(1, date(2026, 3, 2)).await;
        assert!(locks.acquire(1, date(2026, 3, 20)).now_or_never().is_none());

        drop(held);
        assert!(locks.acquire(1, date(2026, 3, 20)).now_or_never().is_some());
    }

    #[actix_web::test]
    async fn other_months_and_employees_do_not_block() {
        let locks = MonthLocks::new(Duration::from_secs(60));

        let _march = locks.acquire(1, date(2026, 3, 2)).await;
        // would hang if these shared the March lock
        let _april = locks.acquire(1, date(2026, 4, 2)).await;
        let _other = locks.acquire(2, date(2026, 3, 2)).await;
    }

    #[actix_web::test]
    async fn held_lock_survives_the_idle_window() {
        let locks = MonthLocks::new(Duration::from_millis(10));

        let held = locks.acquire(1, date(2026, 3, 2)).await;
        actix_web::rt::time::sleep(Duration::from_millis(30)).await;

        // a sweep runs here; the held March lock must stay registered
        let _april = locks.acquire(1, date(2026, 4, 2)).await;
        assert!(locks.acquire(1, date(2026, 3, 9)).now_or_never().is_none());

        drop(held);
        assert!(locks.acquire(1, date(2026, 3, 9)).now_or_never().is_some());
    }

    #[actix_web::test]
    async fn idle_unheld_locks_are_dropped() {
        let locks = MonthLocks::new(Duration::from_millis(10));

        drop(locks.acquire(1, date(2026, 3, 2)).await);
        drop(locks.acquire(2, date(2026, 3, 2)).await);
        assert_eq!(locks.tracked(), 2);

        actix_web::rt::time::sleep(Duration::from_millis(30)).await;
        drop(locks.acquire(3, date(2026, 3, 2)).await);
        assert_eq!(locks.tracked(), 1);
    }
}
