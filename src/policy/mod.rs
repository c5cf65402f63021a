pub mod cache;
pub mod clock;
pub mod evaluator;
pub mod ledger;
pub mod month_lock;
