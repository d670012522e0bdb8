//! Queue worker pool.
//!
//! Long-lived worker loops claim tasks from the broker with
//! `FOR UPDATE SKIP LOCKED`, execute them through the job wrapper under
//! the soft time limit, and write terminal envelopes to the result
//! store. A reaper marks tasks whose claiming worker died.

pub mod config;
pub mod pool;
pub mod reaper;

pub use config::WorkerConfig;
pub use pool::WorkerPool;
pub use reaper::StaleClaimReaper;
