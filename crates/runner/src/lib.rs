//! Ephemeral unit entrypoint logic.
//!
//! A runner process boots knowing only its job identity and endpoint
//! configuration. It fetches its kwargs from the callback URL (with
//! bounded backoff), executes the target callable through the job
//! wrapper, self-reports the envelope via Completion Delivery, and
//! exits. A fetch that exhausts its retries becomes the job's terminal
//! `FAIL` envelope, still delivered.

pub mod boot;

pub use boot::{run, BootConfig};
