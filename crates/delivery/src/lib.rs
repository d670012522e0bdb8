//! Completion delivery and parameter retrieval.
//!
//! Building blocks for getting results out of the gateway and job
//! parameters into ephemeral units:
//!
//! - [`CompletionDelivery`] — ordered storage-write + authenticated push
//!   of a terminal envelope to the upstream consumer.
//! - [`OutputStore`] — the storage collaborator seam, with a filesystem
//!   implementation.
//! - [`ParamClient`] — boot-time parameter fetch with bounded
//!   exponential backoff, the only retrying network call in the system.

pub mod params;
pub mod push;
pub mod storage;

pub use params::{retry_with_backoff, ParamClient, ParamFetchError, DEFAULT_FETCH_RETRIES};
pub use push::{CompletionDelivery, DeliveryError, UpstreamConfig};
pub use storage::{FsOutputStore, OutputStore, StorageError, StorageRef};
