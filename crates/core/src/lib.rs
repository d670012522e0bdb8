//! Simgate core domain types.
//!
//! This crate holds everything the rest of the workspace agrees on:
//!
//! - [`envelope::ResultEnvelope`] — the uniform result record every
//!   backend eventually produces.
//! - [`request::JobRequest`] / [`request::Action`] — one submission of a
//!   hosted project's computation.
//! - [`registry::ProjectRegistry`] — which backend each hosted project
//!   runs on, refreshed explicitly.
//! - [`router`] — pure resolution of `(owner, application, action)` to a
//!   backend target.
//! - [`wrapper`] — the execution boundary that converts every outcome of
//!   the target callable into an envelope.
//!
//! Zero internal dependencies; every other crate depends on this one.

pub mod envelope;
pub mod error;
pub mod model;
pub mod registry;
pub mod request;
pub mod router;
pub mod types;
pub mod validation;
pub mod wrapper;

pub use envelope::{JobStatus, ResultEnvelope, PROTOCOL_VERSION};
pub use error::CoreError;
pub use registry::{BackendKind, ProjectEntry, ProjectRegistry};
pub use request::{Action, JobRequest, Kwargs};
pub use router::{route, RouteTarget};
