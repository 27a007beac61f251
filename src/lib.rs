//! Stepwriter - Motion-derived step tracking
//!
//! Stepwriter turns a stream of 3-axis accelerometer samples into a daily step
//! count and walking metrics: smoothing window → threshold step detection →
//! session and active-time accounting → metrics and goal evaluation →
//! debounced persistence of today's record.
//!
//! ## Modules
//!
//! - **Core**: [`tracker::StepTracker`], a synchronous state machine driven by
//!   explicit timestamps
//! - **Runtime**: [`runtime::TrackerHandle`], a tokio actor wiring the core to
//!   a sensor, a step store and a device probe
//! - **FFI**: C ABI over the core for host applications

pub mod activity;
pub mod config;
pub mod detector;
pub mod device;
pub mod error;
pub mod goal;
pub mod history;
pub mod metrics;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod sync;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use activity::{ActivityKind, ActivityProfile};
pub use config::{ClampPolicy, TimeUnit, TrackerConfig};
pub use error::TrackerError;
pub use metrics::{calculate, Metrics};
pub use runtime::{Collaborators, Notice, TrackerHandle, TrackerOptions};
pub use store::{MemoryStepStore, StepStore};
pub use tracker::StepTracker;
pub use types::{BodyParams, SampleVector, TrackerState, UserId};

/// Stepwriter version
pub const STEPWRITER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "stepwriter";
