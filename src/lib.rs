// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod curator;
pub mod export;
pub mod history;
pub mod markers;
pub mod metrics;
pub mod notify;
pub mod poll;
pub mod registry;
pub mod report;
pub mod scoring;
pub mod states;

// ---- Re-exports for stable public API ----
// Router construction: `regsource_monitor::api::create_router` or
// `regsource_monitor::create_router`.
pub use crate::api::{create_router, AppState};
pub use crate::curator::{curate, CurationDiff, Curator};
pub use crate::poll::{run_poll_cycle, PollContext, PollOptions, UrlProber};
pub use crate::registry::{Registry, RegistryError, RegistryStore};
pub use crate::report::{Report, ReportHandle};
