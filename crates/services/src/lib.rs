#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod error;
pub mod generation;
pub mod sessions;

pub use study_core::Clock;

pub use app_services::{AppServices, GenerationBackend};
pub use catalog::{CatalogService, StudyCatalog};
pub use error::{AppServicesError, CatalogError, GenerationError, ReportError, SessionError};
pub use generation::{CompletionReporter, SessionGenerator, SessionRequest};

pub use sessions::{
    LifecycleState, ManualSelection, OrchestratorState, SessionOrigin, SessionSnapshot,
    StudySessionController, TickReceiver, TimerTick, TimerView, Urgency,
};
