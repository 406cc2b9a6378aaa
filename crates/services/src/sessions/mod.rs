mod controller;
mod orchestrator;
mod quiz;
mod selection;
mod timer;
pub mod view;

// Public API of the study session subsystem.
pub use crate::error::SessionError;
pub use controller::{LifecycleState, SessionOrigin, SessionSnapshot, StudySessionController};
pub use orchestrator::{OrchestratorState, SessionOrchestrator};
pub use quiz::QuizEvaluator;
pub use selection::{ManualSelection, resolve_random};
pub use timer::{CountdownTimer, TickReceiver, TimerTick};
pub use view::{OptionMark, TimerView, Urgency};
