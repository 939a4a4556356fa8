//! Railsafe Alert crate - emergency alert orchestration.
//!
//! Provides the alert session state machine (Idle -> CountingDown ->
//! Dispatching -> Acknowledged -> Idle, with menu, cancel, and retry paths),
//! the cancellable countdown timer, the dispatcher capability with a simulated
//! implementation, and the append-only alert history. The orchestrator runs as
//! a single task fed by one command queue.

pub mod dispatch;
pub mod error;
pub mod history;
pub mod orchestrator;
pub mod state;
pub mod timer;

pub use dispatch::{DispatchReceipt, Dispatcher, SimulatedDispatcher};
pub use error::{AlertError, DispatchError, TimerError};
pub use history::{AlertHistory, HistoryIter};
pub use orchestrator::{AlertOrchestrator, OrchestratorConfig, COUNTDOWN_SECS, DISPLAY_TIMEOUT_SECS};
pub use state::{AlertEvent, AlertSnapshot, AlertState};
pub use timer::CountdownTimer;
