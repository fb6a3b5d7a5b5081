pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod executor;
pub mod hotkeys;
pub mod platform;
pub mod session;
pub mod sink;
pub mod timer;

pub use dispatcher::{CancellationToken, TaskDispatcher, TaskEvent, TaskHandle, TaskState};
pub use errors::{HotkeyError, TaskError, TimerStateError};
pub use executor::{ExecutorHandle, MainThreadExecutor};
pub use hotkeys::{canonicalize, HotkeyRouter};
pub use session::{PipelineWork, SessionController, SessionPhase};
pub use sink::{IndicatorMode, Sink, UiHandle, UpdateMessage};
pub use timer::{Clock, PeriodicTimer, SystemClock};
