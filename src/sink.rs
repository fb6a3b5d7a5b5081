//! The presentation-facing side of the bridge. The core never touches view
//! state; it describes updates as messages and the owning thread applies
//! them to whatever `Sink` the application installed.

use crate::executor::ExecutorHandle;
use std::sync::Arc;
use std::time::Duration;

/// What the status indicator should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorMode {
    Idle,
    Recording,
    Processing,
}

/// A single presentation update. Messages from one producer reach the sink
/// in the order they were posted; nothing is promised across producers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMessage {
    /// Status bar text. `None` timeout means the message is persistent.
    Status {
        text: String,
        timeout: Option<Duration>,
    },
    Indicator {
        mode: IndicatorMode,
    },
    /// Elapsed recording time, already formatted as `MM:SS`.
    Timer {
        text: String,
    },
    /// An incremental chunk of streamed model output.
    Stream {
        chunk: String,
    },
}

impl UpdateMessage {
    pub fn apply(&self, sink: &dyn Sink) {
        match self {
            UpdateMessage::Status { text, timeout } => sink.update_status(text, *timeout),
            UpdateMessage::Indicator { mode } => sink.update_indicator(*mode),
            UpdateMessage::Timer { text } => sink.update_timer(text),
            UpdateMessage::Stream { chunk } => sink.stream_chunk(chunk),
        }
    }
}

/// Implemented by the view layer. Methods are only ever invoked from
/// callables executed by `MainThreadExecutor`; the `Send + Sync` bound
/// exists because the `Arc` travels inside posted closures, not because
/// calls happen concurrently.
pub trait Sink: Send + Sync {
    fn update_status(&self, text: &str, timeout: Option<Duration>);
    fn update_indicator(&self, mode: IndicatorMode);
    fn update_timer(&self, text: &str);
    fn stream_chunk(&self, chunk: &str);
}

/// Clonable handle that lets any thread publish presentation updates.
/// Workers capture one of these instead of ever seeing the sink directly.
#[derive(Clone)]
pub struct UiHandle {
    executor: ExecutorHandle,
    sink: Arc<dyn Sink>,
}

impl UiHandle {
    pub fn new(executor: ExecutorHandle, sink: Arc<dyn Sink>) -> Self {
        Self { executor, sink }
    }

    /// Post a message for delivery on the UI thread.
    pub fn post(&self, message: UpdateMessage) {
        let sink = self.sink.clone();
        self.executor.post(move || message.apply(sink.as_ref()));
    }

    pub fn update_status(&self, text: impl Into<String>, timeout: Option<Duration>) {
        self.post(UpdateMessage::Status {
            text: text.into(),
            timeout,
        });
    }

    pub fn update_indicator(&self, mode: IndicatorMode) {
        self.post(UpdateMessage::Indicator { mode });
    }

    pub fn update_timer(&self, text: impl Into<String>) {
        self.post(UpdateMessage::Timer { text: text.into() });
    }

    pub fn stream_chunk(&self, chunk: impl Into<String>) {
        self.post(UpdateMessage::Stream {
            chunk: chunk.into(),
        });
    }
}
