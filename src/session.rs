//! Recording/processing lifecycle. One controller owns the phase, the
//! elapsed-time timer, and the pipeline task; hotkey callbacks and task
//! events drive it from the UI thread.

use crate::dispatcher::{CancellationToken, TaskDispatcher, TaskEvent};
use crate::errors::TaskError;
use crate::sink::{IndicatorMode, UiHandle};
use crate::timer::PeriodicTimer;
use std::time::Duration;

/// Task id used for the capture/transcription pipeline. One pipeline runs
/// at a time; the phase machine guarantees the id is free on submit.
pub const PIPELINE_TASK: &str = "pipeline";

const OUTCOME_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Recording,
    Processing,
    /// Cancel requested while Processing; the terminal event is still on
    /// its way and completes the transition back to Idle.
    Cancelled,
}

/// The blocking pipeline work, produced fresh for every capture. Provided
/// by the recording/transcription collaborators, which are not this
/// crate's business.
pub type PipelineWork = Box<dyn FnOnce(&CancellationToken) -> anyhow::Result<String> + Send>;

pub struct SessionController {
    ui: UiHandle,
    dispatcher: TaskDispatcher<String>,
    timer: PeriodicTimer,
    work_factory: Box<dyn FnMut() -> PipelineWork>,
    on_result: Box<dyn FnMut(&str)>,
    phase: SessionPhase,
}

impl SessionController {
    pub fn new(
        ui: UiHandle,
        dispatcher: TaskDispatcher<String>,
        timer: PeriodicTimer,
        work_factory: impl FnMut() -> PipelineWork + 'static,
        on_result: impl FnMut(&str) + 'static,
    ) -> Self {
        Self {
            ui,
            dispatcher,
            timer,
            work_factory: Box::new(work_factory),
            on_result: Box::new(on_result),
            phase: SessionPhase::Idle,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        log::info!("session {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Idle -> Recording. Any other phase ignores the request.
    pub fn start_recording(&mut self) {
        if self.phase != SessionPhase::Idle {
            log::debug!("start ignored in {:?}", self.phase);
            return;
        }
        self.set_phase(SessionPhase::Recording);
        self.timer.start();
        self.ui.update_indicator(IndicatorMode::Recording);
        self.ui.update_status("Recording...", None);
    }

    /// Recording -> Processing: stop the timer and hand the capture to the
    /// pipeline task.
    pub fn stop_recording(&mut self) {
        if self.phase != SessionPhase::Recording {
            log::debug!("stop ignored in {:?}", self.phase);
            return;
        }
        self.timer.stop();

        let work = (self.work_factory)();
        match self.dispatcher.submit(PIPELINE_TASK, move |token| work(token)) {
            Ok(_handle) => {
                self.set_phase(SessionPhase::Processing);
                self.ui.update_indicator(IndicatorMode::Processing);
                self.ui.update_status("Processing...", None);
            }
            Err(TaskError::Busy(_)) => {
                // Unreachable through the phase machine, but a second
                // controller sharing the dispatcher could race us here.
                log::warn!("pipeline task still busy, dropping capture");
                self.set_phase(SessionPhase::Idle);
                self.ui.update_indicator(IndicatorMode::Idle);
                self.ui
                    .update_status("Still processing previous capture", Some(OUTCOME_STATUS_TIMEOUT));
            }
            Err(error) => {
                log::error!("pipeline submit failed: {}", error);
                self.set_phase(SessionPhase::Idle);
                self.ui.update_indicator(IndicatorMode::Idle);
            }
        }
    }

    /// Single-hotkey flip between start and stop.
    pub fn toggle(&mut self) {
        match self.phase {
            SessionPhase::Idle => self.start_recording(),
            SessionPhase::Recording => self.stop_recording(),
            other => log::debug!("toggle ignored in {:?}", other),
        }
    }

    /// Processing -> Cancelled. Sets the cooperative token; the worker
    /// still delivers its terminal event, which finishes the transition.
    pub fn cancel_processing(&mut self) {
        if self.phase != SessionPhase::Processing {
            log::debug!("cancel ignored in {:?}", self.phase);
            return;
        }
        self.dispatcher.cancel(PIPELINE_TASK);
        self.set_phase(SessionPhase::Cancelled);
        self.ui.update_status("Cancelling...", None);
    }

    /// Terminal pipeline events land here, on the UI thread.
    pub fn on_task_event(&mut self, event: TaskEvent<String>) {
        if event.task_id() != PIPELINE_TASK {
            log::debug!("ignoring event for task '{}'", event.task_id());
            return;
        }
        let was_cancelled = self.phase == SessionPhase::Cancelled;
        match event {
            TaskEvent::Completed { result, .. } => {
                if was_cancelled {
                    self.ui
                        .update_status("Capture cancelled", Some(OUTCOME_STATUS_TIMEOUT));
                } else {
                    (self.on_result)(&result);
                    self.ui
                        .update_status("Processing complete", Some(OUTCOME_STATUS_TIMEOUT));
                }
            }
            TaskEvent::Failed { error, .. } => {
                if was_cancelled {
                    self.ui
                        .update_status("Capture cancelled", Some(OUTCOME_STATUS_TIMEOUT));
                } else {
                    log::error!("pipeline failed: {}", error);
                    self.ui.update_status(
                        format!("Processing failed: {error}"),
                        Some(OUTCOME_STATUS_TIMEOUT),
                    );
                }
            }
        }
        self.set_phase(SessionPhase::Idle);
        self.ui.update_indicator(IndicatorMode::Idle);
    }

    /// Forwarded to the owned timer; call from the drain loop.
    pub fn poll_timer(&mut self) -> usize {
        self.timer.poll()
    }
}
