//! Elapsed-recording-time ticks. The timer is owned, started, stopped, and
//! polled by the UI thread only; `&mut self` makes that rule structural
//! instead of conventional.

use crate::errors::TimerStateError;
use crate::sink::UiHandle;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock source. Injected so tests can simulate elapsed time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct TimerSession {
    started_at: Instant,
    next_tick: Instant,
}

pub struct PeriodicTimer {
    ui: UiHandle,
    clock: Arc<dyn Clock>,
    interval: Duration,
    session: Option<TimerSession>,
}

impl PeriodicTimer {
    pub fn new(ui: UiHandle, interval: Duration) -> Self {
        Self::with_clock(ui, interval, Arc::new(SystemClock))
    }

    pub fn with_clock(ui: UiHandle, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ui,
            clock,
            interval,
            session: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn try_start(&mut self) -> Result<(), TimerStateError> {
        if self.session.is_some() {
            return Err(TimerStateError::AlreadyRunning);
        }
        let now = self.clock.now();
        self.session = Some(TimerSession {
            started_at: now,
            next_tick: now + self.interval,
        });
        Ok(())
    }

    /// Begin a session. Starting while already running is a no-op.
    pub fn start(&mut self) {
        if let Err(e) = self.try_start() {
            log::debug!("timer start ignored: {}", e);
        }
    }

    pub fn try_stop(&mut self) -> Result<(), TimerStateError> {
        match self.session.take() {
            Some(_) => Ok(()),
            None => Err(TimerStateError::NotRunning),
        }
    }

    /// End the session. Stopping while not running is a no-op. No tick is
    /// emitted after this returns.
    pub fn stop(&mut self) {
        if let Err(e) = self.try_stop() {
            log::debug!("timer stop ignored: {}", e);
        }
    }

    /// Emit one `Timer` update per interval boundary crossed since the
    /// last poll. Returns how many were emitted. Call this from the same
    /// thread that drains the executor.
    pub fn poll(&mut self) -> usize {
        let Some(session) = self.session.as_mut() else {
            return 0;
        };
        let now = self.clock.now();
        let mut ticks = 0;
        while session.next_tick <= now {
            let elapsed = session.next_tick - session.started_at;
            self.ui.update_timer(format_elapsed(elapsed));
            session.next_tick += self.interval;
            ticks += 1;
        }
        ticks
    }

    /// When the next tick is due, for drain loops that want to size their
    /// wait slice.
    pub fn next_due(&self) -> Option<Instant> {
        self.session.as_ref().map(|s| s.next_tick)
    }
}

/// `MM:SS`, minutes unbounded below 100.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{:02}:{:02}", total / 60, total % 60)
}
