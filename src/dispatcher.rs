//! Runs named, cancellable units of blocking work on dedicated worker
//! threads and reports the outcome back through the main-thread executor.
//! The UI thread stays responsive no matter how long the work blocks.

use crate::errors::TaskError;
use crate::executor::ExecutorHandle;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Cooperative cancellation flag shared between the caller and the worker.
/// Setting it never interrupts a blocking call; the work decides when to
/// look.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Terminal outcome of a submitted task, delivered exactly once per
/// accepted submission, always on the UI thread.
#[derive(Debug, PartialEq, Eq)]
pub enum TaskEvent<R> {
    Completed { task_id: String, result: R },
    Failed { task_id: String, error: TaskError },
}

impl<R> TaskEvent<R> {
    pub fn task_id(&self) -> &str {
        match self {
            TaskEvent::Completed { task_id, .. } | TaskEvent::Failed { task_id, .. } => task_id,
        }
    }
}

/// Returned by `submit`; lets the caller cancel without going back through
/// the dispatcher.
#[derive(Debug)]
pub struct TaskHandle {
    task_id: String,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

struct ActiveTask {
    token: CancellationToken,
    state: TaskState,
}

struct DispatcherInner<R> {
    tasks: Mutex<HashMap<String, ActiveTask>>,
    executor: ExecutorHandle,
    on_event: Box<dyn Fn(TaskEvent<R>) + Send + Sync>,
}

impl<R: Send + 'static> DispatcherInner<R> {
    fn mark_running(&self, task_id: &str) {
        let mut tasks = self.tasks.lock();
        if let Some(task) = tasks.get_mut(task_id) {
            // A cancel landing between submit and worker start must survive.
            if task.state == TaskState::Pending {
                task.state = TaskState::Running;
            }
        }
    }

    /// Post the terminal event to the UI thread. The registry entry is
    /// removed there, so every mutation of the map happens either under
    /// `submit`/`cancel` on the caller's thread or inside this posted
    /// callable.
    fn deliver(self: Arc<Self>, event: TaskEvent<R>) {
        let inner = self.clone();
        self.executor.post(move || {
            let task_id = event.task_id().to_string();
            let state = match &event {
                TaskEvent::Completed { .. } => TaskState::Completed,
                TaskEvent::Failed { .. } => TaskState::Failed,
            };
            inner.tasks.lock().remove(&task_id);
            log::debug!("task '{}' reached {:?}", task_id, state);
            (inner.on_event)(event);
        });
    }
}

pub struct TaskDispatcher<R> {
    inner: Arc<DispatcherInner<R>>,
}

impl<R> Clone for TaskDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Send + 'static> TaskDispatcher<R> {
    /// `on_event` is invoked on the UI thread for every terminal event.
    /// Typical callers forward into their own event channel.
    pub fn new(
        executor: ExecutorHandle,
        on_event: impl Fn(TaskEvent<R>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                tasks: Mutex::new(HashMap::new()),
                executor,
                on_event: Box::new(on_event),
            }),
        }
    }

    /// Start `work` on a dedicated worker thread. Fails fast with
    /// `TaskError::Busy` if the id is still Pending or Running; no worker
    /// is started in that case.
    pub fn submit<W>(&self, task_id: &str, work: W) -> Result<TaskHandle, TaskError>
    where
        W: FnOnce(&CancellationToken) -> anyhow::Result<R> + Send + 'static,
    {
        let token = CancellationToken::new();
        {
            let mut tasks = self.inner.tasks.lock();
            if let Some(active) = tasks.get(task_id) {
                if matches!(active.state, TaskState::Pending | TaskState::Running) {
                    return Err(TaskError::Busy(task_id.to_string()));
                }
            }
            tasks.insert(
                task_id.to_string(),
                ActiveTask {
                    token: token.clone(),
                    state: TaskState::Pending,
                },
            );
        }

        log::debug!("task '{}' submitted", task_id);
        let inner = self.inner.clone();
        let id = task_id.to_string();
        let worker_token = token.clone();
        thread::spawn(move || {
            inner.mark_running(&id);
            let outcome = catch_unwind(AssertUnwindSafe(|| work(&worker_token)));
            let event = match outcome {
                Ok(Ok(result)) => TaskEvent::Completed {
                    task_id: id.clone(),
                    result,
                },
                Ok(Err(error)) => TaskEvent::Failed {
                    task_id: id.clone(),
                    error: TaskError::Execution {
                        task_id: id.clone(),
                        message: format!("{error:#}"),
                    },
                },
                Err(payload) => TaskEvent::Failed {
                    task_id: id.clone(),
                    error: TaskError::Execution {
                        task_id: id.clone(),
                        message: panic_message(payload),
                    },
                },
            };
            inner.deliver(event);
        });

        Ok(TaskHandle {
            task_id: task_id.to_string(),
            token,
        })
    }

    /// Set the cooperative flag for an in-flight task. Unknown ids and
    /// tasks that already reached a terminal state are a no-op.
    pub fn cancel(&self, task_id: &str) {
        let mut tasks = self.inner.tasks.lock();
        match tasks.get_mut(task_id) {
            Some(task) if !matches!(task.state, TaskState::Completed | TaskState::Failed) => {
                task.token.cancel();
                task.state = TaskState::Cancelled;
                log::info!("task '{}' cancellation requested", task_id);
            }
            _ => {
                log::debug!("cancel for '{}' ignored, no active task", task_id);
            }
        }
    }

    /// True while the id maps to a task whose terminal event has not yet
    /// been delivered.
    pub fn is_active(&self, task_id: &str) -> bool {
        self.inner.tasks.lock().contains_key(task_id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    pub fn state(&self, task_id: &str) -> Option<TaskState> {
        self.inner.tasks.lock().get(task_id).map(|t| t.state)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MainThreadExecutor;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn dispatcher_with_log(
        executor: &MainThreadExecutor,
    ) -> (TaskDispatcher<String>, Arc<Mutex<Vec<TaskEvent<String>>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let dispatcher = TaskDispatcher::new(executor.handle(), move |event| {
            sink.lock().push(event);
        });
        (dispatcher, events)
    }

    fn drain_until<F: Fn() -> bool>(executor: &MainThreadExecutor, done: F) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !done() {
            executor.run_for(Duration::from_millis(10));
            assert!(
                std::time::Instant::now() < deadline,
                "timed out waiting for events"
            );
        }
    }

    #[test]
    fn test_completed_task_delivers_exactly_one_event() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);

        dispatcher
            .submit("transcribe", |_token| Ok("hello".to_string()))
            .unwrap();
        drain_until(&executor, || !events.lock().is_empty());

        // Nothing further arrives after the terminal event.
        executor.run_for(Duration::from_millis(50));
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            TaskEvent::Completed {
                task_id: "transcribe".to_string(),
                result: "hello".to_string(),
            }
        );
        assert!(!dispatcher.is_active("transcribe"));
    }

    #[test]
    fn test_failing_work_becomes_a_failed_event() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);

        dispatcher
            .submit("transcribe", |_token| {
                anyhow::bail!("model not loaded")
            })
            .unwrap();
        drain_until(&executor, || !events.lock().is_empty());

        match &events.lock()[0] {
            TaskEvent::Failed { task_id, error } => {
                assert_eq!(task_id, "transcribe");
                assert!(error.to_string().contains("model not loaded"));
            }
            other => panic!("expected failure, got {other:?}"),
        };
    }

    #[test]
    fn test_panicking_work_becomes_a_failed_event() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);

        dispatcher
            .submit("transcribe", |_token| -> anyhow::Result<String> {
                panic!("inference blew up")
            })
            .unwrap();
        drain_until(&executor, || !events.lock().is_empty());

        match &events.lock()[0] {
            TaskEvent::Failed { error, .. } => {
                assert!(error.to_string().contains("inference blew up"));
            }
            other => panic!("expected failure, got {other:?}"),
        };
    }

    #[test]
    fn test_duplicate_active_id_is_rejected_without_a_second_worker() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);
        let started = Arc::new(AtomicUsize::new(0));
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);

        let s1 = started.clone();
        dispatcher
            .submit("pipeline", move |_token| {
                s1.fetch_add(1, Ordering::SeqCst);
                release_rx.recv().ok();
                Ok("first".to_string())
            })
            .unwrap();

        let s2 = started.clone();
        let err = dispatcher
            .submit("pipeline", move |_token| {
                s2.fetch_add(1, Ordering::SeqCst);
                Ok("second".to_string())
            })
            .unwrap_err();
        assert_eq!(err, TaskError::Busy("pipeline".to_string()));

        release_tx.send(()).unwrap();
        drain_until(&executor, || !events.lock().is_empty());
        assert_eq!(events.lock().len(), 1);
        assert_eq!(started.load(Ordering::SeqCst), 1, "second worker never ran");
    }

    #[test]
    fn test_id_is_reusable_after_terminal_event() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);

        dispatcher
            .submit("pipeline", |_token| Ok("first".to_string()))
            .unwrap();
        drain_until(&executor, || events.lock().len() == 1);

        dispatcher
            .submit("pipeline", |_token| Ok("second".to_string()))
            .unwrap();
        drain_until(&executor, || events.lock().len() == 2);
    }

    #[test]
    fn test_distinct_ids_run_in_parallel() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);
        // Each worker waits for the other's marker; this only finishes if
        // both run concurrently.
        let (a_tx, a_rx) = crossbeam_channel::bounded::<()>(1);
        let (b_tx, b_rx) = crossbeam_channel::bounded::<()>(1);

        dispatcher
            .submit("record", move |_token| {
                a_tx.send(()).unwrap();
                b_rx.recv().unwrap();
                Ok("record done".to_string())
            })
            .unwrap();
        dispatcher
            .submit("upload", move |_token| {
                b_tx.send(()).unwrap();
                a_rx.recv().unwrap();
                Ok("upload done".to_string())
            })
            .unwrap();

        drain_until(&executor, || events.lock().len() == 2);
    }

    #[test]
    fn test_cancel_sets_the_token_for_running_work() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);
        let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(0);

        dispatcher
            .submit("pipeline", move |token| {
                started_tx.send(()).unwrap();
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(5));
                }
                anyhow::bail!("cancelled before completion")
            })
            .unwrap();

        started_rx.recv().unwrap();
        dispatcher.cancel("pipeline");
        assert_eq!(dispatcher.state("pipeline"), Some(TaskState::Cancelled));

        drain_until(&executor, || !events.lock().is_empty());
        assert!(matches!(&events.lock()[0], TaskEvent::Failed { .. }));
        assert!(!dispatcher.is_active("pipeline"));
    }

    #[test]
    fn test_cancel_after_completion_is_a_noop() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);

        dispatcher
            .submit("pipeline", |_token| Ok("done".to_string()))
            .unwrap();
        drain_until(&executor, || !events.lock().is_empty());

        dispatcher.cancel("pipeline");
        executor.run_for(Duration::from_millis(50));

        assert_eq!(events.lock().len(), 1, "no duplicate event");
        assert_eq!(dispatcher.active_count(), 0, "registry unchanged");
    }

    #[test]
    fn test_handle_cancel_reaches_the_worker_token() {
        let executor = MainThreadExecutor::new();
        let (dispatcher, events) = dispatcher_with_log(&executor);

        let handle = dispatcher
            .submit("pipeline", |token| {
                while !token.is_cancelled() {
                    thread::sleep(Duration::from_millis(5));
                }
                Ok("stopped early".to_string())
            })
            .unwrap();
        handle.cancel();

        drain_until(&executor, || !events.lock().is_empty());
        assert_eq!(
            events.lock()[0],
            TaskEvent::Completed {
                task_id: "pipeline".to_string(),
                result: "stopped early".to_string(),
            }
        );
    }
}
