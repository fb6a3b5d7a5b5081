//! Canonicalized, conflict-checked hotkey bindings. Raw trigger events come
//! in from the OS listener thread; matched callbacks always leave through
//! the main-thread executor.

use crate::errors::HotkeyError;
use crate::executor::ExecutorHandle;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

/// Fixed modifier ordering used by the canonical form. Any permutation of
/// the same modifiers produces the same canonical string.
const MODIFIER_ORDER: [&str; 4] = ["ctrl", "alt", "shift", "cmd"];

fn normalize_modifier(token: &str) -> Option<&'static str> {
    match token {
        "ctrl" | "control" => Some("ctrl"),
        "alt" | "option" => Some("alt"),
        "shift" => Some("shift"),
        "cmd" | "command" | "super" | "win" | "windows" | "meta" => Some("cmd"),
        _ => None,
    }
}

/// Validate a combination string and normalize it: lowercase, modifier
/// aliases collapsed, modifiers sorted into `MODIFIER_ORDER`, base key
/// last. `ctrl+alt+1` and `alt+ctrl+1` come out identical.
pub fn canonicalize(combo: &str) -> Result<String, HotkeyError> {
    let invalid = |reason: &str| HotkeyError::Invalid {
        combo: combo.to_string(),
        reason: reason.to_string(),
    };

    if combo.trim().is_empty() {
        return Err(invalid("empty combination"));
    }

    let mut modifiers: Vec<&'static str> = Vec::new();
    let mut base: Option<String> = None;
    for token in combo.split('+') {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            return Err(invalid("empty key token"));
        }
        if let Some(modifier) = normalize_modifier(&token) {
            if !modifiers.contains(&modifier) {
                modifiers.push(modifier);
            }
        } else if base.is_some() {
            return Err(invalid("more than one non-modifier key"));
        } else {
            base = Some(token);
        }
    }

    let base = base.ok_or_else(|| invalid("no non-modifier key"))?;
    modifiers.sort_by_key(|m| MODIFIER_ORDER.iter().position(|o| o == m));

    let mut canonical = modifiers.join("+");
    if !canonical.is_empty() {
        canonical.push('+');
    }
    canonical.push_str(&base);
    Ok(canonical)
}

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Binding {
    handler_id: String,
    callback: Callback,
}

/// While enabled, normal dispatch is suppressed so a configuration dialog
/// can observe raw key presses; the one combination being captured may be
/// exempted so the dialog can display it live.
#[derive(Default)]
struct CaptureState {
    enabled: bool,
    exempt: Option<String>,
}

struct RouterInner {
    bindings: Mutex<HashMap<String, Binding>>,
    capture: Mutex<CaptureState>,
    executor: ExecutorHandle,
}

#[derive(Clone)]
pub struct HotkeyRouter {
    inner: Arc<RouterInner>,
}

impl HotkeyRouter {
    pub fn new(executor: ExecutorHandle) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                bindings: Mutex::new(HashMap::new()),
                capture: Mutex::new(CaptureState::default()),
                executor,
            }),
        }
    }

    /// Bind a callback to a combination. The existing binding wins on
    /// conflict; the caller gets told who holds it.
    pub fn register(
        &self,
        combo: &str,
        handler_id: &str,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<(), HotkeyError> {
        let canonical = canonicalize(combo)?;
        let mut bindings = self.inner.bindings.lock();
        if let Some(existing) = bindings.get(&canonical) {
            return Err(HotkeyError::Conflict {
                combo: canonical,
                handler_id: existing.handler_id.clone(),
            });
        }
        log::info!("registered hotkey '{}' for '{}'", canonical, handler_id);
        bindings.insert(
            canonical,
            Binding {
                handler_id: handler_id.to_string(),
                callback: Arc::new(callback),
            },
        );
        Ok(())
    }

    /// Remove a binding. Returns whether one was present; removing an
    /// absent (or unparseable) combination is a no-op.
    pub fn unregister(&self, combo: &str) -> bool {
        let Ok(canonical) = canonicalize(combo) else {
            return false;
        };
        let removed = self.inner.bindings.lock().remove(&canonical).is_some();
        if removed {
            log::info!("unregistered hotkey '{}'", canonical);
        }
        removed
    }

    pub fn is_bound(&self, combo: &str) -> bool {
        canonicalize(combo)
            .map(|canonical| self.inner.bindings.lock().contains_key(&canonical))
            .unwrap_or(false)
    }

    /// Drop every binding. Used on owner teardown.
    pub fn clear(&self) {
        self.inner.bindings.lock().clear();
    }

    /// Flip capture mode. Only to be called from the UI thread or from a
    /// posted callable, like every other mutation of the binding state.
    pub fn set_capture_mode(&self, enabled: bool, exempt_combo: Option<&str>) {
        let exempt = if enabled {
            exempt_combo.and_then(|combo| canonicalize(combo).ok())
        } else {
            None
        };
        if enabled {
            log::info!("capture mode on, exempt: {:?}", exempt);
        } else {
            log::info!("capture mode off, all hotkeys active");
        }
        *self.inner.capture.lock() = CaptureState { enabled, exempt };
    }

    /// Handle one raw trigger. Called on the listener thread; the matched
    /// callback is never invoked here, it is posted to the UI thread.
    /// Returns whether a callback was dispatched.
    pub fn dispatch(&self, combo: &str) -> bool {
        let Ok(canonical) = canonicalize(combo) else {
            log::debug!("ignoring malformed trigger '{}'", combo);
            return false;
        };

        {
            let capture = self.inner.capture.lock();
            if capture.enabled && capture.exempt.as_deref() != Some(canonical.as_str()) {
                log::debug!("capture mode active, suppressing '{}'", canonical);
                return false;
            }
        }

        let matched = self
            .inner
            .bindings
            .lock()
            .get(&canonical)
            .map(|binding| (binding.handler_id.clone(), binding.callback.clone()));
        match matched {
            Some((handler_id, callback)) => {
                log::debug!("hotkey '{}' -> '{}'", canonical, handler_id);
                self.inner.executor.post(move || callback());
                true
            }
            None => false,
        }
    }

    /// Bridge a raw trigger stream into `dispatch` on a dedicated thread.
    /// The thread exits when every sender is dropped.
    pub fn spawn_listener(&self, triggers: Receiver<String>) -> thread::JoinHandle<()> {
        let router = self.clone();
        thread::spawn(move || {
            for combo in triggers.iter() {
                router.dispatch(&combo);
            }
            log::info!("hotkey listener stopped");
        })
    }
}
