//! Adapter between the OS global-hotkey facility and the router. Owns the
//! OS registrations and the listener thread; the router never sees
//! platform types, only canonical combo strings.

use crate::hotkeys::{canonicalize, HotkeyRouter};
use anyhow::{anyhow, Context, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct GlobalHotkeys {
    manager: GlobalHotKeyManager,
    /// OS hotkey id -> canonical combo, shared with the listener thread.
    combos: Arc<Mutex<HashMap<u32, String>>>,
    registered: HashMap<String, HotKey>,
}

impl GlobalHotkeys {
    pub fn new() -> Result<Self> {
        let manager = GlobalHotKeyManager::new().context("failed to create hotkey manager")?;
        Ok(Self {
            manager,
            combos: Arc::new(Mutex::new(HashMap::new())),
            registered: HashMap::new(),
        })
    }

    /// Register a combination with the OS. Binding the same canonical combo
    /// twice is a no-op.
    pub fn bind(&mut self, combo: &str) -> Result<()> {
        let canonical = canonicalize(combo)?;
        if self.registered.contains_key(&canonical) {
            return Ok(());
        }
        let hotkey = to_hotkey(&canonical)?;
        self.manager
            .register(hotkey)
            .with_context(|| format!("failed to register hotkey '{canonical}'"))?;
        log::info!("OS hotkey registered: {}", canonical);
        self.combos.lock().insert(hotkey.id(), canonical.clone());
        self.registered.insert(canonical, hotkey);
        Ok(())
    }

    pub fn unbind(&mut self, combo: &str) -> Result<()> {
        let canonical = canonicalize(combo)?;
        if let Some(hotkey) = self.registered.remove(&canonical) {
            self.combos.lock().remove(&hotkey.id());
            self.manager
                .unregister(hotkey)
                .with_context(|| format!("failed to unregister hotkey '{canonical}'"))?;
            log::info!("OS hotkey unregistered: {}", canonical);
        }
        Ok(())
    }

    /// Forward OS press events into the router from a dedicated thread.
    /// The router posts matched callbacks onto the UI thread, so nothing
    /// user-visible runs here.
    pub fn listen(&self, router: HotkeyRouter) {
        let combos = self.combos.clone();
        let receiver = GlobalHotKeyEvent::receiver();
        std::thread::spawn(move || loop {
            if let Ok(event) = receiver.recv() {
                if event.state != HotKeyState::Pressed {
                    continue;
                }
                let combo = combos.lock().get(&event.id).cloned();
                if let Some(combo) = combo {
                    router.dispatch(&combo);
                }
            }
        });
    }
}

impl Drop for GlobalHotkeys {
    fn drop(&mut self) {
        for (combo, hotkey) in self.registered.drain() {
            if let Err(e) = self.manager.unregister(hotkey) {
                log::error!("failed to unregister hotkey '{}': {}", combo, e);
            }
        }
    }
}

/// Build the platform hotkey from an already-canonical combo string.
fn to_hotkey(canonical: &str) -> Result<HotKey> {
    let mut modifiers = Modifiers::empty();
    let mut code = None;
    for token in canonical.split('+') {
        match token {
            "ctrl" => modifiers |= Modifiers::CONTROL,
            "alt" => modifiers |= Modifiers::ALT,
            "shift" => modifiers |= Modifiers::SHIFT,
            "cmd" => modifiers |= Modifiers::META,
            key => code = Some(parse_key(key)?),
        }
    }
    let code = code.ok_or_else(|| anyhow!("no base key in '{canonical}'"))?;
    let modifiers = (!modifiers.is_empty()).then_some(modifiers);
    Ok(HotKey::new(modifiers, code))
}

fn parse_key(key: &str) -> Result<Code> {
    let code = match key {
        "a" => Code::KeyA,
        "b" => Code::KeyB,
        "c" => Code::KeyC,
        "d" => Code::KeyD,
        "e" => Code::KeyE,
        "f" => Code::KeyF,
        "g" => Code::KeyG,
        "h" => Code::KeyH,
        "i" => Code::KeyI,
        "j" => Code::KeyJ,
        "k" => Code::KeyK,
        "l" => Code::KeyL,
        "m" => Code::KeyM,
        "n" => Code::KeyN,
        "o" => Code::KeyO,
        "p" => Code::KeyP,
        "q" => Code::KeyQ,
        "r" => Code::KeyR,
        "s" => Code::KeyS,
        "t" => Code::KeyT,
        "u" => Code::KeyU,
        "v" => Code::KeyV,
        "w" => Code::KeyW,
        "x" => Code::KeyX,
        "y" => Code::KeyY,
        "z" => Code::KeyZ,
        "0" => Code::Digit0,
        "1" => Code::Digit1,
        "2" => Code::Digit2,
        "3" => Code::Digit3,
        "4" => Code::Digit4,
        "5" => Code::Digit5,
        "6" => Code::Digit6,
        "7" => Code::Digit7,
        "8" => Code::Digit8,
        "9" => Code::Digit9,
        "f1" => Code::F1,
        "f2" => Code::F2,
        "f3" => Code::F3,
        "f4" => Code::F4,
        "f5" => Code::F5,
        "f6" => Code::F6,
        "f7" => Code::F7,
        "f8" => Code::F8,
        "f9" => Code::F9,
        "f10" => Code::F10,
        "f11" => Code::F11,
        "f12" => Code::F12,
        "space" => Code::Space,
        "enter" | "return" => Code::Enter,
        "tab" => Code::Tab,
        "esc" | "escape" => Code::Escape,
        "backspace" => Code::Backspace,
        "delete" | "del" => Code::Delete,
        "insert" | "ins" => Code::Insert,
        "home" => Code::Home,
        "end" => Code::End,
        "pageup" | "pgup" => Code::PageUp,
        "pagedown" | "pgdn" => Code::PageDown,
        "up" => Code::ArrowUp,
        "down" => Code::ArrowDown,
        "left" => Code::ArrowLeft,
        "right" => Code::ArrowRight,
        other => return Err(anyhow!("unsupported key: {other}")),
    };
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hotkey ids are derived from modifiers + code, so canonicalized
    /// permutations must land on the same OS registration.
    #[test]
    fn test_modifier_permutations_share_an_os_id() {
        let a = to_hotkey(&canonicalize("ctrl+alt+1").unwrap()).unwrap();
        let b = to_hotkey(&canonicalize("alt+ctrl+1").unwrap()).unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_different_combos_get_different_ids() {
        let a = to_hotkey("ctrl+shift+r").unwrap();
        let b = to_hotkey("ctrl+shift+x").unwrap();
        let c = to_hotkey("ctrl+r").unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_bare_key_has_no_modifiers() {
        let hotkey = to_hotkey("f5").unwrap();
        assert_eq!(hotkey.id(), HotKey::new(None, Code::F5).id());
    }

    #[test]
    fn test_named_keys_parse() {
        for key in ["space", "enter", "esc", "pageup", "left", "f12", "9"] {
            assert!(parse_key(key).is_ok(), "'{key}' should parse");
        }
        assert!(parse_key("sausage").is_err());
    }
}
