//! Headless console shell around the coordination core. Stands in for the
//! desktop frontend: stdin lines play the role of menu/dialog actions, and
//! a simulated pipeline plays the role of the recording/transcription
//! collaborators.

use anyhow::Result;
use crossbeam_channel::unbounded;
use std::io::BufRead;
use std::thread;
use std::time::Duration;

use voxbridge::config::Config;
use voxbridge::platform::GlobalHotkeys;
use voxbridge::{
    HotkeyRouter, IndicatorMode, MainThreadExecutor, PeriodicTimer, PipelineWork,
    SessionController, Sink, TaskDispatcher, UiHandle,
};

/// Frontend actions, delivered to the drain loop from hotkey callbacks and
/// the stdin reader thread.
#[derive(Debug)]
enum Command {
    Start,
    Stop,
    Toggle,
    Cancel,
    Capture(bool),
    Trigger(String),
    Status,
    Quit,
}

/// Presentation layer of the shell: updates become log lines.
struct ConsoleSink;

impl Sink for ConsoleSink {
    fn update_status(&self, text: &str, timeout: Option<Duration>) {
        match timeout {
            Some(t) => log::info!("status ({}s): {}", t.as_secs(), text),
            None => log::info!("status: {}", text),
        }
    }

    fn update_indicator(&self, mode: IndicatorMode) {
        log::info!("indicator: {:?}", mode);
    }

    fn update_timer(&self, text: &str) {
        log::info!("elapsed: {}", text);
    }

    fn stream_chunk(&self, chunk: &str) {
        log::info!("stream: {}", chunk);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting voxbridge shell");

    let config = Config::load()?;
    log::info!("Config loaded: {:?}", config);

    let executor = MainThreadExecutor::new();
    let ui = UiHandle::new(executor.handle(), std::sync::Arc::new(ConsoleSink));

    // Terminal pipeline events flow back through the executor into this
    // channel, drained by the loop below.
    let (event_tx, event_rx) = unbounded();
    let dispatcher = TaskDispatcher::new(executor.handle(), move |event| {
        let _ = event_tx.send(event);
    });

    let timer = PeriodicTimer::new(ui.clone(), Duration::from_millis(config.timer_tick_ms));
    let worker_ui = ui.clone();
    let mut session = SessionController::new(
        ui.clone(),
        dispatcher,
        timer,
        move || simulated_pipeline(worker_ui.clone()),
        |text| log::info!("transcript: {}", text),
    );

    let (cmd_tx, cmd_rx) = unbounded();

    let router = HotkeyRouter::new(executor.handle());
    let toggle_tx = cmd_tx.clone();
    router.register(&config.toggle_hotkey, "toggle-recording", move || {
        let _ = toggle_tx.send(Command::Toggle);
    })?;
    let cancel_tx = cmd_tx.clone();
    router.register(&config.cancel_hotkey, "cancel-processing", move || {
        let _ = cancel_tx.send(Command::Cancel);
    })?;

    // OS-level registration is optional; without it the `trigger` command
    // still exercises the same dispatch path.
    let _os_hotkeys = if config.global_hotkeys {
        match GlobalHotkeys::new() {
            Ok(mut hotkeys) => {
                hotkeys.bind(&config.toggle_hotkey)?;
                hotkeys.bind(&config.cancel_hotkey)?;
                hotkeys.listen(router.clone());
                Some(hotkeys)
            }
            Err(e) => {
                log::warn!("OS hotkeys unavailable: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    spawn_stdin_reader(cmd_tx);

    log::info!(
        "Ready. Commands: start | stop | toggle | cancel | capture on/off | trigger <combo> | status | quit"
    );
    log::info!(
        "Hotkeys: {} toggles recording, {} cancels",
        config.toggle_hotkey,
        config.cancel_hotkey
    );

    loop {
        executor.run_for(Duration::from_millis(100));

        while let Ok(command) = cmd_rx.try_recv() {
            match command {
                Command::Start => session.start_recording(),
                Command::Stop => session.stop_recording(),
                Command::Toggle => session.toggle(),
                Command::Cancel => session.cancel_processing(),
                Command::Capture(enabled) => router.set_capture_mode(enabled, None),
                Command::Trigger(combo) => {
                    if !router.dispatch(&combo) {
                        log::warn!("no binding for '{}'", combo);
                    }
                }
                Command::Status => log::info!("session phase: {:?}", session.phase()),
                Command::Quit => {
                    log::info!("Quit requested");
                    return Ok(());
                }
            }
        }

        while let Ok(event) = event_rx.try_recv() {
            session.on_task_event(event);
        }

        session.poll_timer();
    }
}

/// Stand-in for the blocking capture/transcription/model collaborators.
/// Streams words while it "transcribes" and honors the cooperative token.
fn simulated_pipeline(ui: UiHandle) -> PipelineWork {
    Box::new(move |token| {
        let words = ["captured", "audio", "rendered", "as", "text"];
        let mut transcript = String::new();
        for word in words {
            if token.is_cancelled() {
                anyhow::bail!("cancelled before completion");
            }
            thread::sleep(Duration::from_millis(400));
            if !transcript.is_empty() {
                transcript.push(' ');
            }
            transcript.push_str(word);
            ui.stream_chunk(word);
        }
        Ok(transcript)
    })
}

fn spawn_stdin_reader(cmd_tx: crossbeam_channel::Sender<Command>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let Some(command) = parse_command(&line) else {
                log::warn!("unknown command: {}", line.trim());
                continue;
            };
            if cmd_tx.send(command).is_err() {
                break;
            }
        }
    });
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.trim().splitn(2, ' ');
    let head = parts.next()?.to_lowercase();
    let rest = parts.next().unwrap_or("").trim();
    match head.as_str() {
        "start" => Some(Command::Start),
        "stop" => Some(Command::Stop),
        "toggle" | "t" => Some(Command::Toggle),
        "cancel" | "c" => Some(Command::Cancel),
        "capture" => match rest {
            "on" => Some(Command::Capture(true)),
            "off" => Some(Command::Capture(false)),
            _ => None,
        },
        "trigger" if !rest.is_empty() => Some(Command::Trigger(rest.to_string())),
        "status" => Some(Command::Status),
        "quit" | "q" | "exit" => Some(Command::Quit),
        _ => None,
    }
}
