mod config;
mod debounce;
mod engine;
mod ipc_server;
mod machine;
mod macros;
mod options;
mod surface;
mod view;

use anyhow::{Context, Result};
use common::{Command, KeyEvent, MediaRequest, Response, ViewStatus};
use engine::{EngineEvent, MediaEngine};
use ipc_server::ViewRequest;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use view::{FixedWindow, VideoView};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let loaded = config::Config::load();
    let log_level = loaded
        .as_ref()
        .map(|cfg| cfg.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::info!("Starting vidview daemon v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(cfg) => {
            log::info!("Configuration loaded");
            log::info!("  Window: {}x{}", cfg.window.width, cfg.window.height);
            log::info!(
                "  Autoplay: {}",
                if cfg.playback.autoplay { "yes" } else { "no" }
            );
            cfg
        }
        Err(e) => {
            log::warn!("Failed to load config: {:#}. Using defaults.", e);
            config::Config::default()
        }
    };

    let specs = machine::MachineSpecs::probe();
    let args = config.engine.to_args(specs.as_ref());
    log::info!("Engine options: {}", args.join(" "));

    let engine = engine::shared(|| {
        let engine = engine::GstEngine::new(&args).context("Failed to start media engine")?;
        Ok(Arc::new(engine) as Arc<dyn MediaEngine>)
    })?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = mpsc::unbounded_channel();
    let should_exit = Arc::new(AtomicBool::new(false));

    let mut daemon = Daemon::new(engine, events_tx, config);

    // Optional media to open at startup
    if let Some(locator) = std::env::args().nth(1) {
        let response = daemon.handle_command(Command::Load {
            locator,
            options: Vec::new(),
        });
        if let Response::Error(e) = response {
            log::error!("Failed to load startup media: {}", e);
        }
    }

    let socket_path = common::get_socket_path();
    let ipc_exit = Arc::clone(&should_exit);
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc_server::start(&socket_path, view_tx, ipc_exit).await {
            log::error!("IPC server error: {:#}", e);
        }
    });

    daemon.run(events_rx, view_rx, &should_exit).await?;

    should_exit.store(true, Ordering::Relaxed);
    log_and_continue!(ipc_handle.await, "stop IPC server");

    log::info!("Daemon shutting down");
    Ok(())
}

/// Listener output collected for status queries
#[derive(Debug, Default)]
struct Activity {
    loading: bool,
    prepared: bool,
    completed: bool,
    last_error: Option<String>,
}

/// Owns the view and runs every command against it
struct Daemon {
    view: VideoView,
    activity: Rc<RefCell<Activity>>,
    config: config::Config,
    exit_requested: bool,
}

impl Daemon {
    fn new(
        engine: Arc<dyn MediaEngine>,
        events_tx: mpsc::UnboundedSender<EngineEvent>,
        config: config::Config,
    ) -> Self {
        let window = FixedWindow::new(config.window.width, config.window.height);
        let mut view = VideoView::new(engine, Box::new(window), events_tx);
        let activity = Rc::new(RefCell::new(Activity::default()));

        let a = Rc::clone(&activity);
        view.set_on_prepared(Some(Box::new(move || {
            log::info!("Media prepared");
            a.borrow_mut().prepared = true;
        })));

        let a = Rc::clone(&activity);
        view.set_on_completion(Some(Box::new(move || {
            log::info!("Playback completed");
            a.borrow_mut().completed = true;
        })));

        let a = Rc::clone(&activity);
        view.set_on_error(Some(Box::new(move |message: &str| {
            log::error!("Playback error: {}", message);
            a.borrow_mut().last_error = Some(message.to_string());
        })));

        let a = Rc::clone(&activity);
        view.set_on_loading_state_changed(Some(Box::new(move |loading: bool| {
            log::debug!("Loading: {}", loading);
            a.borrow_mut().loading = loading;
        })));

        if !config.playback.intercept_keys.is_empty() {
            let keys = config.playback.intercept_keys.clone();
            view.set_on_key_intercept(Some(Box::new(move |event: &KeyEvent| {
                let hit = keys.iter().any(|key| *key == event.code);
                if hit {
                    log::info!("Intercepted key: {}", event.code);
                }
                hit
            })));
        }

        Self {
            view,
            activity,
            config,
            exit_requested: false,
        }
    }

    /// Drive the view until a kill command or a termination signal
    async fn run(
        &mut self,
        mut events_rx: mpsc::UnboundedReceiver<EngineEvent>,
        mut view_rx: mpsc::UnboundedReceiver<ViewRequest>,
        should_exit: &AtomicBool,
    ) -> Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

        while !self.exit_requested && !should_exit.load(Ordering::Relaxed) {
            let deadline = self.view.next_deadline();

            tokio::select! {
                Some(event) = events_rx.recv() => {
                    log_and_continue!(
                        self.view.handle_event(event, Instant::now()),
                        "handle engine event"
                    );
                }
                Some(request) = view_rx.recv() => {
                    let response = self.handle_command(request.command);
                    if request.reply.send(response).is_err() {
                        log::debug!("Client went away before the reply");
                    }
                }
                _ = async {
                    if let Some(deadline) = deadline {
                        tokio::time::sleep_until(deadline.into()).await;
                    }
                }, if deadline.is_some() => {}
                _ = sigterm.recv() => {
                    log::info!("Received SIGTERM, shutting down...");
                    break;
                }
                _ = sigint.recv() => {
                    log::info!("Received SIGINT, shutting down...");
                    break;
                }
                else => break,
            }

            self.view.poll_timers(Instant::now());
        }

        self.view.release();
        Ok(())
    }

    fn handle_command(&mut self, command: Command) -> Response {
        match command {
            Command::Load { locator, options } => {
                *self.activity.borrow_mut() = Activity::default();
                if let Err(e) = self
                    .view
                    .load(MediaRequest::with_options(locator, options))
                {
                    return Response::Error(e);
                }
                if self.config.playback.autoplay {
                    self.view.play();
                }
                Response::Ok
            }
            Command::Play => {
                self.view.play();
                Response::Ok
            }
            Command::Pause => {
                self.view.pause();
                Response::Ok
            }
            Command::Stop => {
                self.view.stop();
                Response::Ok
            }
            Command::SeekTo { ms } => {
                self.view.seek_to(ms);
                Response::Ok
            }
            Command::Skip { delta_ms } => {
                self.view.skip(delta_ms);
                Response::Ok
            }
            Command::Release => {
                self.view.release();
                Response::Ok
            }
            Command::Key { code } => Response::KeyHandled(self.dispatch_key(KeyEvent::press(code))),
            Command::Status => Response::Status(self.status()),
            Command::Ping => Response::Pong,
            Command::Kill => {
                log::info!("Received kill command");
                self.exit_requested = true;
                Response::Ok
            }
        }
    }

    /// Offer a key to the view, then to the default bindings
    fn dispatch_key(&mut self, event: KeyEvent) -> bool {
        // only a focusable view sees keys first
        if self.view.is_focusable() && self.view.dispatch_key_event(&event) {
            return true;
        }

        let step = self.config.playback.skip_step_ms;
        match event.code.as_str() {
            "space" => {
                if self.view.is_playing() {
                    self.view.pause();
                } else {
                    self.view.play();
                }
            }
            "left" => self.view.skip(-step),
            "right" => self.view.skip(step),
            _ => return false,
        }
        true
    }

    fn status(&self) -> ViewStatus {
        let activity = self.activity.borrow();
        ViewStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: self.view.state(),
            locator: self.view.request().map(|r| r.locator.clone()),
            position_ms: self.view.current_position(),
            duration_ms: self.view.duration(),
            is_playing: self.view.is_playing(),
            can_seek: self.view.can_seek(),
            loading: activity.loading,
            prepared: activity.prepared,
            completed: activity.completed,
            layout: self.view.layout().copied(),
            last_error: activity.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use common::PlaybackState;

    fn daemon(config: config::Config) -> (Daemon, Arc<FakeEngine>) {
        let engine = Arc::new(FakeEngine::new());
        let (tx, _rx) = mpsc::unbounded_channel();
        let daemon = Daemon::new(Arc::clone(&engine) as Arc<dyn MediaEngine>, tx, config);
        (daemon, engine)
    }

    fn load(daemon: &mut Daemon) {
        let response = daemon.handle_command(Command::Load {
            locator: "/videos/clip.mp4".to_string(),
            options: Vec::new(),
        });
        assert!(matches!(response, Response::Ok));
    }

    #[test]
    fn test_status_of_idle_daemon() {
        let (daemon, _) = daemon(config::Config::default());
        let status = daemon.status();
        assert_eq!(status.state, PlaybackState::Idle);
        assert!(status.locator.is_none());
        assert!(!status.prepared);
        assert!(status.layout.is_none());
    }

    #[test]
    fn test_load_and_status() {
        let (mut daemon, _) = daemon(config::Config::default());
        load(&mut daemon);

        let Response::Status(status) = daemon.handle_command(Command::Status) else {
            panic!("expected status");
        };
        assert_eq!(status.state, PlaybackState::Loading);
        assert_eq!(status.locator.as_deref(), Some("/videos/clip.mp4"));
        assert_eq!(status.duration_ms, 120_000);
        assert!(status.can_seek);
    }

    #[test]
    fn test_autoplay_marks_play_pending() {
        let mut config = config::Config::default();
        config.playback.autoplay = true;
        let (mut daemon, _) = daemon(config);
        load(&mut daemon);
        assert_eq!(daemon.view.state(), PlaybackState::PlayPendingOnLoad);
    }

    #[test]
    fn test_default_key_bindings() {
        let (mut daemon, engine) = daemon(config::Config::default());
        load(&mut daemon);
        engine.player_state().lock().unwrap().time = 30_000;

        assert!(matches!(
            daemon.handle_command(Command::Key {
                code: "right".to_string()
            }),
            Response::KeyHandled(true)
        ));
        assert_eq!(engine.calls().last().unwrap(), "set_time 40000");

        assert!(daemon.dispatch_key(KeyEvent::press("left")));
        assert_eq!(engine.calls().last().unwrap(), "set_time 30000");

        // playing after load, so space pauses
        assert!(daemon.dispatch_key(KeyEvent::press("space")));
        assert_eq!(engine.calls().last().unwrap(), "pause");

        assert!(!daemon.dispatch_key(KeyEvent::press("x")));
    }

    #[test]
    fn test_intercepted_keys_skip_default_bindings() {
        let mut config = config::Config::default();
        config.playback.intercept_keys = vec!["space".to_string()];
        let (mut daemon, engine) = daemon(config);
        load(&mut daemon);
        engine.clear_calls();

        assert!(daemon.view.is_focusable());
        assert!(daemon.dispatch_key(KeyEvent::press("space")));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_kill_requests_exit() {
        let (mut daemon, _) = daemon(config::Config::default());
        assert!(matches!(daemon.handle_command(Command::Kill), Response::Ok));
        assert!(daemon.exit_requested);
    }

    #[test]
    fn test_load_resets_activity() {
        let (mut daemon, _) = daemon(config::Config::default());
        daemon.activity.borrow_mut().completed = true;
        daemon.activity.borrow_mut().last_error = Some("old".to_string());
        load(&mut daemon);

        let status = daemon.status();
        assert!(!status.completed);
        assert!(status.last_error.is_none());
    }

    #[test]
    fn test_load_failure_is_reported() {
        let mut engine = FakeEngine::new();
        engine.fail = true;
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut daemon = Daemon::new(Arc::new(engine), tx, config::Config::default());

        let response = daemon.handle_command(Command::Load {
            locator: "nowhere".to_string(),
            options: Vec::new(),
        });
        assert!(matches!(response, Response::Error(common::ViewError::Engine(_))));
    }
}
