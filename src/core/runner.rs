//! Hunter runtime: worker, stats reporter and hotkey listener threads

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::control::{ControlCommand, ControlQueue, HotkeyMap, HotkeySource};
use super::events::{EventHandler, HuntCallback, HuntEvent, HuntEventKind};
use super::pipeline::Hunt;
use super::snapshot::SnapshotCell;
use super::state::{BotStatus, RunState};
use crate::config::BotConfig;
use crate::database::MonsterDatabase;
use crate::engagement::{FullHealth, PlayerStatusSource};
use crate::input::InputSink;
use crate::vision::{Frame, FrameSource};
use crate::{HunterError, Result, Tick};

/// The outside world the worker talks to. Handed back when the worker ends,
/// so a stopped hunter can be started again.
pub struct Devices {
    pub source: Box<dyn FrameSource>,
    pub input: Box<dyn InputSink>,
    pub player: Box<dyn PlayerStatusSource>,
}

impl Devices {
    /// Devices with a player that is always at full health
    pub fn new(source: Box<dyn FrameSource>, input: Box<dyn InputSink>) -> Self {
        Self {
            source,
            input,
            player: Box::new(FullHealth),
        }
    }

    pub fn with_player(mut self, player: Box<dyn PlayerStatusSource>) -> Self {
        self.player = player;
        self
    }
}

/// Files the hunter loads from and saves to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePaths {
    /// Bot configuration, re-read on reload
    pub config: Option<PathBuf>,
    /// Monster database, re-read on reload
    pub monsters: Option<PathBuf>,
    /// Session statistics, written when the worker ends
    pub stats: Option<PathBuf>,
}

/// Callback for periodic status reports
pub type StatusCallback = Arc<dyn Fn(&BotStatus) + Send + Sync>;

/// Owns the hunting threads and the state they share
pub struct Hunter {
    config: Arc<Mutex<BotConfig>>,
    monsters: Arc<Mutex<MonsterDatabase>>,
    paths: ProfilePaths,
    status: Arc<SnapshotCell<BotStatus>>,
    frame: Arc<SnapshotCell<Frame>>,
    running: Arc<AtomicBool>,
    listening: Arc<AtomicBool>,
    controls: Arc<ControlQueue>,
    events: Arc<Mutex<EventHandler>>,
    status_callback: Option<StatusCallback>,
    devices: Option<Devices>,
    worker: Option<JoinHandle<Devices>>,
    reporter: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

impl Hunter {
    pub fn new(config: BotConfig, monsters: MonsterDatabase) -> Self {
        let frame = Frame::black(config.scan.width, config.scan.height);
        Self {
            config: Arc::new(Mutex::new(config)),
            monsters: Arc::new(Mutex::new(monsters)),
            paths: ProfilePaths::default(),
            status: Arc::new(SnapshotCell::default()),
            frame: Arc::new(SnapshotCell::new(frame)),
            running: Arc::new(AtomicBool::new(false)),
            listening: Arc::new(AtomicBool::new(false)),
            controls: Arc::new(ControlQueue::new()),
            events: Arc::new(Mutex::new(EventHandler::new())),
            status_callback: None,
            devices: None,
            worker: None,
            reporter: None,
            listener: None,
        }
    }

    /// Build from files. Missing paths fall back to the defaults.
    pub fn from_paths(paths: ProfilePaths) -> Result<Self> {
        let config = match &paths.config {
            Some(path) => BotConfig::load(path)?,
            None => BotConfig::default(),
        };
        let monsters = match &paths.monsters {
            Some(path) => MonsterDatabase::load(path)?,
            None => MonsterDatabase::builtin(),
        };
        Ok(Self::new(config, monsters).with_paths(paths))
    }

    pub fn with_paths(mut self, paths: ProfilePaths) -> Self {
        self.paths = paths;
        self
    }

    /// Hand the hunter its frame source, input sink and player reader
    pub fn attach(&mut self, devices: Devices) {
        self.devices = Some(devices);
    }

    pub fn is_attached(&self) -> bool {
        self.devices.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest published status
    pub fn status(&self) -> Arc<BotStatus> {
        self.status.load()
    }

    /// Most recent capture processed by the worker
    pub fn latest_frame(&self) -> Arc<Frame> {
        self.frame.load()
    }

    pub fn config(&self) -> BotConfig {
        self.config.lock().clone()
    }

    /// Replace the configuration used by the next start
    pub fn set_config(&self, config: BotConfig) {
        *self.config.lock() = config;
    }

    pub fn monsters(&self) -> MonsterDatabase {
        self.monsters.lock().clone()
    }

    pub fn set_monsters(&self, monsters: MonsterDatabase) {
        *self.monsters.lock() = monsters;
    }

    /// Register a callback for hunt events
    pub fn on_event(&self, callback: HuntCallback) {
        self.events.lock().on_event(callback);
    }

    /// Set the callback the stats thread calls every report interval
    pub fn set_status_callback<F>(&mut self, callback: F)
    where
        F: Fn(&BotStatus) + Send + Sync + 'static,
    {
        self.status_callback = Some(Arc::new(callback));
    }

    /// Start the worker and stats threads
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(HunterError::AlreadyRunning);
        }
        self.reap();
        let devices = self.devices.take().ok_or(HunterError::NotAttached)?;

        let config = self.config.lock().clone();
        let monsters = self.monsters.lock().clone();
        let cycle = Duration::from_millis(config.worker.cycle_ms.max(1));
        let stats_interval = Duration::from_millis(config.worker.stats_interval_ms.max(1));
        let poll = Duration::from_millis(config.worker.control_poll_ms.max(1));
        log::info!(
            "Starting hunter on {} ({} monster classes)",
            devices.source.describe(),
            monsters.len()
        );

        self.running.store(true, Ordering::SeqCst);
        self.status.update(|s| s.run_state = RunState::Running);

        let worker = Worker {
            running: self.running.clone(),
            status: self.status.clone(),
            frame: self.frame.clone(),
            controls: self.controls.clone(),
            events: self.events.clone(),
            shared_config: self.config.clone(),
            shared_monsters: self.monsters.clone(),
            paths: self.paths.clone(),
            cycle,
        };
        let handle = thread::Builder::new()
            .name("hunter-worker".to_string())
            .spawn(move || worker.run(config, monsters, devices))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                self.status.update(|s| s.run_state = RunState::Stopped);
                HunterError::Spawn("worker", e)
            })?;
        self.worker = Some(handle);

        let running = self.running.clone();
        let status = self.status.clone();
        let callback = self.status_callback.clone();
        match thread::Builder::new()
            .name("hunter-stats".to_string())
            .spawn(move || report_stats(running, status, callback, stats_interval, poll))
        {
            Ok(handle) => self.reporter = Some(handle),
            Err(e) => log::warn!("Stats reporter unavailable: {}", e),
        }

        Ok(())
    }

    /// Ask the worker to stop and wait for its current cycle to finish
    pub fn stop(&mut self) {
        if self.is_running() {
            log::info!("Stopping hunter");
        }
        self.running.store(false, Ordering::SeqCst);
        self.reap();
    }

    /// Join finished threads and take back the devices
    fn reap(&mut self) {
        if self.is_running() {
            return;
        }
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(devices) => self.devices = Some(devices),
                Err(_) => log::error!("Worker thread panicked; devices are lost"),
            }
        }
        if let Some(handle) = self.reporter.take() {
            let _ = handle.join();
        }
    }

    /// Apply one control request.
    ///
    /// Start while running and Stop while stopped are no-ops. Other commands
    /// go to the worker, or adjust the stored configuration when idle.
    pub fn dispatch(&mut self, command: ControlCommand) -> Result<()> {
        match command {
            ControlCommand::Start if self.is_running() => {
                log::debug!("Start requested while already running");
                Ok(())
            }
            ControlCommand::Start => self.start(),
            ControlCommand::Stop => {
                self.stop();
                Ok(())
            }
            other if self.is_running() => {
                self.controls.push(other);
                Ok(())
            }
            other => {
                self.apply_idle(other);
                Ok(())
            }
        }
    }

    fn apply_idle(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::ToggleAutoLoot => {
                let mut config = self.config.lock();
                config.loot.auto_loot = !config.loot.auto_loot;
                log::info!("Auto loot {}", on_off(config.loot.auto_loot));
            }
            ControlCommand::ToggleOverlay => {
                let mut config = self.config.lock();
                config.display.show_overlay = !config.display.show_overlay;
                config.display.show_boxes = config.display.show_overlay;
                log::info!("Overlay {}", on_off(config.display.show_overlay));
            }
            ControlCommand::ReloadConfig => {
                if let Some((config, monsters)) = reload(&self.paths, &self.config, &self.monsters) {
                    *self.config.lock() = config;
                    *self.monsters.lock() = monsters;
                }
            }
            other => log::debug!("Ignoring {} while stopped", other),
        }
    }

    /// Handle requests queued by the hotkey listener while no worker is
    /// draining them, and collect a worker that ended on its own
    pub fn pump(&mut self) -> Result<()> {
        self.reap();
        if self.is_running() {
            return Ok(());
        }
        for command in self.controls.drain() {
            self.dispatch(command)?;
        }
        Ok(())
    }

    /// Start the hotkey listener thread
    pub fn listen(&mut self, hotkeys: Box<dyn HotkeySource>, map: HotkeyMap) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let listening = self.listening.clone();
        let controls = self.controls.clone();
        let poll = Duration::from_millis(self.config.lock().worker.control_poll_ms.max(1));
        let handle = thread::Builder::new()
            .name("hunter-hotkeys".to_string())
            .spawn(move || poll_hotkeys(listening, controls, hotkeys, map, poll))
            .map_err(|e| {
                self.listening.store(false, Ordering::SeqCst);
                HunterError::Spawn("hotkey", e)
            })?;
        self.listener = Some(handle);
        Ok(())
    }

    /// Stop the hotkey listener thread
    pub fn unlisten(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
    }

    /// Render the latest frame with tracked boxes, or `None` when the overlay is off
    #[cfg(feature = "vision")]
    pub fn render_overlay(&self) -> Option<image::RgbImage> {
        let status = self.status();
        if !status.show_overlay {
            return None;
        }
        let display = self.config.lock().display.clone();
        Some(crate::vision::render_overlay(&self.latest_frame(), &status, &display))
    }
}

impl Drop for Hunter {
    fn drop(&mut self) {
        self.unlisten();
        self.stop();
    }
}

/// State moved into the worker thread
struct Worker {
    running: Arc<AtomicBool>,
    status: Arc<SnapshotCell<BotStatus>>,
    frame: Arc<SnapshotCell<Frame>>,
    controls: Arc<ControlQueue>,
    events: Arc<Mutex<EventHandler>>,
    shared_config: Arc<Mutex<BotConfig>>,
    shared_monsters: Arc<Mutex<MonsterDatabase>>,
    paths: ProfilePaths,
    cycle: Duration,
}

impl Worker {
    fn run(self, config: BotConfig, monsters: MonsterDatabase, mut devices: Devices) -> Devices {
        let clock = Instant::now();
        let now = || clock.elapsed().as_millis() as Tick;

        let mut hunt = Hunt::new(config, monsters);
        hunt.start(now());
        let mut terminated = None;
        self.status.store(hunt.status(RunState::Running));

        while self.running.load(Ordering::SeqCst) {
            let cycle_start = Instant::now();

            for command in self.controls.drain() {
                self.apply(command, &mut hunt, &mut devices, now());
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            if !hunt.is_paused() {
                let player = devices.player.status();
                if hunt.is_critical(&player) {
                    log::warn!(
                        "Player HP at {:.0}%, pausing until resumed",
                        player.hp_percent()
                    );
                    hunt.pause(now());
                    self.emit(&[HuntEvent::new(
                        now(),
                        HuntEventKind::CriticalHealth {
                            hp_percent: player.hp_percent(),
                        },
                    )]);
                } else {
                    let frame = match devices.source.capture() {
                        Ok(frame) => frame,
                        Err(e) => {
                            log::error!("Capture failed, stopping: {}", e);
                            terminated = Some(e.to_string());
                            break;
                        }
                    };
                    let origin = devices.source.origin();
                    let report = hunt.cycle(now(), frame, origin, &player, &mut devices.input);
                    self.emit(&report.events);
                    self.frame.store_arc(hunt.current_frame().clone());
                }
            }

            let run_state = if hunt.is_paused() { RunState::Paused } else { RunState::Running };
            self.status.store(hunt.status(run_state));

            let spent = cycle_start.elapsed();
            if spent < self.cycle {
                thread::sleep(self.cycle - spent);
            }
        }

        hunt.finish(now());
        log::info!("Hunt ended\n{}", hunt.stats().formatted());
        if let Some(path) = &self.paths.stats {
            if let Err(e) = hunt.stats().save(path) {
                log::error!("Failed to save statistics to {}: {}", path.display(), e);
            }
        }

        // Clear the flag first so anyone who sees the final state can join
        self.running.store(false, Ordering::SeqCst);
        let final_state = match terminated {
            Some(reason) => RunState::Terminated(reason),
            None => RunState::Stopped,
        };
        self.status.store(hunt.status(final_state));
        devices
    }

    fn apply(
        &self,
        command: ControlCommand,
        hunt: &mut Hunt,
        devices: &mut Devices,
        now: Tick,
    ) {
        log::debug!("Control request: {}", command);
        match command {
            ControlCommand::Start => {}
            ControlCommand::Stop => self.running.store(false, Ordering::SeqCst),
            ControlCommand::Pause => hunt.pause(now),
            ControlCommand::Resume => hunt.resume(now),
            ControlCommand::TogglePause => {
                if hunt.is_paused() {
                    hunt.resume(now);
                } else {
                    hunt.pause(now);
                }
                log::info!("Hunt {}", if hunt.is_paused() { "paused" } else { "resumed" });
            }
            ControlCommand::ReloadConfig => {
                if let Some((config, monsters)) = reload(&self.paths, &self.shared_config, &self.shared_monsters) {
                    *self.shared_config.lock() = config.clone();
                    *self.shared_monsters.lock() = monsters.clone();
                    hunt.reconfigure(config, monsters);
                }
            }
            ControlCommand::ToggleAutoLoot => {
                let enabled = hunt.toggle_auto_loot();
                self.shared_config.lock().loot.auto_loot = enabled;
                log::info!("Auto loot {}", on_off(enabled));
            }
            ControlCommand::ToggleOverlay => {
                let shown = hunt.toggle_overlay();
                let mut config = self.shared_config.lock();
                config.display.show_overlay = shown;
                config.display.show_boxes = shown;
                log::info!("Overlay {}", on_off(shown));
            }
            ControlCommand::EmergencyEscape => {
                if let Some(event) = hunt.escape(now, &mut devices.input) {
                    self.emit(&[event]);
                }
            }
        }
    }

    fn emit(&self, events: &[HuntEvent]) {
        if events.is_empty() {
            return;
        }
        let handler = self.events.lock();
        for event in events {
            handler.emit(event);
        }
    }
}

/// Re-read config and monsters from their files, falling back to the
/// current values for anything without a path. `None` if a file failed.
fn reload(
    paths: &ProfilePaths,
    config: &Mutex<BotConfig>,
    monsters: &Mutex<MonsterDatabase>,
) -> Option<(BotConfig, MonsterDatabase)> {
    let new_config = match &paths.config {
        Some(path) => match BotConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Reload of {} failed, keeping current config: {}", path.display(), e);
                return None;
            }
        },
        None => config.lock().clone(),
    };
    let new_monsters = match &paths.monsters {
        Some(path) => match MonsterDatabase::load(path) {
            Ok(db) => db,
            Err(e) => {
                log::error!("Reload of {} failed, keeping current monsters: {}", path.display(), e);
                return None;
            }
        },
        None => monsters.lock().clone(),
    };
    log::info!("Configuration reloaded");
    Some((new_config, new_monsters))
}

fn report_stats(
    running: Arc<AtomicBool>,
    status: Arc<SnapshotCell<BotStatus>>,
    callback: Option<StatusCallback>,
    interval: Duration,
    poll: Duration,
) {
    let mut last_report = Instant::now();
    while running.load(Ordering::SeqCst) {
        thread::sleep(poll.min(interval));
        if last_report.elapsed() < interval {
            continue;
        }
        last_report = Instant::now();

        let snapshot = status.load();
        match &callback {
            Some(callback) => callback(&snapshot),
            None => log::debug!("{}", snapshot.stats.formatted()),
        }
    }
}

fn poll_hotkeys(
    listening: Arc<AtomicBool>,
    controls: Arc<ControlQueue>,
    mut hotkeys: Box<dyn HotkeySource>,
    map: HotkeyMap,
    poll: Duration,
) {
    while listening.load(Ordering::SeqCst) {
        for command in map.translate(&hotkeys.pressed()) {
            log::debug!("Hotkey requested {}", command);
            controls.push(command);
        }
        thread::sleep(poll);
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}
