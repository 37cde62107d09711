//! Hunter threads driven by recorded frames

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use monster_finder::core::ScriptedHotkeys;
use monster_finder::vision::Rgb;
use monster_finder::{
    BotConfig, BotStatus, ControlCommand, Devices, Frame, FrameSequence, HotkeyMap, Hunter,
    HuntEvent, HuntEventKind, Key, MonsterDatabase, ProfilePaths, RecordingSink, RunState, SessionStats,
    TargetPolicy,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fast_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.worker.cycle_ms = 5;
    config.worker.stats_interval_ms = 20;
    config.worker.control_poll_ms = 5;
    config
}

fn blob_frame(x: i32) -> Frame {
    let mut frame = Frame::black(1400, 700);
    frame.fill_rect(x - 10, 140, x + 10, 160, Rgb::new(50, 100, 200));
    frame.fill_rect(x - 20, 70, x + 20, 120, Rgb::new(220, 30, 30));
    frame
}

fn moving_blob(looping: bool) -> FrameSequence {
    FrameSequence::new(vec![blob_frame(600), blob_frame(630)]).looping(looping)
}

fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("monster-finder-{}-{}", std::process::id(), name))
}

#[test]
fn test_hunter_engages_from_recorded_frames() {
    init_logging();
    let mut hunter = Hunter::new(fast_config(), MonsterDatabase::builtin());
    let sink = RecordingSink::new();
    hunter.attach(Devices::new(Box::new(moving_blob(true)), Box::new(sink.clone())));

    let events = Arc::new(Mutex::new(Vec::new()));
    {
        let events = events.clone();
        hunter.on_event(Box::new(move |event: &HuntEvent| events.lock().push(event.clone())));
    }

    hunter.start().unwrap();
    assert!(wait_until(|| events
        .lock()
        .iter()
        .any(|e| matches!(e.kind, HuntEventKind::TargetAcquired { .. }))));
    hunter.stop();

    assert!(!sink.clicks().is_empty());
    assert!(sink.presses(Key::SPACE) >= 1);
    let status = hunter.status();
    assert_eq!(status.run_state, RunState::Stopped);
    assert!(status.frames > 0);
}

#[test]
fn test_hotkeys_start_pause_and_stop() {
    init_logging();
    let mut hunter = Hunter::new(fast_config(), MonsterDatabase::builtin());
    hunter.attach(Devices::new(Box::new(moving_blob(true)), Box::new(RecordingSink::new())));
    hunter
        .listen(Box::new(ScriptedHotkeys::new(vec![vec![Key::F5]])), HotkeyMap::default())
        .unwrap();

    assert!(wait_until(|| {
        hunter_pump(&mut hunter);
        hunter.is_running()
    }));

    hunter.dispatch(ControlCommand::TogglePause).unwrap();
    assert!(wait_until(|| hunter.status().run_state == RunState::Paused));
    hunter.dispatch(ControlCommand::Resume).unwrap();
    assert!(wait_until(|| hunter.status().run_state == RunState::Running));

    hunter.dispatch(ControlCommand::Stop).unwrap();
    assert!(!hunter.is_running());
    hunter.unlisten();
}

fn hunter_pump(hunter: &mut Hunter) {
    hunter.pump().unwrap();
}

#[test]
fn test_capture_loss_saves_stats() {
    init_logging();
    let stats_path = temp_path("stats.toml");
    let paths = ProfilePaths {
        stats: Some(stats_path.clone()),
        ..ProfilePaths::default()
    };
    let mut hunter = Hunter::new(fast_config(), MonsterDatabase::builtin()).with_paths(paths);
    hunter.attach(Devices::new(Box::new(moving_blob(false)), Box::new(RecordingSink::new())));
    hunter.start().unwrap();

    assert!(wait_until(|| matches!(hunter.status().run_state, RunState::Terminated(_))));
    hunter.pump().unwrap();
    assert!(!hunter.is_running());

    let saved = SessionStats::load(&stats_path).unwrap();
    assert_eq!(saved, hunter.status().stats);
    std::fs::remove_file(&stats_path).ok();

    // The devices come back, so a restart is possible; the exhausted sequence ends it again
    assert!(hunter.is_attached());
    hunter.start().unwrap();
    assert!(wait_until(|| matches!(hunter.status().run_state, RunState::Terminated(_))));
    hunter.stop();
    std::fs::remove_file(&stats_path).ok();
}

#[test]
fn test_status_callback_runs() {
    let mut hunter = Hunter::new(fast_config(), MonsterDatabase::builtin());
    hunter.attach(Devices::new(Box::new(moving_blob(true)), Box::new(RecordingSink::new())));

    let reports = Arc::new(AtomicUsize::new(0));
    {
        let reports = reports.clone();
        hunter.set_status_callback(move |status: &BotStatus| {
            if status.run_state.is_active() {
                reports.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    hunter.start().unwrap();
    assert!(wait_until(|| reports.load(Ordering::SeqCst) >= 2));
    hunter.stop();
}

#[test]
fn test_reload_reads_files() {
    let config_path = temp_path("config.toml");
    let monsters_path = temp_path("monsters.txt");
    std::fs::write(&config_path, "[targeting]\npolicy = \"nearest\"\n").unwrap();
    std::fs::write(&monsters_path, "Goblin,90,160,90,30,2,1,40,120,0\n").unwrap();

    let paths = ProfilePaths {
        config: Some(config_path.clone()),
        monsters: Some(monsters_path.clone()),
        stats: None,
    };
    let mut hunter = Hunter::from_paths(paths).unwrap();
    assert_eq!(hunter.config().targeting.policy, TargetPolicy::Nearest);
    assert_eq!(hunter.monsters().len(), 1);

    std::fs::write(&config_path, "[targeting]\npolicy = \"weakest\"\n").unwrap();
    hunter.dispatch(ControlCommand::ReloadConfig).unwrap();
    assert_eq!(hunter.config().targeting.policy, TargetPolicy::Weakest);

    // A broken file keeps what was loaded
    std::fs::write(&config_path, "[targeting\n").unwrap();
    hunter.dispatch(ControlCommand::ReloadConfig).unwrap();
    assert_eq!(hunter.config().targeting.policy, TargetPolicy::Weakest);

    std::fs::remove_file(&config_path).ok();
    std::fs::remove_file(&monsters_path).ok();
}
