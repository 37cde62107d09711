//! Full detection-to-engagement cycles on synthetic frames

use monster_finder::engagement::EngagementState;
use monster_finder::vision::{ClusterBuilder, FrameBuffers, FrameClassifier, Rgb};
use monster_finder::{
    BotConfig, ClassId, EntityId, Frame, Hunt, HuntEventKind, IdentityTracker, Key, LivenessProbe,
    MonsterDatabase, PlayerStatus, RecordingSink, Tick,
};

const GREEN: Rgb = Rgb::new(100, 150, 100);
const HEALTH_RED: Rgb = Rgb::new(220, 30, 30);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn green_only(aggressive: bool) -> MonsterDatabase {
    let line = format!("Green,100,150,100,45,5,{},50,300,0", aggressive as u8);
    MonsterDatabase::from_legacy_str(&line)
}

/// A 21x21 green blob centred on (x, y), with a health bar above it if alive
fn scene(x: i32, y: i32, alive: bool) -> Frame {
    let mut frame = Frame::black(1400, 700);
    frame.fill_rect(x - 10, y - 10, x + 10, y + 10, GREEN);
    if alive {
        frame.fill_rect(x - 20, y - 80, x + 20, y - 30, HEALTH_RED);
    }
    frame
}

#[test]
fn test_clusters_from_single_blob() {
    let db = green_only(true);
    let palette = db.palette();
    let mut buffers = FrameBuffers::new(1400, 700);
    buffers.push(scene(700, 150, false));

    let pixels = FrameClassifier::new(3, 30).classify(buffers.current(), buffers.previous(), &palette);
    let detections = ClusterBuilder::new(60.0, 15, 130.0).centered_on(1400, 700).build(pixels);

    assert_eq!(detections.len(), 1);
    let detection = detections[0];
    assert!(detection.pixel_count >= 15);
    assert!((detection.center_x - 700).abs() <= 3);
    assert!((detection.center_y - 150).abs() <= 3);
    assert!((detection.distance_from_center - 200.0).abs() <= 3.0);
}

#[test]
fn test_blob_on_player_is_excluded() {
    let db = green_only(true);
    let palette = db.palette();
    let mut buffers = FrameBuffers::new(1400, 700);
    buffers.push(scene(700, 350, false));

    let pixels = FrameClassifier::new(3, 30).classify(buffers.current(), buffers.previous(), &palette);
    let detections = ClusterBuilder::new(60.0, 15, 130.0).centered_on(1400, 700).build(pixels);
    assert!(detections.is_empty());
}

#[test]
fn test_probe_without_health_bar() {
    let frame = scene(700, 150, false);
    let mut tracker = IdentityTracker::default();
    let probe = LivenessProbe::default();
    let db = green_only(true);
    let palette = db.palette();
    let mut buffers = FrameBuffers::new(1400, 700);
    buffers.push(frame.clone());
    let pixels = FrameClassifier::new(3, 30).classify(buffers.current(), buffers.previous(), &palette);
    let detections = ClusterBuilder::new(60.0, 15, 130.0).centered_on(1400, 700).build(pixels);

    assert!(!probe.is_alive(&frame, &detections[0]));
    let outcome = tracker.reconcile(0, &detections, &probe.on(&frame));
    assert_eq!(outcome.created, vec![EntityId(1)]);
    assert_eq!(outcome.retired, vec![EntityId(1)]);
}

#[test]
fn test_kill_goes_straight_to_looting() {
    init_logging();
    let mut hunt = Hunt::new(BotConfig::default(), green_only(true));
    let mut input = RecordingSink::new();
    let player = PlayerStatus::default();
    hunt.start(0);

    let report = hunt.cycle(0, scene(700, 150, true), (0, 0), &player, &mut input);
    assert_eq!(report.outcome.created, vec![EntityId(1)]);
    assert_eq!(hunt.controller().state(), EngagementState::Engaging);
    assert_eq!(hunt.controller().target(), Some(EntityId(1)));

    // Same blob, health bar gone
    let report = hunt.cycle(30, scene(700, 150, false), (0, 0), &player, &mut input);
    assert_eq!(hunt.controller().state(), EngagementState::Looting);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e.kind, HuntEventKind::TargetDefeated { target: EntityId(1), .. })));
    assert!(!report
        .events
        .iter()
        .any(|e| matches!(e.kind, HuntEventKind::EngagementTimedOut { .. })));
    assert_eq!(hunt.stats().total_kills, 1);
    assert_eq!(hunt.stats().total_experience, 300);
    assert_eq!(input.presses(Key::X), 1);
}

#[test]
fn test_clicks_are_offset_by_origin() {
    let mut hunt = Hunt::new(BotConfig::default(), green_only(true));
    let mut input = RecordingSink::new();
    hunt.start(0);
    hunt.cycle(0, scene(700, 150, true), (260, 190), &PlayerStatus::default(), &mut input);

    let (x, y) = input.clicks()[0];
    assert!((x - 960).abs() <= 3);
    assert!((y - 340).abs() <= 3);
}

#[test]
fn test_identity_survives_movement() {
    init_logging();
    let mut config = BotConfig::default();
    config.targeting.only_aggressive = true;
    let mut hunt = Hunt::new(config, green_only(false));
    let mut input = RecordingSink::new();
    hunt.start(0);

    for step in 0..12 {
        let x = 300 + step * 30;
        let report = hunt.cycle(step as Tick * 30, scene(x, 150, true), (0, 0), &PlayerStatus::default(), &mut input);
        assert_eq!(report.detections.len(), 1, "step {}", step);
        assert_eq!(hunt.tracker().len(), 1);
        assert!(hunt.tracker().contains(EntityId(1)));
    }
    assert_eq!(hunt.controller().state(), EngagementState::Scanning);
}

#[test]
fn test_unseen_entity_expires() {
    let mut config = BotConfig::default();
    config.targeting.only_aggressive = true;
    let mut hunt = Hunt::new(config, green_only(false));
    let mut input = RecordingSink::new();
    let player = PlayerStatus::default();
    hunt.start(0);

    hunt.cycle(0, scene(300, 150, true), (0, 0), &player, &mut input);
    assert!(hunt.tracker().contains(EntityId(1)));

    // The blob stops moving, so it is no longer detected
    hunt.cycle(2_000, scene(300, 150, true), (0, 0), &player, &mut input);
    assert!(hunt.tracker().contains(EntityId(1)));
    let report = hunt.cycle(2_001, scene(300, 150, true), (0, 0), &player, &mut input);
    assert_eq!(report.outcome.expired, vec![EntityId(1)]);
    assert!(hunt.tracker().is_empty());
}

#[test]
fn test_timeout_fires_at_limit() {
    let mut hunt = Hunt::new(BotConfig::default(), green_only(true));
    let mut input = RecordingSink::new();
    let player = PlayerStatus::default();
    hunt.start(0);

    let mut timed_out_at = None;
    for step in 0..=400u64 {
        let now = step * 25;
        // Alternate between two spots so the blob is always moving
        let x = if step % 2 == 0 { 600 } else { 630 };
        let report = hunt.cycle(now, scene(x, 150, true), (0, 0), &player, &mut input);
        if report
            .events
            .iter()
            .any(|e| matches!(e.kind, HuntEventKind::EngagementTimedOut { .. }))
        {
            timed_out_at = Some(now);
            break;
        }
        assert_eq!(hunt.controller().target(), Some(EntityId(1)));
    }

    assert_eq!(timed_out_at, Some(10_000));
    assert_eq!(hunt.controller().state(), EngagementState::Scanning);
    assert_eq!(input.presses(Key::ESCAPE), 1);
    assert_eq!(hunt.stats().total_kills, 0);
}

#[test]
fn test_reordered_roster_credits_the_right_monster() {
    init_logging();
    let mut hunt = Hunt::new(BotConfig::default(), green_only(true));
    let mut input = RecordingSink::new();
    let player = PlayerStatus::default();
    hunt.start(0);

    hunt.cycle(0, scene(700, 150, true), (0, 0), &player, &mut input);
    assert_eq!(hunt.controller().target(), Some(EntityId(1)));
    assert_eq!(hunt.controller().session().map(|s| s.class_id), Some(ClassId(0)));

    // Green moves to the second slot behind a high-value monster
    let reordered = MonsterDatabase::from_legacy_str(
        "Boss,10,10,10,5,1,1,50,9999,0\nGreen,100,150,100,45,5,1,50,300,0",
    );
    hunt.reconfigure(BotConfig::default(), reordered);
    assert_eq!(hunt.controller().target(), None);
    assert!(hunt.tracker().is_empty());

    let report = hunt.cycle(30, scene(730, 150, true), (0, 0), &player, &mut input);
    assert!(report.events.iter().any(|e| matches!(
        e.kind,
        HuntEventKind::TargetAcquired {
            target: EntityId(2),
            class_id: ClassId(1),
            ..
        }
    )));

    let report = hunt.cycle(60, scene(700, 150, false), (0, 0), &player, &mut input);
    assert!(report.events.iter().any(|e| matches!(
        e.kind,
        HuntEventKind::TargetDefeated {
            target: EntityId(2),
            class_id: ClassId(1),
            experience: 300,
            ..
        }
    )));
    assert_eq!(hunt.stats().total_experience, 300);
}

#[test]
fn test_chain_attack_repeats_on_cooldown() {
    let mut config = BotConfig::default();
    config.engagement.auto_skill = false;
    let cooldown = config.engagement.attack_cooldown_ms;
    let mut hunt = Hunt::new(config, green_only(true));
    let mut input = RecordingSink::new();
    let player = PlayerStatus::default();
    hunt.start(0);

    for step in 0..=80u64 {
        let now = step * 25;
        let x = if step % 2 == 0 { 600 } else { 630 };
        hunt.cycle(now, scene(x, 150, true), (0, 0), &player, &mut input);
        assert_eq!(hunt.controller().target(), Some(EntityId(1)));
    }

    // The opening attack plus one every cooldown over two seconds
    let expected = 1 + (2_000 / cooldown) as usize;
    assert_eq!(input.presses(Key::SPACE), expected);
}

#[test]
fn test_stationary_target_is_lost_after_staleness() {
    let mut hunt = Hunt::new(BotConfig::default(), green_only(true));
    let mut input = RecordingSink::new();
    let player = PlayerStatus::default();
    hunt.start(0);

    hunt.cycle(0, scene(600, 150, true), (0, 0), &player, &mut input);
    assert_eq!(hunt.controller().target(), Some(EntityId(1)));

    // Standing still: no motion, so no fresh detections
    for now in [500, 1_000, 2_000] {
        let report = hunt.cycle(now, scene(600, 150, true), (0, 0), &player, &mut input);
        assert!(report.detections.is_empty());
        assert_eq!(hunt.controller().target(), Some(EntityId(1)));
    }

    let report = hunt.cycle(2_001, scene(600, 150, true), (0, 0), &player, &mut input);
    assert!(report
        .events
        .iter()
        .any(|e| matches!(e.kind, HuntEventKind::TargetLost { target: EntityId(1) })));
    assert_eq!(hunt.controller().state(), EngagementState::Scanning);
    assert_eq!(hunt.stats().total_kills, 0);
    assert_eq!(input.presses(Key::ESCAPE), 0);
}
