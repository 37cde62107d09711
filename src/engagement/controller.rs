//! Engagement state machine
//!
//! One session at a time: pick a target while scanning, attack it until the
//! health bar disappears or the time limit hits, then collect loot. Every
//! decision is taken against an explicit tick so runs replay exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::path;
use super::skills::{Skill, SkillRotation};
use crate::config::{EngagementConfig, LootConfig, TargetingConfig};
use crate::core::events::{HuntEvent, HuntEventKind};
use crate::database::MonsterDatabase;
use crate::input::InputSink;
use crate::stats::SessionStats;
use crate::targeting::{self, ClassTraits};
use crate::tracking::{EntityId, IdentityTracker, ReconcileOutcome, TrackedEntity};
use crate::vision::{ClassId, Detection, VitalSign};
use crate::{HunterError, Result, Tick};

/// Where the controller is in the engagement cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementState {
    #[default]
    Scanning,
    Engaging,
    Resolving,
    Looting,
}

impl fmt::Display for EngagementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngagementState::Scanning => write!(f, "scanning"),
            EngagementState::Engaging => write!(f, "engaging"),
            EngagementState::Resolving => write!(f, "resolving"),
            EngagementState::Looting => write!(f, "looting"),
        }
    }
}

/// The one active engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSession {
    pub target: EntityId,
    pub class_id: ClassId,
    pub started_at: Tick,
    /// Last geometry seen for the target
    pub geometry: Detection,
    pub last_attack: Tick,
}

impl EngagementSession {
    /// Time since the session opened
    pub fn elapsed(&self, now: Tick) -> u64 {
        now.saturating_sub(self.started_at)
    }
}

/// Post-kill loot presses, spread over several cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LootRun {
    pressed: u32,
    next_at: Tick,
}

/// Everything the controller reads or touches in one step
pub struct Scene<'a> {
    pub tracker: &'a mut IdentityTracker,
    /// Result of this cycle's reconciliation
    pub outcome: &'a ReconcileOutcome,
    /// Liveness probe bound to the current frame
    pub vital: &'a dyn VitalSign,
    pub monsters: &'a MonsterDatabase,
    pub targeting: &'a TargetingConfig,
    /// Frame-to-client offset for clicks
    pub origin: (i32, i32),
    /// Player position in frame coordinates
    pub player: (i32, i32),
    pub hp_percent: f64,
}

/// Drives one target at a time from acquisition to loot
#[derive(Debug, Clone)]
pub struct EngagementController {
    config: EngagementConfig,
    loot: LootConfig,
    state: EngagementState,
    session: Option<EngagementSession>,
    rotation: SkillRotation,
    looting: Option<LootRun>,
    last_sweep: Option<Tick>,
}

impl EngagementController {
    /// Create an idle controller
    pub fn new(config: EngagementConfig, loot: LootConfig, skills: Vec<Skill>) -> Self {
        Self {
            config,
            loot,
            state: EngagementState::Scanning,
            session: None,
            rotation: SkillRotation::new(skills),
            looting: None,
            last_sweep: None,
        }
    }

    /// Swap in new tunables. An open session keeps running under them.
    pub fn configure(&mut self, config: EngagementConfig, loot: LootConfig, skills: Vec<Skill>) {
        self.config = config;
        self.loot = loot;
        if self.rotation.skills() != skills.as_slice() {
            self.rotation = SkillRotation::new(skills);
        }
    }

    /// Current state
    pub fn state(&self) -> EngagementState {
        self.state
    }

    /// The open session, if any
    pub fn session(&self) -> Option<&EngagementSession> {
        self.session.as_ref()
    }

    /// Entity under attack, if any
    pub fn target(&self) -> Option<EntityId> {
        self.session.as_ref().map(|s| s.target)
    }

    pub fn auto_loot(&self) -> bool {
        self.loot.auto_loot
    }

    pub fn set_auto_loot(&mut self, enabled: bool) {
        self.loot.auto_loot = enabled;
    }

    pub fn rotation(&self) -> &SkillRotation {
        &self.rotation
    }

    /// Push every pending deadline back by `ms`, so a suspended span does
    /// not count toward the engagement limit, cooldowns or loot spacing
    pub fn shift_clock(&mut self, ms: u64) {
        if ms == 0 {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            session.started_at += ms;
            session.last_attack += ms;
        }
        if let Some(run) = self.looting.as_mut() {
            run.next_at += ms;
        }
        if let Some(last) = self.last_sweep.as_mut() {
            *last += ms;
        }
    }

    /// Advance the state machine by one worker cycle
    pub fn step<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        scene: &mut Scene<'_>,
        input: &mut S,
        stats: &mut SessionStats,
    ) -> Vec<HuntEvent> {
        let mut events = Vec::new();
        match self.state {
            EngagementState::Scanning => self.scan(now, scene, input, &mut events),
            EngagementState::Engaging => self.engage(now, scene, input, stats, &mut events),
            EngagementState::Resolving => self.resolve(now, scene, input, stats, &mut events),
            EngagementState::Looting => self.collect(now, input, stats, &mut events),
        }
        events
    }

    fn scan<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        scene: &mut Scene<'_>,
        input: &mut S,
        events: &mut Vec<HuntEvent>,
    ) {
        self.sweep(now, input);

        let monsters = scene.monsters;
        let only_aggressive = scene.targeting.only_aggressive;
        let candidates: Vec<TrackedEntity> = scene
            .tracker
            .snapshot()
            .into_iter()
            .filter(|e| !only_aggressive || monsters.is_aggressive(e.class_id))
            .collect();

        let Some(target) = targeting::select(scene.targeting.policy, &candidates, monsters) else {
            return;
        };
        let target = target.clone();
        // Scanning never holds a session, so this cannot be refused
        if let Ok(event) = self.acquire(now, &target, scene, input) {
            events.push(event);
        }
    }

    /// Periodic loot press while idle
    fn sweep<S: InputSink + ?Sized>(&mut self, now: Tick, input: &mut S) {
        if !self.loot.auto_loot {
            return;
        }
        match self.last_sweep {
            None => self.last_sweep = Some(now),
            Some(last) if now.saturating_sub(last) >= self.loot.interval_ms => {
                input.key_press(self.loot.key);
                self.last_sweep = Some(now);
            }
            Some(_) => {}
        }
    }

    /// Open a session against `target`: click it, wait, then attack.
    ///
    /// Fails with [`HunterError::SessionActive`] while another session is open.
    pub fn acquire<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        target: &TrackedEntity,
        scene: &Scene<'_>,
        input: &mut S,
    ) -> Result<HuntEvent> {
        if let Some(session) = &self.session {
            return Err(HunterError::SessionActive(session.target.0));
        }

        let (ox, oy) = scene.origin;
        let (tx, ty) = target.center();
        if self.config.pathfinding && self.config.waypoint_clicks {
            let stops = path::waypoints(scene.player, (tx, ty));
            for &(x, y) in stops.iter().take(stops.len().saturating_sub(1)) {
                input.click(x + ox, y + oy);
            }
        }
        input.click(tx + ox, ty + oy);
        input.settle(self.config.attack_delay_ms);
        input.key_press(self.config.attack_key);

        log::info!(
            "Targeting {} {} at ({}, {}), {:.0}px away",
            scene.monsters.name(target.class_id),
            target.id,
            tx,
            ty,
            target.distance()
        );

        self.session = Some(EngagementSession {
            target: target.id,
            class_id: target.class_id,
            started_at: now,
            geometry: target.geometry,
            last_attack: now,
        });
        self.state = EngagementState::Engaging;
        Ok(HuntEvent::target_acquired(now, target.id, target.class_id, (tx, ty)))
    }

    fn engage<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        scene: &mut Scene<'_>,
        input: &mut S,
        stats: &mut SessionStats,
        events: &mut Vec<HuntEvent>,
    ) {
        let Some(session) = self.session.as_mut() else {
            self.state = EngagementState::Scanning;
            return;
        };
        let target = session.target;

        let elapsed = session.elapsed(now);
        if elapsed >= self.config.max_engagement_ms {
            input.key_press(self.config.escape_key);
            log::warn!("Engagement with {} timed out after {}ms", target, elapsed);
            events.push(HuntEvent::timed_out(now, target, elapsed));
            self.finish();
            return;
        }

        let alive = if scene.outcome.retired.contains(&target) {
            false
        } else if let Some(entity) = scene.tracker.get(target) {
            session.geometry = entity.geometry;
            scene.vital.is_alive(&session.geometry)
        } else if scene.outcome.expired.contains(&target) {
            log::info!("Lost sight of {}", target);
            events.push(HuntEvent::target_lost(now, target));
            self.finish();
            return;
        } else {
            scene.vital.is_alive(&session.geometry)
        };

        if !alive {
            self.state = EngagementState::Resolving;
            self.resolve(now, scene, input, stats, events);
            return;
        }

        if self.config.auto_skill {
            if let Some(skill) = self.rotation.next_skill(now, scene.hp_percent) {
                log::debug!("Using skill {} ({})", skill.name, skill.key);
                input.key_press(skill.key);
            }
        }
        if self.config.chain_attack && now.saturating_sub(session.last_attack) >= self.config.attack_cooldown_ms {
            input.key_press(self.config.attack_key);
            session.last_attack = now;
        }
    }

    fn resolve<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        scene: &mut Scene<'_>,
        input: &mut S,
        stats: &mut SessionStats,
        events: &mut Vec<HuntEvent>,
    ) {
        // The target is gone; looting needs no session
        let Some(session) = self.session.take() else {
            self.state = EngagementState::Scanning;
            return;
        };

        let experience = scene.monsters.experience(session.class_id);
        stats.record_kill(experience, now);
        scene.tracker.remove(session.target);
        log::info!(
            "Defeated {} {} (+{} exp, total kills {})",
            scene.monsters.name(session.class_id),
            session.target,
            experience,
            stats.total_kills
        );
        events.push(HuntEvent::target_defeated(
            now,
            session.target,
            session.class_id,
            experience,
            session.elapsed(now),
        ));

        if self.loot.auto_loot && self.loot.presses > 0 {
            self.state = EngagementState::Looting;
            self.looting = Some(LootRun { pressed: 0, next_at: now });
            self.collect(now, input, stats, events);
        } else {
            self.finish();
        }
    }

    fn collect<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        input: &mut S,
        stats: &mut SessionStats,
        events: &mut Vec<HuntEvent>,
    ) {
        let Some(run) = self.looting.as_mut() else {
            self.finish();
            return;
        };
        if now < run.next_at {
            return;
        }

        if run.pressed >= self.loot.presses {
            let presses = run.pressed;
            stats.record_loot(1);
            log::debug!("Loot collected with {} presses", presses);
            events.push(HuntEvent::looted(now, presses));
            self.last_sweep = Some(now);
            self.finish();
            return;
        }

        input.key_press(self.loot.key);
        run.pressed += 1;
        let wait = if run.pressed == 1 {
            self.loot.first_delay_ms
        } else {
            self.loot.spacing_ms
        };
        run.next_at = now + wait;
    }

    /// Press the escape key and drop whatever session is open
    pub fn escape<S: InputSink + ?Sized>(&mut self, now: Tick, input: &mut S) -> HuntEvent {
        input.key_press(self.config.escape_key);
        let target = self.target();
        log::warn!("Emergency escape (target {:?})", target);
        self.finish();
        HuntEvent::new(now, HuntEventKind::Escaped { target })
    }

    /// Drop the session without touching input
    pub fn abort(&mut self) {
        if let Some(session) = &self.session {
            log::debug!("Abandoning engagement with {}", session.target);
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.session = None;
        self.looting = None;
        self.state = EngagementState::Scanning;
    }
}

impl Default for EngagementController {
    fn default() -> Self {
        Self::new(EngagementConfig::default(), LootConfig::default(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputAction, Key, RecordingSink};

    fn blob(x: i32, y: i32, class: u16) -> Detection {
        Detection {
            min_x: x - 10,
            max_x: x + 10,
            min_y: y - 10,
            max_y: y + 10,
            pixel_count: 40,
            center_x: x,
            center_y: y,
            distance_from_center: 200.0,
            class_id: ClassId(class),
        }
    }

    struct World {
        tracker: IdentityTracker,
        monsters: MonsterDatabase,
        targeting: TargetingConfig,
        stats: SessionStats,
        input: RecordingSink,
    }

    impl World {
        fn new() -> Self {
            let mut stats = SessionStats::new();
            stats.start(0);
            Self {
                tracker: IdentityTracker::default(),
                monsters: MonsterDatabase::builtin(),
                targeting: TargetingConfig::default(),
                stats,
                input: RecordingSink::new(),
            }
        }

        /// Reconcile `detections` then step the controller
        fn cycle(
            &mut self,
            controller: &mut EngagementController,
            now: Tick,
            detections: &[Detection],
            alive: bool,
        ) -> Vec<HuntEvent> {
            let vital = move |_: &Detection| alive;
            let outcome = self.tracker.reconcile(now, detections, &vital);
            let mut scene = Scene {
                tracker: &mut self.tracker,
                outcome: &outcome,
                vital: &vital,
                monsters: &self.monsters,
                targeting: &self.targeting,
                origin: (0, 0),
                player: (700, 350),
                hp_percent: 100.0,
            };
            controller.step(now, &mut scene, &mut self.input, &mut self.stats)
        }
    }

    fn quiet_controller() -> EngagementController {
        let config = EngagementConfig {
            auto_skill: false,
            chain_attack: false,
            ..EngagementConfig::default()
        };
        EngagementController::new(config, LootConfig::default(), Vec::new())
    }

    #[test]
    fn test_scanning_acquires_target() {
        let mut world = World::new();
        let mut controller = quiet_controller();

        let events = world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);
        assert_eq!(controller.state(), EngagementState::Engaging);
        assert_eq!(controller.target(), Some(EntityId(1)));
        assert!(matches!(events[0].kind, HuntEventKind::TargetAcquired { .. }));

        let actions = world.input.actions();
        assert_eq!(actions[0], InputAction::Click { x: 700, y: 150 });
        assert_eq!(actions[1], InputAction::KeyPress(Key::SPACE));
    }

    #[test]
    fn test_nothing_to_target_stays_scanning() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        let events = world.cycle(&mut controller, 0, &[], true);
        assert!(events.is_empty());
        assert_eq!(controller.state(), EngagementState::Scanning);
        assert!(world.input.actions().is_empty());
    }

    #[test]
    fn test_second_session_is_refused() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        world.cycle(&mut controller, 0, &[blob(700, 150, 0), blob(300, 150, 0)], true);

        let other = world.tracker.get(EntityId(2)).cloned().unwrap();
        let outcome = ReconcileOutcome::default();
        let vital = |_: &Detection| true;
        let scene = Scene {
            tracker: &mut world.tracker,
            outcome: &outcome,
            vital: &vital,
            monsters: &world.monsters,
            targeting: &world.targeting,
            origin: (0, 0),
            player: (700, 350),
            hp_percent: 100.0,
        };
        let err = controller.acquire(10, &other, &scene, &mut world.input).unwrap_err();
        assert!(matches!(err, HunterError::SessionActive(1)));
        assert_eq!(controller.target(), Some(EntityId(1)));
    }

    #[test]
    fn test_timeout_at_exact_limit() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        world.cycle(&mut controller, 1_000, &[blob(700, 150, 0)], true);

        let events = world.cycle(&mut controller, 10_999, &[blob(700, 150, 0)], true);
        assert!(events.is_empty());
        assert_eq!(controller.state(), EngagementState::Engaging);

        let events = world.cycle(&mut controller, 11_000, &[blob(700, 150, 0)], true);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            HuntEventKind::EngagementTimedOut {
                target: EntityId(1),
                elapsed_ms: 10_000
            }
        );
        assert_eq!(controller.state(), EngagementState::Scanning);
        assert!(controller.session().is_none());
        assert_eq!(world.input.presses(Key::ESCAPE), 1);
    }

    #[test]
    fn test_dead_target_goes_straight_to_looting() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);

        let events = world.cycle(&mut controller, 30, &[blob(702, 150, 0)], false);
        assert_eq!(controller.state(), EngagementState::Looting);
        assert!(matches!(
            events[0].kind,
            HuntEventKind::TargetDefeated {
                target: EntityId(1),
                experience: 500,
                ..
            }
        ));
        assert_eq!(world.stats.total_kills, 1);
        assert_eq!(world.stats.total_experience, 500);
        assert!(!world.tracker.contains(EntityId(1)));
        assert_eq!(controller.target(), None);
        // First loot press happens in the same cycle
        assert_eq!(world.input.presses(Key::X), 1);
    }

    #[test]
    fn test_shifted_clock_extends_engagement() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);

        // Suspended from 5s to 25s
        controller.shift_clock(20_000);
        let events = world.cycle(&mut controller, 25_000, &[blob(700, 150, 0)], true);
        assert!(events.is_empty());
        assert_eq!(controller.state(), EngagementState::Engaging);
        assert_eq!(controller.session().map(|s| s.elapsed(25_000)), Some(5_000));

        let events = world.cycle(&mut controller, 30_000, &[blob(700, 150, 0)], true);
        assert!(matches!(
            events[0].kind,
            HuntEventKind::EngagementTimedOut { elapsed_ms: 10_000, .. }
        ));
    }

    #[test]
    fn test_loot_press_schedule() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);
        world.cycle(&mut controller, 100, &[], false);
        assert_eq!(world.input.presses(Key::X), 1);

        // 500ms after the first press, then every 300ms
        world.cycle(&mut controller, 599, &[], true);
        assert_eq!(world.input.presses(Key::X), 1);
        world.cycle(&mut controller, 600, &[], true);
        assert_eq!(world.input.presses(Key::X), 2);
        world.cycle(&mut controller, 900, &[], true);
        world.cycle(&mut controller, 1_200, &[], true);
        assert_eq!(world.input.presses(Key::X), 4);
        assert_eq!(controller.state(), EngagementState::Looting);

        let events = world.cycle(&mut controller, 1_500, &[], true);
        assert_eq!(events[0].kind, HuntEventKind::Looted { presses: 4 });
        assert_eq!(controller.state(), EngagementState::Scanning);
        assert!(controller.session().is_none());
        assert_eq!(world.stats.items_looted, 1);
    }

    #[test]
    fn test_no_auto_loot_skips_looting() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        controller.set_auto_loot(false);
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);
        world.cycle(&mut controller, 30, &[blob(700, 150, 0)], false);
        assert_eq!(controller.state(), EngagementState::Scanning);
        assert_eq!(world.input.presses(Key::X), 0);
    }

    #[test]
    fn test_lost_target() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);

        world.cycle(&mut controller, 2_000, &[], true);
        assert_eq!(controller.state(), EngagementState::Engaging);

        let events = world.cycle(&mut controller, 2_001, &[], true);
        assert_eq!(events[0].kind, HuntEventKind::TargetLost { target: EntityId(1) });
        assert_eq!(controller.state(), EngagementState::Scanning);
        assert_eq!(world.stats.total_kills, 0);
    }

    #[test]
    fn test_chain_attack_respects_cooldown() {
        let mut world = World::new();
        let config = EngagementConfig {
            auto_skill: false,
            ..EngagementConfig::default()
        };
        let mut controller = EngagementController::new(config, LootConfig::default(), Vec::new());
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);
        assert_eq!(world.input.presses(Key::SPACE), 1);

        world.cycle(&mut controller, 499, &[blob(700, 150, 0)], true);
        assert_eq!(world.input.presses(Key::SPACE), 1);
        world.cycle(&mut controller, 500, &[blob(700, 150, 0)], true);
        assert_eq!(world.input.presses(Key::SPACE), 2);
    }

    #[test]
    fn test_auto_skill_uses_rotation() {
        let mut world = World::new();
        let config = EngagementConfig {
            chain_attack: false,
            ..EngagementConfig::default()
        };
        let skills = vec![Skill::new("Fire", Key::F1, 5_000, 1)];
        let mut controller = EngagementController::new(config, LootConfig::default(), skills);
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);
        world.cycle(&mut controller, 30, &[blob(700, 150, 0)], true);
        world.cycle(&mut controller, 60, &[blob(700, 150, 0)], true);
        assert_eq!(world.input.presses(Key::F1), 1);
    }

    #[test]
    fn test_only_aggressive_filters_candidates() {
        let mut world = World::new();
        world.targeting.only_aggressive = true;
        let mut controller = quiet_controller();
        // Class 3 is the passive neutral monster
        world.cycle(&mut controller, 0, &[blob(700, 150, 3)], true);
        assert_eq!(controller.state(), EngagementState::Scanning);

        world.cycle(&mut controller, 30, &[blob(700, 150, 3), blob(300, 150, 1)], true);
        assert_eq!(controller.session().map(|s| s.class_id), Some(ClassId(1)));
    }

    #[test]
    fn test_waypoint_clicks() {
        let mut world = World::new();
        let config = EngagementConfig {
            auto_skill: false,
            chain_attack: false,
            waypoint_clicks: true,
            ..EngagementConfig::default()
        };
        let mut controller = EngagementController::new(config, LootConfig::default(), Vec::new());
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);

        let clicks = world.input.clicks();
        assert!(clicks.len() > 1);
        assert_eq!(clicks.last(), Some(&(700, 150)));
    }

    #[test]
    fn test_escape_drops_session() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        world.cycle(&mut controller, 0, &[blob(700, 150, 0)], true);

        let event = controller.escape(50, &mut world.input);
        assert_eq!(event.kind, HuntEventKind::Escaped { target: Some(EntityId(1)) });
        assert_eq!(controller.state(), EngagementState::Scanning);
        assert_eq!(world.input.presses(Key::ESCAPE), 1);
    }

    #[test]
    fn test_background_sweep_interval() {
        let mut world = World::new();
        let mut controller = quiet_controller();
        world.cycle(&mut controller, 0, &[], true);
        world.cycle(&mut controller, 1_999, &[], true);
        assert_eq!(world.input.presses(Key::X), 0);
        world.cycle(&mut controller, 2_000, &[], true);
        assert_eq!(world.input.presses(Key::X), 1);
    }
}
