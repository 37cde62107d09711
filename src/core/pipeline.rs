//! One worker cycle: classify, cluster, reconcile, engage

use std::sync::Arc;

use crate::config::BotConfig;
use crate::core::events::{HuntEvent, HuntEventKind};
use crate::core::state::{BotStatus, RunState};
use crate::database::MonsterDatabase;
use crate::engagement::{EngagementController, PlayerStatus, PotionKeeper, PotionKind, Scene};
use crate::input::InputSink;
use crate::stats::SessionStats;
use crate::tracking::{IdentityTracker, ReconcileOutcome};
use crate::vision::{ClusterBuilder, Detection, Frame, FrameBuffers, FrameClassifier, Palette};
use crate::Tick;

/// What one cycle produced
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub detections: Vec<Detection>,
    pub outcome: ReconcileOutcome,
    pub events: Vec<HuntEvent>,
    pub potion: Option<PotionKind>,
}

/// All state owned by the worker between cycles
pub struct Hunt {
    config: BotConfig,
    monsters: MonsterDatabase,
    palette: Palette,
    classifier: FrameClassifier,
    clusters: ClusterBuilder,
    buffers: FrameBuffers,
    tracker: IdentityTracker,
    controller: EngagementController,
    potions: PotionKeeper,
    stats: SessionStats,
    low_health: bool,
    paused_at: Option<Tick>,
}

impl Hunt {
    /// Create a hunt context for one configuration and monster roster
    pub fn new(config: BotConfig, monsters: MonsterDatabase) -> Self {
        let controller = EngagementController::new(
            config.engagement.clone(),
            config.loot.clone(),
            config.skills.clone(),
        );
        Self {
            palette: monsters.palette(),
            classifier: config.scan.classifier(),
            clusters: config.scan.cluster_builder(),
            buffers: FrameBuffers::new(config.scan.width, config.scan.height),
            tracker: IdentityTracker::from_config(&config.tracking),
            potions: PotionKeeper::new(config.potions.clone()),
            stats: SessionStats::new(),
            low_health: false,
            paused_at: None,
            controller,
            monsters,
            config,
        }
    }

    /// Reset counters and start the session clock
    pub fn start(&mut self, now: Tick) {
        self.stats.start(now);
        self.controller.abort();
        self.tracker.clear();
        self.low_health = false;
        self.paused_at = None;
    }

    /// Stop the session clock and drop any open engagement
    pub fn finish(&mut self, now: Tick) {
        self.controller.abort();
        self.stats.end(now);
    }

    /// Apply a reloaded config and monster database.
    ///
    /// Class ids index the database, so a changed roster drops every tracked
    /// entity and the open session. Otherwise both survive.
    pub fn reconfigure(&mut self, config: BotConfig, monsters: MonsterDatabase) {
        if monsters != self.monsters {
            log::info!("Monster roster changed, dropping tracked entities");
            self.controller.abort();
            self.tracker.clear();
        }
        if (config.scan.width, config.scan.height) != (self.config.scan.width, self.config.scan.height) {
            self.buffers = FrameBuffers::new(config.scan.width, config.scan.height);
        }
        self.palette = monsters.palette();
        self.classifier = config.scan.classifier();
        self.clusters = config.scan.cluster_builder();
        self.tracker.configure(&config.tracking);
        self.controller.configure(
            config.engagement.clone(),
            config.loot.clone(),
            config.skills.clone(),
        );
        self.potions.set_config(config.potions.clone());
        self.monsters = monsters;
        self.config = config;
        log::info!(
            "Configuration applied: {} monster classes, policy {}",
            self.palette.len(),
            self.config.targeting.policy
        );
    }

    /// Active configuration
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Active monster roster
    pub fn monsters(&self) -> &MonsterDatabase {
        &self.monsters
    }

    /// Tracked entities
    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    /// Engagement state machine
    pub fn controller(&self) -> &EngagementController {
        &self.controller
    }

    /// Session counters
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Most recent capture
    pub fn current_frame(&self) -> &Arc<Frame> {
        self.buffers.current()
    }

    /// Suspend the hunt. Time until [`Hunt::resume`] does not count
    /// against the open engagement.
    pub fn pause(&mut self, now: Tick) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Continue after [`Hunt::pause`]
    pub fn resume(&mut self, now: Tick) {
        if let Some(since) = self.paused_at.take() {
            self.controller.shift_clock(now.saturating_sub(since));
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Turn auto loot on or off
    pub fn set_auto_loot(&mut self, enabled: bool) {
        self.config.loot.auto_loot = enabled;
        self.controller.set_auto_loot(enabled);
    }

    /// Flip auto loot, returning the new setting
    pub fn toggle_auto_loot(&mut self) -> bool {
        let enabled = !self.config.loot.auto_loot;
        self.set_auto_loot(enabled);
        enabled
    }

    /// Flip the overlay, returning the new setting
    pub fn toggle_overlay(&mut self) -> bool {
        let display = &mut self.config.display;
        display.show_overlay = !display.show_overlay;
        display.show_boxes = display.show_overlay;
        display.show_overlay
    }

    /// Player HP is low enough that the hunt should stop acting
    pub fn is_critical(&self, player: &PlayerStatus) -> bool {
        self.config.safety.pause_on_low_hp && player.hp_percent() < self.config.safety.critical_hp_percent
    }

    /// Process one capture
    pub fn cycle<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        frame: Frame,
        origin: (i32, i32),
        player: &PlayerStatus,
        input: &mut S,
    ) -> CycleReport {
        let potion = self.potions.tick(now, player, input);
        if potion.is_some() {
            self.stats.record_potion();
        }
        let (mut events, escaped) = self.watch_health(now, player, input);

        self.buffers.push(frame);
        let current = self.buffers.current().clone();
        let previous = self.buffers.previous().clone();

        let clusters = self.clusters.centered_on(current.width, current.height);
        let detections = clusters.build(self.classifier.classify(&current, &previous, &self.palette));

        let probe = self.config.liveness.on(&current);
        let outcome = self.tracker.reconcile(now, &detections, &probe);

        let (cx, cy) = current.center();
        let mut scene = Scene {
            tracker: &mut self.tracker,
            outcome: &outcome,
            vital: &probe,
            monsters: &self.monsters,
            targeting: &self.config.targeting,
            origin,
            player: (cx as i32, cy as i32),
            hp_percent: player.hp_percent(),
        };
        if !escaped {
            events.extend(self.controller.step(now, &mut scene, input, &mut self.stats));
        }
        self.stats.update(now);

        CycleReport {
            detections,
            outcome,
            events,
            potion,
        }
    }

    /// Warn once when HP falls below the low threshold and, with
    /// `auto_escape`, break off the open engagement. Returns whether an
    /// escape was pressed.
    fn watch_health<S: InputSink + ?Sized>(
        &mut self,
        now: Tick,
        player: &PlayerStatus,
        input: &mut S,
    ) -> (Vec<HuntEvent>, bool) {
        let hp_percent = player.hp_percent();
        let low = hp_percent < self.config.safety.low_hp_percent;
        if low == self.low_health {
            return (Vec::new(), false);
        }
        self.low_health = low;
        if !low {
            log::info!("Player HP recovered to {:.0}%", hp_percent);
            return (Vec::new(), false);
        }

        log::warn!("Player HP low at {:.0}%", hp_percent);
        let mut events = vec![HuntEvent::new(now, HuntEventKind::LowHealth { hp_percent })];
        if self.controller.session().is_none() {
            return (events, false);
        }
        match self.escape(now, input) {
            Some(event) => {
                events.push(event);
                (events, true)
            }
            None => (events, false),
        }
    }

    /// Emergency escape outside the normal state machine. Does nothing
    /// unless `safety.auto_escape` is set.
    pub fn escape<S: InputSink + ?Sized>(&mut self, now: Tick, input: &mut S) -> Option<HuntEvent> {
        if !self.config.safety.auto_escape {
            log::info!("Escape ignored, auto escape is off");
            return None;
        }
        Some(self.controller.escape(now, input))
    }

    /// Publishable view of the current state
    pub fn status(&self, run_state: RunState) -> BotStatus {
        BotStatus {
            run_state,
            engagement: self.controller.state(),
            target: self.controller.target(),
            tracked: self.tracker.snapshot(),
            stats: self.stats.clone(),
            frames: self.buffers.captured(),
            auto_loot: self.config.loot.auto_loot,
            show_overlay: self.config.display.show_overlay,
        }
    }
}
