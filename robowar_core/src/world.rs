//! World - one round of a battle.
//!
//! The world owns every Robot Peer and bullet of the round and advances them
//! one turn at a time. It never runs robot code: the scheduler hands it a
//! batch of intents, ordered by `RobotId`, and reads back a [`TurnSnapshot`].

use crate::bullet::Bullet;
use crate::collision::{
    resolve_bullet_collisions, resolve_bullet_hits, resolve_bullets_out, resolve_robot_collisions, resolve_walls,
};
use crate::config::{BattleConfig, SkipPolicy};
use crate::error::EngineError;
use crate::events::{BattleEvent, DeathCause};
use crate::geometry::Vec2;
use crate::peer::{DisableReason, PeerState, RobotPeer};
use crate::physics::{advance_body, cool_gun, try_fire};
use crate::radar::sweep_radars;
use crate::rules::Rules;
use crate::snapshot::{BulletSnapshot, RobotSnapshot, TurnSnapshot};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use robowar_api::{Capability, Intent, RobotEvent, RobotId, TurnView};
use std::collections::BTreeMap;

/// Mixes the battle seed with the round index.
pub fn round_seed(battle_seed: u64, round: u32) -> u64 {
    battle_seed ^ (round as u64).wrapping_mul(0x9e3779b97f4a7c15)
}

/// The state of one round.
#[derive(Debug, Clone)]
pub struct World {
    /// Round index (0-based)
    round: u32,

    /// Last resolved turn (0 = deployment)
    turn: u64,

    /// Turn ceiling
    max_turns: u64,

    width: f64,
    height: f64,
    battle_seed: u64,
    rules: Rules,
    skip_policy: SkipPolicy,
    max_consecutive_skips: u32,

    /// One peer per roster entry, indexed by `RobotId`
    peers: Vec<RobotPeer>,

    /// Bullets in flight
    bullets: Vec<Bullet>,

    next_bullet_id: u64,

    /// Events recorded between turns, emitted with the next snapshot
    pending: Vec<BattleEvent>,

    /// Set once the round-final snapshot was produced
    finished: bool,
}

impl World {
    /// Deploys a round. Robots flagged in `banned` sit the round out.
    ///
    /// Deployment is a pure function of the battle seed and round index:
    /// robots are dropped at jittered centers of shuffled grid cells, so no
    /// two start overlapping.
    pub fn new(round: u32, config: &BattleConfig, banned: &[bool]) -> Result<Self, EngineError> {
        let rules = config.rules.clone();
        let r = rules.robot_radius;
        let cell = 3.0 * r;
        let cols = ((config.arena_width - 2.0 * r) / cell).floor().max(0.0) as usize;
        let rows = ((config.arena_height - 2.0 * r) / cell).floor().max(0.0) as usize;

        let mut rng = ChaCha8Rng::seed_from_u64(round_seed(config.seed, round));
        let mut cells: Vec<usize> = (0..cols * rows).collect();
        cells.shuffle(&mut rng);
        let mut free_cells = cells.into_iter();

        let mut peers = Vec::with_capacity(config.roster.len());
        for (i, entry) in config.roster.iter().enumerate() {
            let id = RobotId(i as u32);
            let is_banned = banned.get(i).copied().unwrap_or(false);

            if is_banned {
                let mut peer = RobotPeer::new(id, entry.name.clone(), entry.mode, Vec2::zeros(), 0.0, 0.0, 0.0);
                peer.state = PeerState::Banned;
                peers.push(peer);
                continue;
            }

            let slot = free_cells.next().ok_or_else(|| {
                EngineError::config(format!("no room to deploy {} robots", config.roster.len()))
            })?;
            let (col, row) = (slot % cols, slot / cols);
            let jitter = 0.4 * r;
            let position = Vec2::new(
                r + cell * (col as f64 + 0.5) + rng.gen_range(-jitter..=jitter),
                r + cell * (row as f64 + 0.5) + rng.gen_range(-jitter..=jitter),
            );
            let heading = rng.gen_range(0.0..360.0);

            let mut peer = RobotPeer::new(
                id,
                entry.name.clone(),
                entry.mode,
                position,
                heading,
                rules.start_energy,
                rules.initial_gun_heat,
            );
            peer.inbox.push(RobotEvent::RoundStarted { round });
            peers.push(peer);
        }

        Ok(Self {
            round,
            turn: 0,
            max_turns: config.max_turns,
            width: config.arena_width,
            height: config.arena_height,
            battle_seed: config.seed,
            rules,
            skip_policy: config.skip_policy,
            max_consecutive_skips: config.limits.max_consecutive_skips,
            peers,
            bullets: Vec::new(),
            next_bullet_id: 0,
            pending: vec![BattleEvent::RoundStarted { round }],
            finished: false,
        })
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Last resolved turn.
    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn peers(&self) -> &[RobotPeer] {
        &self.peers
    }

    pub fn peer(&self, id: RobotId) -> Option<&RobotPeer> {
        self.peers.get(id.index())
    }

    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    /// Robots still in the arena.
    pub fn alive_count(&self) -> usize {
        self.peers.iter().filter(|p| p.is_alive()).count()
    }

    /// True once the round-final snapshot was produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Robots whose code runs on the next turn, in id order.
    pub fn schedulable(&self) -> Vec<RobotId> {
        let next = self.turn + 1;
        self.peers
            .iter()
            .filter(|p| p.is_schedulable(next))
            .map(|p| p.id)
            .collect()
    }

    /// Builds the read-only view a robot sees on the next turn.
    ///
    /// Hands over the robot's pending events; they are delivered once.
    pub fn take_view(&mut self, id: RobotId) -> Option<TurnView> {
        let others = self.alive_count().saturating_sub(1);
        let (width, height, round, turn) = (self.width, self.height, self.round, self.turn + 1);
        let seed = id.derive_seed(self.battle_seed, round);
        let peer = self.peers.get_mut(id.index())?;

        Some(TurnView {
            id,
            round,
            turn,
            arena_width: width,
            arena_height: height,
            others,
            status: peer.status(),
            events: std::mem::take(&mut peer.inbox),
            seed,
        })
    }

    /// State at the last resolved turn, without events.
    pub fn snapshot(&self) -> TurnSnapshot {
        self.build_snapshot(Vec::new(), self.finished)
    }

    // ========================================================================
    // ROBOT OUTCOMES (recorded between turns)
    // ========================================================================

    /// Records that a robot's next turn was skipped.
    pub fn record_skip(&mut self, id: RobotId) {
        let turn = self.turn + 1;
        let (policy, threshold) = (self.skip_policy, self.max_consecutive_skips);
        let Some(peer) = self.peers.get_mut(id.index()) else {
            return;
        };
        if !peer.is_alive() {
            return;
        }

        let exhausted = peer.record_skip(turn, policy, threshold);
        self.pending.push(BattleEvent::TurnSkipped { robot: id });
        if exhausted {
            self.disable(id, DisableReason::SkippedTurns);
        }
    }

    /// Takes a robot out of the round.
    pub fn disable(&mut self, id: RobotId, reason: DisableReason) {
        if self.retire(id, PeerState::Disabled(reason)) {
            self.pending.push(BattleEvent::RobotDisabled { robot: id, reason });
        }
    }

    /// Takes a robot out of the battle for a capability violation.
    pub fn ban(&mut self, id: RobotId, capability: Capability) {
        if self.retire(id, PeerState::Banned) {
            self.pending.push(BattleEvent::RobotBanned {
                robot: id,
                capability: capability.name().to_string(),
            });
        }
    }

    fn retire(&mut self, id: RobotId, state: PeerState) -> bool {
        match self.peers.get_mut(id.index()) {
            Some(peer) if peer.is_alive() => peer.retire(state),
            _ => return false,
        }
        self.announce_death(id);
        true
    }

    fn announce_death(&mut self, id: RobotId) {
        for peer in self.peers.iter_mut().filter(|p| p.is_alive() && p.id != id) {
            peer.inbox.push(RobotEvent::RobotDeath { id });
        }
    }

    // ========================================================================
    // TURN RESOLUTION
    // ========================================================================

    /// Resolves one turn from a batch of intents.
    ///
    /// Robots without an intent (asleep, skipped) keep their standing orders.
    pub fn step(&mut self, intents: &BTreeMap<RobotId, Intent>) -> Result<TurnSnapshot, EngineError> {
        if self.finished {
            return Err(EngineError::InvariantViolation {
                round: self.round,
                turn: self.turn,
                detail: "step after round end".into(),
            });
        }

        self.turn += 1;
        let turn = self.turn;
        let mut events = std::mem::take(&mut self.pending);

        for peer in self.peers.iter_mut() {
            peer.wake_if_due(turn);
        }
        for (id, intent) in intents {
            if let Some(peer) = self.peers.get_mut(id.index()) {
                if peer.is_alive() {
                    peer.apply_intent(intent, turn);
                }
            }
        }

        // Guns fire from turn-start positions
        for peer in self.peers.iter_mut().filter(|p| p.is_alive()) {
            cool_gun(peer, &self.rules);
            if let Some(bullet) = try_fire(peer, &self.rules, self.next_bullet_id) {
                self.next_bullet_id += 1;
                events.push(BattleEvent::BulletFired {
                    bullet: bullet.id,
                    owner: bullet.owner,
                    power: bullet.power,
                });
                self.bullets.push(bullet);
            }
        }

        for peer in self.peers.iter_mut().filter(|p| p.is_alive()) {
            advance_body(peer, &self.rules);
        }

        events.extend(resolve_walls(&mut self.peers, &self.rules, self.width, self.height));
        events.extend(resolve_robot_collisions(&mut self.peers, &self.rules));

        for bullet in self.bullets.iter_mut() {
            bullet.advance();
        }
        events.extend(resolve_bullet_hits(&mut self.peers, &mut self.bullets, &self.rules));
        events.extend(resolve_bullet_collisions(&mut self.peers, &mut self.bullets));
        events.extend(resolve_bullets_out(&mut self.peers, &mut self.bullets, self.width, self.height));
        self.bullets.retain(|b| b.alive);

        self.resolve_deaths(&mut events);
        events.extend(sweep_radars(&mut self.peers, &self.rules));

        self.check_invariants()?;

        let alive: Vec<RobotId> = self.peers.iter().filter(|p| p.is_alive()).map(|p| p.id).collect();
        if alive.len() <= 1 || turn >= self.max_turns {
            events.push(BattleEvent::RoundEnded {
                round: self.round,
                winner: if alive.len() == 1 { Some(alive[0]) } else { None },
                stalemate: alive.len() > 1,
            });
            self.finished = true;
        }

        Ok(self.build_snapshot(events, self.finished))
    }

    /// Retires robots whose energy ran out this turn.
    fn resolve_deaths(&mut self, events: &mut Vec<BattleEvent>) {
        let dead: Vec<RobotId> = self
            .peers
            .iter()
            .filter(|p| p.is_alive() && p.energy <= 0.0)
            .map(|p| p.id)
            .collect();

        for id in dead {
            let cause = death_cause(id, events);
            if self.retire(id, PeerState::Dead) {
                events.push(BattleEvent::RobotDied { robot: id, cause });
            }
        }
    }

    /// Verifies the physical invariants after a step.
    pub fn check_invariants(&self) -> Result<(), EngineError> {
        let r = self.rules.robot_radius;
        let eps = 1e-9;
        let violation = |detail: String| EngineError::InvariantViolation {
            round: self.round,
            turn: self.turn,
            detail,
        };

        for p in &self.peers {
            if !p.energy.is_finite() || p.energy < 0.0 {
                return Err(violation(format!("{} has energy {}", p.id, p.energy)));
            }
            if !p.is_alive() {
                continue;
            }
            let values = [p.position.x, p.position.y, p.heading, p.velocity, p.gun_heading, p.radar_heading, p.gun_heat];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(violation(format!("{} has a non-finite state", p.id)));
            }
            if p.gun_heat < 0.0 {
                return Err(violation(format!("{} has gun heat {}", p.id, p.gun_heat)));
            }
            let x_ok = p.position.x >= r - eps && p.position.x <= self.width - r + eps;
            let y_ok = p.position.y >= r - eps && p.position.y <= self.height - r + eps;
            if !(x_ok && y_ok) {
                return Err(violation(format!(
                    "{} out of bounds at ({:.3}, {:.3})",
                    p.id, p.position.x, p.position.y
                )));
            }
        }

        for b in &self.bullets {
            if b.power < self.rules.min_bullet_power || b.power > self.rules.max_bullet_power {
                return Err(violation(format!("bullet {} has power {}", b.id, b.power)));
            }
        }

        Ok(())
    }

    fn build_snapshot(&self, events: Vec<BattleEvent>, round_final: bool) -> TurnSnapshot {
        TurnSnapshot {
            round: self.round,
            turn: self.turn,
            robots: self.peers.iter().map(RobotSnapshot::from).collect(),
            bullets: self.bullets.iter().map(BulletSnapshot::from).collect(),
            events,
            round_final,
        }
    }
}

/// Blames the last damaging event of the turn for a robot's death.
fn death_cause(id: RobotId, events: &[BattleEvent]) -> DeathCause {
    for event in events.iter().rev() {
        match *event {
            BattleEvent::BulletHit { owner, victim, .. } if victim == id => {
                return DeathCause::Bullet { shooter: owner };
            }
            BattleEvent::RobotsCollided {
                a,
                b,
                a_at_fault,
                b_at_fault,
                ..
            } if a == id || b == id => {
                let rammer = if a == id {
                    b_at_fault.then_some(b)
                } else {
                    a_at_fault.then_some(a)
                };
                return DeathCause::Ram { rammer };
            }
            BattleEvent::HitWall { robot, .. } if robot == id => return DeathCause::Wall,
            _ => {}
        }
    }
    DeathCause::Wall
}
