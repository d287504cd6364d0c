//! Robot Peer: one robot's engine-side state.
//!
//! The peer is owned by the [`World`](crate::World) and mutated only while a
//! turn is being resolved. Robot code never sees it; it gets a
//! [`RobotStatus`] copy through its context.

use crate::config::{RobotMode, SkipPolicy};
use crate::geometry::{normalize_absolute, Vec2};
use robowar_api::{Intent, RobotEvent, RobotId, RobotStatus};
use serde::{Deserialize, Serialize};

/// Why a robot was disabled for the rest of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisableReason {
    /// Panicked or returned a fault
    Fault,

    /// Missed too many consecutive turns
    SkippedTurns,

    /// Worker from an earlier round never stopped
    Unresponsive,
}

/// Lifecycle of a peer within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
    /// Scheduled every turn
    Active,

    /// Not scheduled until `until_turn`; standing orders still apply
    Sleeping { until_turn: u64 },

    /// Out of the round, not a violation
    Disabled(DisableReason),

    /// Energy reached zero
    Dead,

    /// Capability violation; out for the whole battle
    Banned,
}

/// Persistent orders applied every turn until changed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StandingOrders {
    /// Target velocity
    pub velocity: f64,

    /// Requested body turn rate
    pub turn_rate: f64,

    /// Gun target heading, cleared once reached
    pub gun_target: Option<f64>,

    /// Radar target heading, cleared once reached
    pub radar_target: Option<f64>,
}

/// A robot's engine-side state.
#[derive(Debug, Clone)]
pub struct RobotPeer {
    /// Robot id
    pub id: RobotId,

    /// Roster name
    pub name: String,

    /// Gun/radar coupling
    pub mode: RobotMode,

    /// Body center
    pub position: Vec2,

    /// Body center at turn start
    pub prev_position: Vec2,

    /// Body heading
    pub heading: f64,

    /// Signed speed along heading
    pub velocity: f64,

    /// Body rotation applied in the last resolved turn
    pub turn_applied: f64,

    /// Energy, never negative
    pub energy: f64,

    /// Absolute gun heading
    pub gun_heading: f64,

    /// Gun heat
    pub gun_heat: f64,

    /// Absolute radar heading
    pub radar_heading: f64,

    /// Radar heading at turn start
    pub prev_radar_heading: f64,

    /// Lifecycle state
    pub state: PeerState,

    /// Skipped turns this round (never decreases within a round)
    pub skipped_turns: u32,

    /// Skipped turns in a row
    pub consecutive_skips: u32,

    /// Standing orders
    pub orders: StandingOrders,

    /// One-shot fire request for the turn being resolved
    pub fire_request: Option<f64>,

    /// One-shot scan request for the turn being resolved
    pub scan_request: bool,

    /// Events to deliver at the robot's next turn
    pub inbox: Vec<RobotEvent>,
}

impl RobotPeer {
    /// Creates a freshly deployed peer.
    pub fn new(
        id: RobotId,
        name: impl Into<String>,
        mode: RobotMode,
        position: Vec2,
        heading: f64,
        energy: f64,
        gun_heat: f64,
    ) -> Self {
        let heading = normalize_absolute(heading);
        Self {
            id,
            name: name.into(),
            mode,
            position,
            prev_position: position,
            heading,
            velocity: 0.0,
            turn_applied: 0.0,
            energy,
            gun_heading: heading,
            gun_heat,
            radar_heading: heading,
            prev_radar_heading: heading,
            state: PeerState::Active,
            skipped_turns: 0,
            consecutive_skips: 0,
            orders: StandingOrders::default(),
            fire_request: None,
            scan_request: false,
            inbox: Vec::new(),
        }
    }

    /// Whether the robot is still in the arena.
    pub fn is_alive(&self) -> bool {
        matches!(self.state, PeerState::Active | PeerState::Sleeping { .. })
    }

    /// Whether the robot's code runs on `turn`.
    pub fn is_schedulable(&self, turn: u64) -> bool {
        match self.state {
            PeerState::Active => true,
            PeerState::Sleeping { until_turn } => turn >= until_turn,
            _ => false,
        }
    }

    /// Wakes a sleeping robot whose nap is over.
    pub fn wake_if_due(&mut self, turn: u64) {
        if let PeerState::Sleeping { until_turn } = self.state {
            if turn >= until_turn {
                self.state = PeerState::Active;
            }
        }
    }

    /// Applies a completed turn's intent for `turn`.
    pub fn apply_intent(&mut self, intent: &Intent, turn: u64) {
        if let Some(v) = intent.velocity {
            self.orders.velocity = v;
        }
        if let Some(t) = intent.turn_rate {
            self.orders.turn_rate = t;
        }
        if let Some(g) = intent.gun_heading {
            self.orders.gun_target = Some(normalize_absolute(g));
        }
        if let Some(r) = intent.radar_heading {
            self.orders.radar_target = Some(normalize_absolute(r));
        }
        self.fire_request = intent.fire;
        self.scan_request = intent.scan;

        if let Some(turns) = intent.sleep {
            if turns > 0 && self.state == PeerState::Active {
                self.state = PeerState::Sleeping {
                    until_turn: turn + turns as u64 + 1,
                };
            }
        }

        self.consecutive_skips = 0;
    }

    /// Records a skipped turn. Returns true if the robot must be disabled.
    pub fn record_skip(&mut self, turn: u64, policy: SkipPolicy, threshold: u32) -> bool {
        self.skipped_turns += 1;
        self.consecutive_skips += 1;
        self.fire_request = None;
        self.scan_request = false;

        if policy == SkipPolicy::Hold {
            self.orders = StandingOrders::default();
        }

        self.inbox.push(RobotEvent::SkippedTurn { turn });
        self.consecutive_skips >= threshold
    }

    /// Removes the robot from the round.
    pub fn retire(&mut self, state: PeerState) {
        self.state = state;
        self.velocity = 0.0;
        self.orders = StandingOrders::default();
        self.fire_request = None;
        self.scan_request = false;
    }

    /// Subtracts energy, never below zero. Returns the amount removed.
    pub fn drain(&mut self, amount: f64) -> f64 {
        let taken = amount.max(0.0).min(self.energy);
        self.energy -= taken;
        taken
    }

    /// Copy of the state visible to the robot itself.
    pub fn status(&self) -> RobotStatus {
        RobotStatus {
            x: self.position.x,
            y: self.position.y,
            heading: self.heading,
            velocity: self.velocity,
            energy: self.energy,
            gun_heading: self.gun_heading,
            gun_heat: self.gun_heat,
            radar_heading: self.radar_heading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> RobotPeer {
        RobotPeer::new(
            RobotId(0),
            "test",
            RobotMode::default(),
            Vec2::new(100.0, 100.0),
            90.0,
            100.0,
            0.0,
        )
    }

    #[test]
    fn test_intent_sets_standing_orders() {
        let mut p = peer();
        let intent = Intent {
            velocity: Some(5.0),
            gun_heading: Some(-90.0),
            fire: Some(1.0),
            ..Default::default()
        };
        p.apply_intent(&intent, 1);

        assert_eq!(p.orders.velocity, 5.0);
        assert_eq!(p.orders.gun_target, Some(270.0));
        assert_eq!(p.fire_request, Some(1.0));

        // An empty intent keeps orders but clears one-shots
        p.apply_intent(&Intent::default(), 2);
        assert_eq!(p.orders.velocity, 5.0);
        assert_eq!(p.fire_request, None);
    }

    #[test]
    fn test_sleep_and_wake() {
        let mut p = peer();
        p.apply_intent(&Intent { sleep: Some(3), ..Default::default() }, 10);

        assert!(p.is_alive());
        assert!(!p.is_schedulable(11));
        assert!(!p.is_schedulable(13));
        assert!(p.is_schedulable(14));

        p.wake_if_due(14);
        assert_eq!(p.state, PeerState::Active);
    }

    #[test]
    fn test_skip_counters() {
        let mut p = peer();
        p.orders.velocity = 8.0;

        assert!(!p.record_skip(1, SkipPolicy::RepeatLast, 3));
        assert_eq!(p.orders.velocity, 8.0);
        assert!(!p.record_skip(2, SkipPolicy::Hold, 3));
        assert_eq!(p.orders.velocity, 0.0);

        // A completed turn resets the streak, not the round total
        p.apply_intent(&Intent::default(), 3);
        assert_eq!(p.consecutive_skips, 0);
        assert_eq!(p.skipped_turns, 2);

        assert!(!p.record_skip(4, SkipPolicy::Hold, 3));
        assert!(!p.record_skip(5, SkipPolicy::Hold, 3));
        assert!(p.record_skip(6, SkipPolicy::Hold, 3));
        assert_eq!(p.skipped_turns, 5);
    }

    #[test]
    fn test_drain_never_negative() {
        let mut p = peer();
        assert_eq!(p.drain(30.0), 30.0);
        assert_eq!(p.drain(100.0), 70.0);
        assert_eq!(p.energy, 0.0);
        assert_eq!(p.drain(-5.0), 0.0);
    }

    #[test]
    fn test_retired_robot_is_not_alive() {
        let mut p = peer();
        p.retire(PeerState::Disabled(DisableReason::Fault));
        assert!(!p.is_alive());
        assert!(!p.is_schedulable(1));
    }
}
