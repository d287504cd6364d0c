//! Turn Snapshots: the resolved world state handed to observers.

use crate::bullet::Bullet;
use crate::events::BattleEvent;
use crate::peer::{PeerState, RobotPeer};
use robowar_api::RobotId;
use serde::{Deserialize, Serialize};

/// One robot at the end of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSnapshot {
    pub id: RobotId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub velocity: f64,
    pub energy: f64,
    pub gun_heading: f64,
    pub gun_heat: f64,
    pub radar_heading: f64,
    pub state: PeerState,
    pub skipped_turns: u32,
}

impl From<&RobotPeer> for RobotSnapshot {
    fn from(peer: &RobotPeer) -> Self {
        Self {
            id: peer.id,
            name: peer.name.clone(),
            x: peer.position.x,
            y: peer.position.y,
            heading: peer.heading,
            velocity: peer.velocity,
            energy: peer.energy,
            gun_heading: peer.gun_heading,
            gun_heat: peer.gun_heat,
            radar_heading: peer.radar_heading,
            state: peer.state,
            skipped_turns: peer.skipped_turns,
        }
    }
}

/// One bullet in flight at the end of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub id: u64,
    pub owner: RobotId,
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub power: f64,
}

impl From<&Bullet> for BulletSnapshot {
    fn from(bullet: &Bullet) -> Self {
        Self {
            id: bullet.id,
            owner: bullet.owner,
            x: bullet.end.x,
            y: bullet.end.y,
            heading: bullet.heading,
            power: bullet.power,
        }
    }
}

/// Immutable, fully-resolved state at the end of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Round index (0-based)
    pub round: u32,

    /// Turn number within the round (0 = deployment)
    pub turn: u64,

    /// Every robot of the roster, in id order
    pub robots: Vec<RobotSnapshot>,

    /// Bullets still flying
    pub bullets: Vec<BulletSnapshot>,

    /// Events generated this turn, in resolution order
    pub events: Vec<BattleEvent>,

    /// Set on the last snapshot of a round
    pub round_final: bool,
}

impl TurnSnapshot {
    /// Looks up a robot by id.
    pub fn robot(&self, id: RobotId) -> Option<&RobotSnapshot> {
        self.robots.get(id.index())
    }

    /// Robots still in the arena.
    pub fn alive(&self) -> impl Iterator<Item = &RobotSnapshot> {
        self.robots
            .iter()
            .filter(|r| matches!(r.state, PeerState::Active | PeerState::Sleeping { .. }))
    }
}
