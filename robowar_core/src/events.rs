//! Battle-level events recorded in turn snapshots.

use crate::peer::DisableReason;
use robowar_api::RobotId;
use serde::{Deserialize, Serialize};

/// What eliminated a robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Killed by a bullet
    Bullet { shooter: RobotId },

    /// Killed in a collision; `rammer` is the robot that drove into it
    Ram { rammer: Option<RobotId> },

    /// Drove into a wall with its last energy
    Wall,
}

/// Something that happened during a turn, as seen by external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BattleEvent {
    /// Round deployment finished
    RoundStarted { round: u32 },

    /// A fire intent was accepted
    BulletFired {
        bullet: u64,
        owner: RobotId,
        power: f64,
    },

    /// A bullet hit a robot
    BulletHit {
        bullet: u64,
        owner: RobotId,
        victim: RobotId,
        damage: f64,
    },

    /// A bullet left the arena
    BulletMissed { bullet: u64, owner: RobotId },

    /// Two bullets destroyed each other
    BulletHitBullet { bullet: u64, other: u64 },

    /// A robot drove into a wall
    HitWall { robot: RobotId, damage: f64 },

    /// Two robots collided; each `*_at_fault` flag marks a rammer
    RobotsCollided {
        a: RobotId,
        b: RobotId,
        a_at_fault: bool,
        b_at_fault: bool,
        damage: f64,
    },

    /// A radar sweep detected a robot
    RobotScanned { scanner: RobotId, target: RobotId },

    /// A robot's energy reached zero
    RobotDied { robot: RobotId, cause: DeathCause },

    /// A robot's turn was skipped (budget or deadline)
    TurnSkipped { robot: RobotId },

    /// A robot was taken out of the round without dying
    RobotDisabled { robot: RobotId, reason: DisableReason },

    /// A robot violated the sandbox and is out for the battle
    RobotBanned { robot: RobotId, capability: String },

    /// The round is over
    RoundEnded {
        round: u32,
        winner: Option<RobotId>,
        stalemate: bool,
    },
}

impl BattleEvent {
    /// The robot eliminated by this event, if any.
    pub fn eliminated(&self) -> Option<RobotId> {
        match self {
            BattleEvent::RobotDied { robot, .. }
            | BattleEvent::RobotDisabled { robot, .. }
            | BattleEvent::RobotBanned { robot, .. } => Some(*robot),
            _ => None,
        }
    }
}
