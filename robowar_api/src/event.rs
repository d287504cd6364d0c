//! Events delivered to a robot at the start of its turn.

use crate::types::{RobotId, ScannedRobot};
use serde::{Deserialize, Serialize};

/// Something that happened to (or was seen by) a robot during the previous
/// turn. Delivered once, in the order the engine produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RobotEvent {
    /// A new round began
    RoundStarted { round: u32 },

    /// The radar swept over another robot
    ScannedRobot(ScannedRobot),

    /// One of our bullets hit a robot
    BulletHit {
        bullet: u64,
        victim: RobotId,
        damage: f64,
        victim_energy: f64,
    },

    /// One of our bullets left the arena
    BulletMissed { bullet: u64 },

    /// One of our bullets collided with another bullet
    BulletHitBullet { bullet: u64, other: u64 },

    /// We were hit by a bullet
    HitByBullet {
        bullet: u64,
        shooter: RobotId,
        power: f64,
        damage: f64,
    },

    /// We drove into a wall
    HitWall { damage: f64 },

    /// We collided with another robot; `at_fault` is true when we moved into it
    HitRobot {
        other: RobotId,
        at_fault: bool,
        damage: f64,
    },

    /// Another robot was eliminated
    RobotDeath { id: RobotId },

    /// Our previous turn did not finish in time and was skipped
    SkippedTurn { turn: u64 },
}
