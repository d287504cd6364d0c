//! Common types shared between the engine and robot programs.

use serde::{Deserialize, Serialize};

/// Identifier of a robot within one battle.
///
/// Ids are assigned from roster order and stay stable across rounds, so they
/// double as the deterministic iteration order of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RobotId(pub u32);

impl RobotId {
    /// Returns the roster index of this robot.
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Derives a deterministic per-round seed for this robot.
    ///
    /// Robots that want randomness must use this instead of OS entropy so
    /// that replays stay reproducible.
    pub fn derive_seed(&self, battle_seed: u64, round: u32) -> u64 {
        battle_seed
            .wrapping_mul(0x517cc1b727220a95)
            ^ ((self.0 as u64) << 32 | round as u64).wrapping_mul(0x9e3779b97f4a7c15)
    }
}

impl std::fmt::Display for RobotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Read-only copy of a robot's own state at the end of the previous turn.
///
/// Angles are degrees, 0 = north, increasing clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotStatus {
    /// X coordinate of the body center
    pub x: f64,

    /// Y coordinate of the body center
    pub y: f64,

    /// Body heading
    pub heading: f64,

    /// Signed speed along the heading (negative = reversing)
    pub velocity: f64,

    /// Remaining energy
    pub energy: f64,

    /// Absolute gun heading
    pub gun_heading: f64,

    /// Gun heat; the gun can only fire at zero
    pub gun_heat: f64,

    /// Absolute radar heading
    pub radar_heading: f64,
}

/// A robot detected by this robot's radar sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedRobot {
    /// Id of the detected robot
    pub id: RobotId,

    /// Roster name of the detected robot
    pub name: String,

    /// Distance between body centers
    pub distance: f64,

    /// Angle from the scanner's body heading to the detected robot
    pub bearing: f64,

    /// Energy of the detected robot
    pub energy: f64,

    /// Body heading of the detected robot
    pub heading: f64,

    /// Velocity of the detected robot
    pub velocity: f64,
}

/// Capabilities a robot program may ask for.
///
/// Only the first four are ever granted by the engine sandbox; asking for
/// anything else is a violation that bans the robot for the whole battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Plain computation (always granted)
    Compute,

    /// Reading own state and events
    Sensors,

    /// Queuing intents
    Intents,

    /// Writing log lines through the engine
    Logging,

    /// Reading files
    FileRead,

    /// Writing files
    FileWrite,

    /// Opening sockets
    Network,

    /// Spawning threads that outlive the turn
    SpawnThread,

    /// Starting processes
    Process,
}

impl Capability {
    /// The capabilities granted to every sandboxed robot.
    pub const GRANTED: [Capability; 4] = [
        Capability::Compute,
        Capability::Sensors,
        Capability::Intents,
        Capability::Logging,
    ];

    /// Returns the capability name.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Compute => "compute",
            Capability::Sensors => "sensors",
            Capability::Intents => "intents",
            Capability::Logging => "logging",
            Capability::FileRead => "file_read",
            Capability::FileWrite => "file_write",
            Capability::Network => "network",
            Capability::SpawnThread => "spawn_thread",
            Capability::Process => "process",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robot_id_ordering() {
        let mut ids = vec![RobotId(3), RobotId(0), RobotId(2)];
        ids.sort();
        assert_eq!(ids, vec![RobotId(0), RobotId(2), RobotId(3)]);
        assert_eq!(RobotId(2).index(), 2);
        assert_eq!(RobotId(7).to_string(), "#7");
    }

    #[test]
    fn test_derived_seed_deterministic() {
        let a = RobotId(1).derive_seed(42, 0);
        let b = RobotId(1).derive_seed(42, 0);
        assert_eq!(a, b);

        // Different robot or round = different seed
        assert_ne!(a, RobotId(2).derive_seed(42, 0));
        assert_ne!(a, RobotId(1).derive_seed(42, 1));
    }

    #[test]
    fn test_granted_capabilities() {
        assert!(Capability::GRANTED.contains(&Capability::Logging));
        assert!(!Capability::GRANTED.contains(&Capability::Network));
    }
}
