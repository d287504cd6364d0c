//! RoboWar Core - deterministic robot battle engine
//!
//! Everything that decides what happens in the arena lives here, free of
//! threads, clocks and I/O:
//! 1. **Physics**: coupled turn/speed limits, gun heat, firing
//! 2. **Collisions**: walls, robot pairs, swept bullet paths, crossing bullets
//! 3. **Scoring**: survival, damage and kill bonuses, placements
//!
//! A [`World`] is one round. It is stepped with a batch of robot intents and
//! answers with a [`TurnSnapshot`]; running robot code is the caller's job.

pub mod bullet;
pub mod collision;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod peer;
pub mod physics;
pub mod radar;
pub mod rules;
pub mod scoring;
pub mod snapshot;
pub mod world;

// Re-export key types for convenience
pub use config::{BattleConfig, RobotMode, RosterEntry, SandboxLimits, SkipPolicy};
pub use error::EngineError;
pub use events::{BattleEvent, DeathCause};
pub use peer::{DisableReason, PeerState, RobotPeer};
pub use rules::Rules;
pub use scoring::{placement_string, BattleResults, RobotResult, RoundScore, RoundScoring, ScoreBoard, ScoreComponents};
pub use snapshot::{BulletSnapshot, RobotSnapshot, TurnSnapshot};
pub use world::World;
