//! RoboWar Sim - sandboxed execution and battle orchestration
//!
//! This crate runs untrusted robot programs against the pure engine in
//! `robowar_core`.
//!
//! # Turn Pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Battle                             │
//! │   RoundStarting ──► RoundRunning ──► RoundEnding ──► ...     │
//! │                          │                                   │
//! │                   ┌──────▼───────┐                           │
//! │                   │TurnScheduler │  barrier + watchdog       │
//! │                   └──────┬───────┘                           │
//! │        ┌─────────────────┼─────────────────┐                 │
//! │   ┌────▼────┐       ┌────▼────┐       ┌────▼────┐            │
//! │   │ Sandbox │       │ Sandbox │       │ Sandbox │  one thread│
//! │   │ robot 0 │       │ robot 1 │       │ robot 2 │  per robot │
//! │   └────┬────┘       └────┬────┘       └────┬────┘            │
//! │        └──── intents ────┼──── (RobotId order) ─┘            │
//! │                   ┌──────▼───────┐                           │
//! │                   │ World::step  │  physics, collisions      │
//! │                   └──────┬───────┘                           │
//! │                   TurnSnapshot ──► scoring, SnapshotSinks    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use robowar_core::BattleConfig;
//! use robowar_sim::{Battle, ReplayRecorder};
//!
//! let config = BattleConfig::with_robots(["tracker", "spinner"]).with_rounds(3);
//! let recorder = ReplayRecorder::new(&config);
//! let mut battle = Battle::with_bots(config)?.with_sink(recorder.clone());
//! let results = battle.run()?;
//! recorder.finalize(&results);
//! recorder.write_to_file("battle.json")?;
//! # Ok::<(), robowar_core::EngineError>(())
//! ```

pub mod battle;
pub mod bots;
pub mod exporter;
pub mod sandbox;
pub mod scheduler;

pub use battle::{Battle, BattlePhase, CancelToken};
pub use bots::BotKind;
pub use exporter::{Replay, ReplayRecorder, SnapshotSink, VecSink};
pub use sandbox::{factory, RobotFactory, Sandbox, SandboxError, TurnOutcome};
pub use scheduler::{TurnReport, TurnScheduler};
