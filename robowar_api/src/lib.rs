//! RoboWar Robot API
//!
//! The only crate a robot program links against. It defines the
//! capability object ([`RobotContext`]) through which untrusted robot code
//! reads its sensors and queues intents, and nothing else.
//!
//! # Core Concept: Capability Scoping
//!
//! Robots never touch engine state. Each turn the engine builds a
//! [`TurnView`] from the resolved previous turn, wraps it in a context with
//! a fuel budget and hands `&mut RobotContext` to [`Robot::run_turn`]:
//! - Sensors (`status()`, `take_events()`) are read-only copies
//! - Intents (`set_velocity()`, `fire()`, ...) only queue values
//! - Every call costs fuel; running dry yields [`Halt::BudgetExhausted`]
//! - Asking for an ungranted [`Capability`] yields [`Halt::Denied`]
//!
//! # Example
//!
//! ```
//! use robowar_api::{Halt, Robot, RobotContext, RobotEvent};
//!
//! struct Gunner;
//!
//! impl Robot for Gunner {
//!     fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
//!         for event in ctx.take_events()? {
//!             if let RobotEvent::ScannedRobot(target) = event {
//!                 let heading = ctx.status()?.heading;
//!                 ctx.set_gun_heading(heading + target.bearing)?;
//!                 ctx.fire(1.0)?;
//!             }
//!         }
//!         let radar = ctx.status()?.radar_heading;
//!         ctx.set_radar_heading(radar + 45.0)
//!     }
//! }
//! ```

mod context;
mod error;
mod event;
mod intent;
mod types;

pub use context::{Budget, Robot, RobotContext, TurnView};
pub use error::Halt;
pub use event::RobotEvent;
pub use intent::Intent;
pub use types::{Capability, RobotId, RobotStatus, ScannedRobot};
