//! The capability object handed to robot code each turn.

use crate::error::Halt;
use crate::event::RobotEvent;
use crate::intent::Intent;
use crate::types::{Capability, RobotId, RobotStatus};
use serde::{Deserialize, Serialize};

/// A robot program.
///
/// The engine calls [`Robot::run_turn`] once per scheduled turn on the
/// robot's own worker thread. The context is the only door to the world:
/// robots read their sensors and queue intents through it, nothing else.
///
/// # Example
///
/// ```
/// use robowar_api::{Halt, Robot, RobotContext};
///
/// struct Circler;
///
/// impl Robot for Circler {
///     fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
///         ctx.set_velocity(5.0)?;
///         ctx.set_turn_rate(10.0)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Robot: Send + 'static {
    /// Runs one turn. Returning `Err` ends the turn early with that reason.
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt>;
}

/// Everything a robot may observe at the start of a turn.
///
/// Built by the engine from the fully resolved previous turn, so no robot
/// ever sees another robot's same-turn intents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnView {
    /// The robot's own id
    pub id: RobotId,

    /// Round number (0-based)
    pub round: u32,

    /// Turn number about to be resolved (1-based)
    pub turn: u64,

    /// Arena width
    pub arena_width: f64,

    /// Arena height
    pub arena_height: f64,

    /// Number of opponents still in the round
    pub others: usize,

    /// Own state at the end of the previous turn
    pub status: RobotStatus,

    /// Events since the previous turn
    pub events: Vec<RobotEvent>,

    /// Deterministic seed for this robot and round
    pub seed: u64,
}

/// Per-turn compute budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Fuel units available this turn
    pub fuel: u64,

    /// Fuel charged for every context call
    pub call_cost: u64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            fuel: 10_000,
            call_cost: 1,
        }
    }
}

/// Capability-scoped view of the engine for one robot and one turn.
///
/// Every call charges fuel. Once fuel is gone every call returns
/// [`Halt::BudgetExhausted`], which robot code propagates with `?`.
pub struct RobotContext {
    view: TurnView,
    intent: Intent,
    fuel: u64,
    call_cost: u64,
    spent: u64,
    log: Vec<String>,
}

impl RobotContext {
    /// Creates a context for one turn.
    pub fn new(view: TurnView, budget: Budget) -> Self {
        Self {
            view,
            intent: Intent::default(),
            fuel: budget.fuel,
            call_cost: budget.call_cost,
            spent: 0,
            log: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Budget
    // ------------------------------------------------------------------

    /// Charges `units` of fuel for the robot's own computation.
    pub fn spend(&mut self, units: u64) -> Result<(), Halt> {
        if units > self.fuel {
            self.spent += self.fuel;
            self.fuel = 0;
            return Err(Halt::BudgetExhausted);
        }
        self.fuel -= units;
        self.spent += units;
        Ok(())
    }

    /// Remaining fuel this turn.
    pub fn fuel(&self) -> u64 {
        self.fuel
    }

    fn charge(&mut self) -> Result<(), Halt> {
        if self.fuel == 0 {
            return Err(Halt::BudgetExhausted);
        }
        let cost = self.call_cost;
        self.spend(cost)
    }

    /// Asks for a capability. Anything outside [`Capability::GRANTED`] is a
    /// violation.
    ///
    /// Robots are Rust code compiled into the engine and run in-process, so
    /// this is a declaration check, not an OS-level sandbox. Only requests
    /// made here are seen; code that opens a socket directly bypasses it.
    pub fn request(&mut self, capability: Capability) -> Result<(), Halt> {
        self.charge()?;
        if Capability::GRANTED.contains(&capability) {
            Ok(())
        } else {
            Err(Halt::Denied(capability))
        }
    }

    // ------------------------------------------------------------------
    // Sensors
    // ------------------------------------------------------------------

    /// Own id.
    pub fn id(&self) -> RobotId {
        self.view.id
    }

    /// Current round.
    pub fn round(&self) -> u32 {
        self.view.round
    }

    /// Turn about to be resolved.
    pub fn turn(&self) -> u64 {
        self.view.turn
    }

    /// Arena size as (width, height).
    pub fn arena(&self) -> (f64, f64) {
        (self.view.arena_width, self.view.arena_height)
    }

    /// Deterministic seed for this robot and round.
    pub fn seed(&self) -> u64 {
        self.view.seed
    }

    /// Own state at the end of the previous turn.
    pub fn status(&mut self) -> Result<RobotStatus, Halt> {
        self.charge()?;
        Ok(self.view.status)
    }

    /// Number of opponents still in the round.
    pub fn others(&mut self) -> Result<usize, Halt> {
        self.charge()?;
        Ok(self.view.others)
    }

    /// Takes the events delivered this turn. A second call returns nothing.
    pub fn take_events(&mut self) -> Result<Vec<RobotEvent>, Halt> {
        self.charge()?;
        Ok(std::mem::take(&mut self.view.events))
    }

    // ------------------------------------------------------------------
    // Intents (last write wins)
    // ------------------------------------------------------------------

    /// Sets the target velocity.
    pub fn set_velocity(&mut self, velocity: f64) -> Result<(), Halt> {
        self.charge()?;
        if !velocity.is_finite() {
            return Err(Halt::non_finite("set_velocity"));
        }
        self.intent.velocity = Some(velocity);
        Ok(())
    }

    /// Sets the body turn rate in degrees per turn.
    pub fn set_turn_rate(&mut self, degrees: f64) -> Result<(), Halt> {
        self.charge()?;
        if !degrees.is_finite() {
            return Err(Halt::non_finite("set_turn_rate"));
        }
        self.intent.turn_rate = Some(degrees);
        Ok(())
    }

    /// Sets the absolute heading the gun should turn to.
    pub fn set_gun_heading(&mut self, degrees: f64) -> Result<(), Halt> {
        self.charge()?;
        if !degrees.is_finite() {
            return Err(Halt::non_finite("set_gun_heading"));
        }
        self.intent.gun_heading = Some(degrees);
        Ok(())
    }

    /// Sets the absolute heading the radar should turn to.
    pub fn set_radar_heading(&mut self, degrees: f64) -> Result<(), Halt> {
        self.charge()?;
        if !degrees.is_finite() {
            return Err(Halt::non_finite("set_radar_heading"));
        }
        self.intent.radar_heading = Some(degrees);
        Ok(())
    }

    /// Fires a bullet at the turn boundary if the gun is cool.
    pub fn fire(&mut self, power: f64) -> Result<(), Halt> {
        self.charge()?;
        if !power.is_finite() {
            return Err(Halt::non_finite("fire"));
        }
        self.intent.fire = Some(power);
        Ok(())
    }

    /// Forces a radar scan this turn.
    pub fn scan(&mut self) -> Result<(), Halt> {
        self.charge()?;
        self.intent.scan = true;
        Ok(())
    }

    /// Skips scheduling for `turns` turns; standing orders keep applying.
    pub fn sleep(&mut self, turns: u32) -> Result<(), Halt> {
        self.charge()?;
        self.intent.sleep = Some(turns);
        Ok(())
    }

    /// Writes a log line through the engine.
    pub fn log(&mut self, message: impl Into<String>) -> Result<(), Halt> {
        self.request(Capability::Logging)?;
        self.log.push(message.into());
        Ok(())
    }

    /// Peeks at the queued intent.
    pub fn intent(&self) -> &Intent {
        &self.intent
    }

    /// Consumes the context, returning (intent, log lines, fuel spent).
    pub fn into_parts(self) -> (Intent, Vec<String>, u64) {
        (self.intent, self.log, self.spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> TurnView {
        TurnView {
            id: RobotId(0),
            round: 0,
            turn: 1,
            arena_width: 800.0,
            arena_height: 600.0,
            others: 1,
            status: RobotStatus::default(),
            events: vec![RobotEvent::RoundStarted { round: 0 }],
            seed: 7,
        }
    }

    #[test]
    fn test_last_write_wins() {
        let mut ctx = RobotContext::new(view(), Budget::default());
        ctx.set_velocity(3.0).unwrap();
        ctx.set_velocity(-2.0).unwrap();
        ctx.fire(1.0).unwrap();
        ctx.fire(2.5).unwrap();

        let (intent, _, spent) = ctx.into_parts();
        assert_eq!(intent.velocity, Some(-2.0));
        assert_eq!(intent.fire, Some(2.5));
        assert_eq!(spent, 4);
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut ctx = RobotContext::new(view(), Budget { fuel: 3, call_cost: 1 });
        assert!(ctx.scan().is_ok());
        assert!(ctx.spend(2).is_ok());
        assert_eq!(ctx.fuel(), 0);
        assert_eq!(ctx.set_velocity(1.0), Err(Halt::BudgetExhausted));
        assert_eq!(ctx.spend(1), Err(Halt::BudgetExhausted));

        // The rejected call was never queued
        assert_eq!(ctx.intent().velocity, None);
    }

    #[test]
    fn test_overspend_drains_fuel() {
        let mut ctx = RobotContext::new(view(), Budget { fuel: 5, call_cost: 1 });
        assert_eq!(ctx.spend(10), Err(Halt::BudgetExhausted));
        assert_eq!(ctx.fuel(), 0);
        let (_, _, spent) = ctx.into_parts();
        assert_eq!(spent, 5);
    }

    #[test]
    fn test_denied_capability() {
        let mut ctx = RobotContext::new(view(), Budget::default());
        assert!(ctx.request(Capability::Sensors).is_ok());
        assert_eq!(
            ctx.request(Capability::FileWrite),
            Err(Halt::Denied(Capability::FileWrite))
        );
    }

    #[test]
    fn test_only_granted_capabilities_pass() {
        let every = [
            Capability::Compute,
            Capability::Sensors,
            Capability::Intents,
            Capability::Logging,
            Capability::FileRead,
            Capability::FileWrite,
            Capability::Network,
            Capability::SpawnThread,
            Capability::Process,
        ];
        for capability in every {
            let mut ctx = RobotContext::new(view(), Budget::default());
            let result = ctx.request(capability);
            if Capability::GRANTED.contains(&capability) {
                assert_eq!(result, Ok(()), "{}", capability);
            } else {
                assert_eq!(result, Err(Halt::Denied(capability)));
            }
        }
    }

    #[test]
    fn test_events_taken_once() {
        let mut ctx = RobotContext::new(view(), Budget::default());
        assert_eq!(ctx.take_events().unwrap().len(), 1);
        assert!(ctx.take_events().unwrap().is_empty());
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut ctx = RobotContext::new(view(), Budget::default());
        assert!(matches!(ctx.set_turn_rate(f64::NAN), Err(Halt::Fault(_))));
        assert!(ctx.intent().is_empty());
    }

    #[test]
    fn test_log_lines_collected() {
        let mut ctx = RobotContext::new(view(), Budget::default());
        ctx.log("hello").unwrap();
        let (_, log, _) = ctx.into_parts();
        assert_eq!(log, vec!["hello".to_string()]);
    }
}
