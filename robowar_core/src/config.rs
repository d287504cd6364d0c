//! Battle configuration.

use crate::error::EngineError;
use crate::rules::Rules;
use robowar_api::Budget;
use serde::{Deserialize, Serialize};

/// How a robot's gun and radar follow the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotMode {
    /// Gun rotates with the body before aiming
    pub gun_locked_to_body: bool,

    /// Radar rotates with the gun before sweeping
    pub radar_locked_to_gun: bool,
}

impl Default for RobotMode {
    fn default() -> Self {
        Self {
            gun_locked_to_body: true,
            radar_locked_to_gun: true,
        }
    }
}

/// One robot taking part in the battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Robot name (looked up by the sandbox host)
    pub name: String,

    /// Gun/radar coupling
    #[serde(default)]
    pub mode: RobotMode,
}

impl RosterEntry {
    /// Creates an entry with the default mode.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: RobotMode::default(),
        }
    }
}

/// What happens to a robot's orders when its turn is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Stop, stop rotating, do not fire
    Hold,

    /// Keep the last standing orders
    RepeatLast,
}

/// Resource ceilings for sandboxed robot code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Fuel per turn
    pub fuel_per_turn: u64,

    /// Fuel charged per context call
    pub call_cost: u64,

    /// Wall-clock ceiling for one turn of one robot (milliseconds)
    pub watchdog_ms: u64,

    /// Consecutive skipped turns before the robot is disabled
    pub max_consecutive_skips: u32,

    /// How long shutdown waits for a worker (milliseconds)
    pub shutdown_grace_ms: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            fuel_per_turn: 10_000,
            call_cost: 1,
            watchdog_ms: 250,
            max_consecutive_skips: 30,
            shutdown_grace_ms: 200,
        }
    }
}

impl SandboxLimits {
    /// Per-turn budget handed to robot contexts.
    pub fn budget(&self) -> Budget {
        Budget {
            fuel: self.fuel_per_turn,
            call_cost: self.call_cost,
        }
    }
}

/// Configuration for a battle. Immutable once the battle starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Arena width
    pub arena_width: f64,

    /// Arena height
    pub arena_height: f64,

    /// Number of rounds
    pub rounds: u32,

    /// Turn ceiling per round (stalemate)
    pub max_turns: u64,

    /// Master seed for deployment and robot seeds
    pub seed: u64,

    /// Participating robots, in id order
    pub roster: Vec<RosterEntry>,

    /// Physics and scoring constants
    pub rules: Rules,

    /// Sandbox resource ceilings
    pub limits: SandboxLimits,

    /// Orders applied on skipped turns
    pub skip_policy: SkipPolicy,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            arena_width: 800.0,
            arena_height: 600.0,
            rounds: 10,
            max_turns: 10_000,
            seed: 42,
            roster: Vec::new(),
            rules: Rules::default(),
            limits: SandboxLimits::default(),
            skip_policy: SkipPolicy::Hold,
        }
    }
}

impl BattleConfig {
    /// Creates a configuration for the given robot names.
    pub fn with_robots<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            roster: names.into_iter().map(RosterEntry::new).collect(),
            ..Default::default()
        }
    }

    /// Sets the arena size.
    pub fn with_arena(mut self, width: f64, height: f64) -> Self {
        self.arena_width = width;
        self.arena_height = height;
        self
    }

    /// Sets the number of rounds.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Sets the turn ceiling per round.
    pub fn with_max_turns(mut self, max_turns: u64) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the sandbox limits.
    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the skip policy.
    pub fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    /// Parses a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::config(e.to_string()))
    }

    /// Checks that a battle can start with this configuration.
    pub fn validate(&self) -> Result<(), EngineError> {
        let r = &self.rules;

        if self.roster.is_empty() {
            return Err(EngineError::config("roster is empty"));
        }
        if self.roster.iter().any(|e| e.name.trim().is_empty()) {
            return Err(EngineError::config("roster contains an unnamed robot"));
        }
        if self.rounds == 0 {
            return Err(EngineError::config("rounds must be at least 1"));
        }
        if self.max_turns == 0 {
            return Err(EngineError::config("max_turns must be at least 1"));
        }
        if !(r.robot_radius.is_finite() && r.robot_radius > 0.0) {
            return Err(EngineError::config("robot_radius must be positive"));
        }

        let min_side = 4.0 * r.robot_radius;
        if !(self.arena_width.is_finite() && self.arena_height.is_finite())
            || self.arena_width < min_side
            || self.arena_height < min_side
        {
            return Err(EngineError::config(format!(
                "arena {}x{} is smaller than {}x{}",
                self.arena_width, self.arena_height, min_side, min_side
            )));
        }

        // Deployment needs room for every robot plus spacing
        let cell = 3.0 * r.robot_radius;
        let capacity = ((self.arena_width - 2.0 * r.robot_radius) / cell).floor()
            * ((self.arena_height - 2.0 * r.robot_radius) / cell).floor();
        if (self.roster.len() as f64) > capacity {
            return Err(EngineError::config(format!(
                "arena cannot hold {} robots",
                self.roster.len()
            )));
        }

        if !(r.min_bullet_power > 0.0 && r.min_bullet_power <= r.max_bullet_power) {
            return Err(EngineError::config("bullet power range is empty"));
        }
        if r.bullet_speed(r.max_bullet_power) <= 0.0 {
            return Err(EngineError::config("max_bullet_power gives a non-moving bullet"));
        }
        if !(r.start_energy > 0.0) {
            return Err(EngineError::config("start_energy must be positive"));
        }
        if !(r.acceleration > 0.0 && r.deceleration > 0.0 && r.max_velocity > 0.0) {
            return Err(EngineError::config("motion limits must be positive"));
        }
        if !(r.gun_cooling_rate > 0.0) {
            return Err(EngineError::config("gun_cooling_rate must be positive"));
        }
        if r.initial_gun_heat < 0.0 {
            return Err(EngineError::config("initial_gun_heat must not be negative"));
        }

        let l = &self.limits;
        if l.fuel_per_turn == 0 {
            return Err(EngineError::config("fuel_per_turn must be at least 1"));
        }
        if l.watchdog_ms == 0 {
            return Err(EngineError::config("watchdog_ms must be at least 1"));
        }
        if l.max_consecutive_skips == 0 {
            return Err(EngineError::config("max_consecutive_skips must be at least 1"));
        }

        Ok(())
    }
}
