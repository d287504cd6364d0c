//! Reference robots for the CLI and tests.
//!
//! They are ordinary users of the robot API. The last three misbehave on
//! purpose so the sandbox has something to contain.

use crate::sandbox::{factory, RobotFactory};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use robowar_api::{Capability, Halt, Robot, RobotContext, RobotEvent, RobotId};
use robowar_core::geometry::normalize_relative;
use robowar_core::EngineError;

/// Reference robot identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotKind {
    /// Never moves or fires
    SittingDuck,

    /// Circles and fires at anything its radar crosses
    Spinner,

    /// Drives along the walls with its gun pointed inward
    WallCrawler,

    /// Locks onto one robot, follows it and fires by distance
    Tracker,

    /// Drives into the nearest robot it sees
    Rammer,

    /// Random seeded wandering
    Wanderer,

    // ═══════════════════════════════════════════════════
    // MISBEHAVING ROBOTS
    // ═══════════════════════════════════════════════════
    /// Panics after a while
    Crasher,

    /// Burns its whole budget every turn after a while
    Hog,

    /// Asks for network access after a while
    Intruder,
}

impl BotKind {
    /// Returns every reference robot.
    pub fn all() -> Vec<BotKind> {
        vec![
            BotKind::SittingDuck,
            BotKind::Spinner,
            BotKind::WallCrawler,
            BotKind::Tracker,
            BotKind::Rammer,
            BotKind::Wanderer,
            BotKind::Crasher,
            BotKind::Hog,
            BotKind::Intruder,
        ]
    }

    /// Returns the well-behaved robots only.
    pub fn standard() -> Vec<BotKind> {
        Self::all().into_iter().filter(|k| !k.is_misbehaving()).collect()
    }

    /// Returns the robot name used in rosters.
    pub fn name(&self) -> &'static str {
        match self {
            BotKind::SittingDuck => "sitting_duck",
            BotKind::Spinner => "spinner",
            BotKind::WallCrawler => "wall_crawler",
            BotKind::Tracker => "tracker",
            BotKind::Rammer => "rammer",
            BotKind::Wanderer => "wanderer",
            BotKind::Crasher => "crasher",
            BotKind::Hog => "hog",
            BotKind::Intruder => "intruder",
        }
    }

    /// Returns a description of the robot.
    pub fn description(&self) -> &'static str {
        match self {
            BotKind::SittingDuck => "Stationary target",
            BotKind::Spinner => "Circles at speed 5, fires power 3 at every scan",
            BotKind::WallCrawler => "Follows the walls clockwise, gun pointed at the arena center",
            BotKind::Tracker => "Follows one target, fire power chosen by distance",
            BotKind::Rammer => "Rams the robot it sees, fires on contact",
            BotKind::Wanderer => "Random headings and speeds from its seed",
            BotKind::Crasher => "Panics on turn 20 (disabled for the round)",
            BotKind::Hog => "Exhausts its fuel every turn from turn 5 (skipped, then disabled)",
            BotKind::Intruder => "Requests network access on turn 10 (banned)",
        }
    }

    /// Returns true for robots that break the sandbox rules.
    pub fn is_misbehaving(&self) -> bool {
        matches!(self, BotKind::Crasher | BotKind::Hog | BotKind::Intruder)
    }

    /// Returns a factory building fresh instances of this robot.
    pub fn factory(&self) -> RobotFactory {
        match self {
            BotKind::SittingDuck => factory(|| SittingDuck),
            BotKind::Spinner => factory(|| Spinner),
            BotKind::WallCrawler => factory(WallCrawler::default),
            BotKind::Tracker => factory(Tracker::default),
            BotKind::Rammer => factory(Rammer::default),
            BotKind::Wanderer => factory(Wanderer::default),
            BotKind::Crasher => factory(|| Crasher),
            BotKind::Hog => factory(|| Hog),
            BotKind::Intruder => factory(|| Intruder),
        }
    }
}

impl std::fmt::Display for BotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for BotKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sitting_duck" | "sittingduck" | "duck" => Ok(BotKind::SittingDuck),
            "spinner" | "spinbot" => Ok(BotKind::Spinner),
            "wall_crawler" | "walls" => Ok(BotKind::WallCrawler),
            "tracker" => Ok(BotKind::Tracker),
            "rammer" | "ramfire" => Ok(BotKind::Rammer),
            "wanderer" | "crazy" => Ok(BotKind::Wanderer),
            "crasher" => Ok(BotKind::Crasher),
            "hog" => Ok(BotKind::Hog),
            "intruder" => Ok(BotKind::Intruder),
            _ => Err(EngineError::UnknownRobot(s.to_string())),
        }
    }
}

/// Resolves roster names into robot factories.
///
/// Roster names may carry a suffix after `#` to field the same robot twice
/// (`tracker#2`).
pub fn resolve<S: AsRef<str>>(names: &[S]) -> Result<Vec<RobotFactory>, EngineError> {
    names
        .iter()
        .map(|name| {
            let base = name.as_ref().split('#').next().unwrap_or_default();
            base.parse::<BotKind>()
                .map(|kind| kind.factory())
                .map_err(|_| EngineError::UnknownRobot(name.as_ref().to_string()))
        })
        .collect()
}

/// Fire power by distance: weak shots from afar or when low on energy.
pub fn smart_power(distance: f64, energy: f64) -> f64 {
    if distance > 200.0 || energy < 15.0 {
        1.0
    } else if distance > 50.0 {
        2.0
    } else {
        3.0
    }
}

// ============================================================================
// WELL-BEHAVED ROBOTS
// ============================================================================

/// Does nothing at all.
pub struct SittingDuck;

impl Robot for SittingDuck {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        ctx.take_events()?;
        Ok(())
    }
}

pub struct Spinner;

impl Robot for Spinner {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        ctx.set_turn_rate(10.0)?;
        ctx.set_velocity(5.0)?;
        for event in ctx.take_events()? {
            if let RobotEvent::ScannedRobot(_) = event {
                ctx.fire(3.0)?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct WallCrawler {
    /// Cardinal heading being followed
    lane: Option<f64>,
}

impl Robot for WallCrawler {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        let status = ctx.status()?;
        let (width, height) = ctx.arena();

        let lane = *self
            .lane
            .get_or_insert_with(|| ((status.heading / 90.0).round() * 90.0) % 360.0);
        let error = normalize_relative(lane - status.heading);
        ctx.set_turn_rate(error.clamp(-10.0, 10.0))?;

        let ahead = match lane as u32 {
            0 => height - status.y,
            90 => width - status.x,
            180 => status.y,
            _ => status.x,
        };
        if error.abs() < 1.0 {
            ctx.set_velocity(8.0)?;
            if ahead < 60.0 {
                self.lane = Some((lane + 90.0) % 360.0);
            }
        } else {
            ctx.set_velocity(0.0)?;
        }

        ctx.set_gun_heading(status.heading + 90.0)?;
        ctx.scan()?;
        for event in ctx.take_events()? {
            if let RobotEvent::ScannedRobot(_) = event {
                ctx.fire(2.0)?;
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Tracker {
    target: Option<RobotId>,
    last_seen: u64,
}

impl Robot for Tracker {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        let status = ctx.status()?;
        let turn = ctx.turn();

        for event in ctx.take_events()? {
            match event {
                RobotEvent::ScannedRobot(seen) => {
                    let lost = turn.saturating_sub(self.last_seen) > 10;
                    if self.target.is_some() && self.target != Some(seen.id) && !lost {
                        continue;
                    }
                    self.target = Some(seen.id);
                    self.last_seen = turn;

                    let absolute = status.heading + seen.bearing;
                    ctx.set_gun_heading(absolute)?;
                    ctx.set_radar_heading(absolute)?;
                    ctx.set_turn_rate(seen.bearing.clamp(-10.0, 10.0))?;
                    let speed = if seen.distance > 150.0 {
                        8.0
                    } else if seen.distance < 100.0 {
                        -4.0
                    } else {
                        0.0
                    };
                    ctx.set_velocity(speed)?;

                    let aim_error = normalize_relative(absolute - status.gun_heading).abs();
                    if aim_error < 10.0 {
                        ctx.fire(smart_power(seen.distance, status.energy))?;
                    }
                }
                RobotEvent::RobotDeath { id } if Some(id) == self.target => {
                    self.target = None;
                }
                _ => {}
            }
        }

        if self.target.is_some() && turn.saturating_sub(self.last_seen) <= 3 {
            ctx.scan()?;
        } else {
            ctx.set_radar_heading(status.radar_heading + 45.0)?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Rammer {
    target_energy: Option<f64>,
    last_seen: u64,
}

impl Rammer {
    /// Weaker shots against a nearly dead target so the ram gets the kill.
    fn contact_power(&self) -> f64 {
        match self.target_energy {
            Some(e) if e > 16.0 => 3.0,
            Some(e) if e > 10.0 => 2.0,
            Some(e) if e > 4.0 => 1.0,
            Some(e) if e > 2.0 => 0.5,
            Some(_) => 0.1,
            None => 1.0,
        }
    }
}

impl Robot for Rammer {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        let status = ctx.status()?;
        let turn = ctx.turn();

        for event in ctx.take_events()? {
            match event {
                RobotEvent::ScannedRobot(seen) => {
                    self.target_energy = Some(seen.energy);
                    self.last_seen = turn;
                    ctx.set_turn_rate(seen.bearing.clamp(-10.0, 10.0))?;
                    ctx.set_velocity(8.0)?;
                    ctx.set_radar_heading(status.heading + seen.bearing)?;
                }
                RobotEvent::HitRobot { .. } => {
                    let power = self.contact_power();
                    ctx.fire(power)?;
                }
                _ => {}
            }
        }

        if turn.saturating_sub(self.last_seen) > 5 {
            ctx.set_turn_rate(10.0)?;
            ctx.set_velocity(0.0)?;
            ctx.set_radar_heading(status.radar_heading + 45.0)?;
        } else {
            ctx.scan()?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct Wanderer {
    rng: Option<ChaCha8Rng>,
    next_change: u64,
    velocity: f64,
}

impl Robot for Wanderer {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        let seed = ctx.seed();
        let turn = ctx.turn();
        let rng = self.rng.get_or_insert_with(|| ChaCha8Rng::seed_from_u64(seed));

        if turn >= self.next_change {
            self.velocity = rng.gen_range(-8.0..=8.0);
            let turn_rate = rng.gen_range(-10.0..=10.0);
            self.next_change = turn + rng.gen_range(10..40);
            ctx.set_velocity(self.velocity)?;
            ctx.set_turn_rate(turn_rate)?;
        }

        for event in ctx.take_events()? {
            match event {
                RobotEvent::HitWall { .. } | RobotEvent::HitRobot { .. } => {
                    self.velocity = -self.velocity;
                    ctx.set_velocity(self.velocity)?;
                }
                RobotEvent::ScannedRobot(_) => ctx.fire(1.0)?,
                _ => {}
            }
        }

        let radar = ctx.status()?.radar_heading;
        ctx.set_radar_heading(radar + 45.0)
    }
}

// ============================================================================
// MISBEHAVING ROBOTS
// ============================================================================

pub struct Crasher;

impl Robot for Crasher {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        if ctx.turn() >= 20 {
            panic!("crasher gave up on turn {}", ctx.turn());
        }
        ctx.set_turn_rate(5.0)
    }
}

pub struct Hog;

impl Robot for Hog {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        ctx.set_velocity(3.0)?;
        if ctx.turn() < 5 {
            return Ok(());
        }
        loop {
            ctx.spend(64)?;
        }
    }
}

pub struct Intruder;

impl Robot for Intruder {
    fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
        if ctx.turn() >= 10 {
            ctx.request(Capability::Network)?;
        }
        ctx.set_velocity(2.0)
    }
}
