//! Turn Scheduler: releases every eligible robot at once and waits at a
//! barrier bounded by the watchdog deadline.
//!
//! Intents collected at the barrier are ordered by `RobotId` and resolved as
//! one batch, so no robot sees another's same-turn intent.

use crate::sandbox::{RobotFactory, Sandbox, SandboxError, TurnOutcome, WorkerReply};
use robowar_api::{Intent, RobotId};
use robowar_core::{DisableReason, EngineError, SandboxLimits, TurnSnapshot, World};
use std::collections::BTreeMap;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What happened while scheduling one turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The resolved turn
    pub snapshot: TurnSnapshot,

    /// Robots whose intents were applied
    pub completed: Vec<RobotId>,

    /// Robots whose turn was skipped (budget, deadline or still busy)
    pub skipped: Vec<RobotId>,

    /// Wall-clock time spent at the barrier
    pub barrier_time: Duration,
}

/// Holds the sandboxes of one round.
pub struct TurnScheduler {
    limits: SandboxLimits,
    sandboxes: BTreeMap<RobotId, Sandbox>,

    /// Workers that did not stop within the grace period
    abandoned: Vec<(RobotId, JoinHandle<()>)>,
}

impl TurnScheduler {
    pub fn new(limits: SandboxLimits) -> Self {
        Self {
            limits,
            sandboxes: BTreeMap::new(),
            abandoned: Vec::new(),
        }
    }

    /// Starts the worker for one robot.
    pub fn spawn(&mut self, id: RobotId, name: &str, factory: RobotFactory) -> Result<(), SandboxError> {
        let sandbox = Sandbox::spawn(id, name, factory)?;
        self.sandboxes.insert(id, sandbox);
        Ok(())
    }

    /// Number of live workers.
    pub fn worker_count(&self) -> usize {
        self.sandboxes.len()
    }

    /// Advances the world by exactly one turn.
    pub fn run_turn(&mut self, world: &mut World) -> Result<TurnReport, EngineError> {
        let turn = world.turn() + 1;
        let budget = self.limits.budget();
        let mut skipped = Vec::new();
        let mut dispatched = Vec::new();

        for id in world.schedulable() {
            let Some(sandbox) = self.sandboxes.get_mut(&id) else {
                warn!(robot = %id, "no worker for robot, disabling");
                world.disable(id, DisableReason::Fault);
                continue;
            };

            for reply in sandbox.drain_late() {
                apply_late(world, id, sandbox.name(), reply);
            }
            if !world.peer(id).map_or(false, |p| p.is_alive()) {
                continue;
            }
            if sandbox.is_busy() {
                debug!(robot = %sandbox.name(), turn, "worker still busy, skipping");
                world.record_skip(id);
                skipped.push(id);
                continue;
            }

            let Some(view) = world.take_view(id) else {
                continue;
            };
            match sandbox.dispatch(turn, view, budget) {
                Ok(()) => dispatched.push(id),
                Err(e) => {
                    warn!(robot = %sandbox.name(), "{}", e);
                    world.disable(id, DisableReason::Fault);
                }
            }
        }

        // Barrier
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.limits.watchdog_ms);
        let mut intents: BTreeMap<RobotId, Intent> = BTreeMap::new();
        let mut completed = Vec::new();

        for id in dispatched {
            let Some(sandbox) = self.sandboxes.get_mut(&id) else {
                continue;
            };
            let name = sandbox.name().to_string();

            let reply = match sandbox.await_reply(turn, deadline) {
                Ok(Some(reply)) => reply,
                Ok(None) => {
                    debug!(robot = %name, turn, "missed the watchdog deadline");
                    world.record_skip(id);
                    skipped.push(id);
                    continue;
                }
                Err(e) => {
                    warn!(robot = %name, "{}", e);
                    world.disable(id, DisableReason::Fault);
                    continue;
                }
            };

            for line in &reply.logs {
                debug!(robot = %name, "{}", line);
            }

            match reply.outcome {
                TurnOutcome::Completed(intent) => {
                    intents.insert(id, intent);
                    completed.push(id);
                }
                TurnOutcome::BudgetExhausted => {
                    debug!(robot = %name, turn, fuel = reply.fuel_spent, "budget exhausted");
                    world.record_skip(id);
                    skipped.push(id);
                }
                TurnOutcome::Fault(reason) => {
                    warn!(robot = %name, turn, "robot fault: {}", reason);
                    world.disable(id, DisableReason::Fault);
                }
                TurnOutcome::Denied(capability) => {
                    warn!(robot = %name, turn, "capability violation: {}", capability);
                    world.ban(id, capability);
                }
            }
        }
        let barrier_time = started.elapsed();

        let snapshot = world.step(&intents)?;

        // Workers of robots that left the round are no longer needed
        let gone: Vec<RobotId> = self
            .sandboxes
            .keys()
            .copied()
            .filter(|id| !world.peer(*id).map_or(false, |p| p.is_alive()))
            .collect();
        let stuck = self.stop(gone);
        self.abandoned.extend(stuck);

        Ok(TurnReport {
            snapshot,
            completed,
            skipped,
            barrier_time,
        })
    }

    /// Signals every listed worker, then waits once for the shared grace
    /// period. Returns the workers still running afterwards.
    fn stop(&mut self, ids: Vec<RobotId>) -> Vec<(RobotId, JoinHandle<()>)> {
        let mut stopping: Vec<Sandbox> = ids.iter().filter_map(|id| self.sandboxes.remove(id)).collect();
        if stopping.is_empty() {
            return Vec::new();
        }
        for sandbox in &mut stopping {
            sandbox.signal_shutdown();
        }

        let deadline = Instant::now() + Duration::from_millis(self.limits.shutdown_grace_ms);
        stopping
            .iter_mut()
            .filter_map(|sandbox| sandbox.wait_stopped(deadline).map(|handle| (sandbox.id(), handle)))
            .collect()
    }

    /// Stops every worker within one grace period.
    ///
    /// Returns the workers that did not exit, including ones abandoned
    /// earlier in the round.
    pub fn shutdown(&mut self) -> Vec<(RobotId, JoinHandle<()>)> {
        let ids: Vec<RobotId> = self.sandboxes.keys().copied().collect();
        let mut stuck = std::mem::take(&mut self.abandoned);
        stuck.extend(self.stop(ids));
        stuck
    }
}

impl Drop for TurnScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Applies a reply that missed its turn: the intent is stale, but faults
/// and violations still count.
fn apply_late(world: &mut World, id: RobotId, name: &str, reply: WorkerReply) {
    for line in &reply.logs {
        debug!(robot = %name, "{}", line);
    }
    match reply.outcome {
        TurnOutcome::Fault(reason) => {
            warn!(robot = %name, turn = reply.turn, "late robot fault: {}", reason);
            world.disable(id, DisableReason::Fault);
        }
        TurnOutcome::Denied(capability) => {
            warn!(robot = %name, turn = reply.turn, "late capability violation: {}", capability);
            world.ban(id, capability);
        }
        TurnOutcome::Completed(_) | TurnOutcome::BudgetExhausted => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::factory;
    use robowar_api::{Capability, Halt, Robot, RobotContext};
    use robowar_core::{BattleConfig, BattleEvent, PeerState, SkipPolicy};
    use std::thread;

    struct Idle;
    impl Robot for Idle {
        fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
            ctx.set_velocity(0.0)
        }
    }

    struct Hog;
    impl Robot for Hog {
        fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
            loop {
                ctx.spend(100)?;
            }
        }
    }

    struct Crasher;
    impl Robot for Crasher {
        fn run_turn(&mut self, _ctx: &mut RobotContext) -> Result<(), Halt> {
            panic!("crash");
        }
    }

    struct Intruder;
    impl Robot for Intruder {
        fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
            ctx.request(Capability::Network)
        }
    }

    struct Sleeper;
    impl Robot for Sleeper {
        fn run_turn(&mut self, _ctx: &mut RobotContext) -> Result<(), Halt> {
            thread::sleep(Duration::from_millis(400));
            Ok(())
        }
    }

    /// Oversleeps its first turn, then asks for the network.
    struct LateIntruder;
    impl Robot for LateIntruder {
        fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
            thread::sleep(Duration::from_millis(120));
            ctx.request(Capability::Network)
        }
    }

    /// Oversleeps its first turn, then panics.
    struct LateCrasher;
    impl Robot for LateCrasher {
        fn run_turn(&mut self, _ctx: &mut RobotContext) -> Result<(), Halt> {
            thread::sleep(Duration::from_millis(120));
            panic!("late crash");
        }
    }

    /// Sets its orders on turn 1, then stalls every later turn.
    struct Cruiser;
    impl Robot for Cruiser {
        fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
            if ctx.turn() == 1 {
                ctx.set_velocity(4.0)?;
                ctx.set_turn_rate(5.0)
            } else {
                thread::sleep(Duration::from_millis(300));
                Ok(())
            }
        }
    }

    fn setup(second: RobotFactory, limits: SandboxLimits) -> (World, TurnScheduler) {
        let config = BattleConfig::with_robots(["idle", "other"])
            .with_limits(limits)
            .with_max_turns(100);
        setup_with(config, second)
    }

    fn setup_with(config: BattleConfig, second: RobotFactory) -> (World, TurnScheduler) {
        let limits = config.limits;
        let world = World::new(0, &config, &[]).unwrap();
        let mut scheduler = TurnScheduler::new(limits);
        scheduler.spawn(RobotId(0), "idle", factory(|| Idle)).unwrap();
        scheduler.spawn(RobotId(1), "other", second).unwrap();
        (world, scheduler)
    }

    #[test]
    fn test_budget_hog_is_skipped_then_disabled() {
        let limits = SandboxLimits {
            max_consecutive_skips: 3,
            ..Default::default()
        };
        let (mut world, mut scheduler) = setup(factory(|| Hog), limits);

        let mut counts = Vec::new();
        for _ in 0..3 {
            let report = scheduler.run_turn(&mut world).unwrap();
            assert_eq!(report.completed, vec![RobotId(0)]);
            assert_eq!(report.skipped, vec![RobotId(1)]);
            counts.push(world.peer(RobotId(1)).map_or(0, |p| p.skipped_turns));
        }

        assert_eq!(counts, vec![1, 2, 3]);
        assert_eq!(
            world.peer(RobotId(1)).map(|p| p.state),
            Some(PeerState::Disabled(DisableReason::SkippedTurns))
        );
        assert!(world.is_finished());
        assert_eq!(scheduler.worker_count(), 1);
    }

    #[test]
    fn test_crash_disables_for_round() {
        let (mut world, mut scheduler) = setup(factory(|| Crasher), SandboxLimits::default());
        let report = scheduler.run_turn(&mut world).unwrap();

        assert!(report.snapshot.events.contains(&BattleEvent::RobotDisabled {
            robot: RobotId(1),
            reason: DisableReason::Fault,
        }));
        assert!(report.snapshot.round_final);
    }

    #[test]
    fn test_violation_bans() {
        let (mut world, mut scheduler) = setup(factory(|| Intruder), SandboxLimits::default());
        let report = scheduler.run_turn(&mut world).unwrap();

        assert!(report.snapshot.events.contains(&BattleEvent::RobotBanned {
            robot: RobotId(1),
            capability: "network".into(),
        }));
        assert_eq!(world.peer(RobotId(1)).map(|p| p.state), Some(PeerState::Banned));
    }

    #[test]
    fn test_watchdog_skips_slow_robot() {
        let limits = SandboxLimits {
            watchdog_ms: 50,
            ..Default::default()
        };
        let (mut world, mut scheduler) = setup(factory(|| Sleeper), limits);

        let first = scheduler.run_turn(&mut world).unwrap();
        assert_eq!(first.skipped, vec![RobotId(1)]);
        assert_eq!(first.completed, vec![RobotId(0)]);

        // Still busy with turn 1: skipped again without a dispatch
        let second = scheduler.run_turn(&mut world).unwrap();
        assert_eq!(second.skipped, vec![RobotId(1)]);

        assert!(world.peer(RobotId(1)).map_or(false, |p| p.is_alive()));
        assert_eq!(world.peer(RobotId(1)).map(|p| p.skipped_turns), Some(2));
    }

    #[test]
    fn test_well_behaved_robots_complete() {
        let (mut world, mut scheduler) = setup(factory(|| Idle), SandboxLimits::default());
        for turn in 1..=5 {
            let report = scheduler.run_turn(&mut world).unwrap();
            assert_eq!(report.snapshot.turn, turn);
            assert_eq!(report.completed, vec![RobotId(0), RobotId(1)]);
            assert!(report.skipped.is_empty());
        }
    }

    /// Runs turns until the round ends or the time runs out.
    fn run_until_finished(world: &mut World, scheduler: &mut TurnScheduler) -> Vec<BattleEvent> {
        let mut events = Vec::new();
        let started = Instant::now();
        while !world.is_finished() && started.elapsed() < Duration::from_secs(2) {
            let report = scheduler.run_turn(world).unwrap();
            events.extend(report.snapshot.events);
            thread::sleep(Duration::from_millis(10));
        }
        events
    }

    #[test]
    fn test_late_violation_still_bans() {
        let limits = SandboxLimits {
            watchdog_ms: 20,
            ..Default::default()
        };
        let (mut world, mut scheduler) = setup(factory(|| LateIntruder), limits);

        let first = scheduler.run_turn(&mut world).unwrap();
        assert_eq!(first.skipped, vec![RobotId(1)]);

        let events = run_until_finished(&mut world, &mut scheduler);
        assert_eq!(world.peer(RobotId(1)).map(|p| p.state), Some(PeerState::Banned));
        assert!(events.contains(&BattleEvent::RobotBanned {
            robot: RobotId(1),
            capability: "network".into(),
        }));
    }

    #[test]
    fn test_late_fault_still_disables() {
        let limits = SandboxLimits {
            watchdog_ms: 20,
            ..Default::default()
        };
        let (mut world, mut scheduler) = setup(factory(|| LateCrasher), limits);

        let events = run_until_finished(&mut world, &mut scheduler);
        assert_eq!(
            world.peer(RobotId(1)).map(|p| p.state),
            Some(PeerState::Disabled(DisableReason::Fault))
        );
        assert!(events.contains(&BattleEvent::RobotDisabled {
            robot: RobotId(1),
            reason: DisableReason::Fault,
        }));
    }

    fn cruise(policy: SkipPolicy) -> World {
        let limits = SandboxLimits {
            watchdog_ms: 50,
            ..Default::default()
        };
        let config = BattleConfig::with_robots(["idle", "cruiser"])
            .with_limits(limits)
            .with_skip_policy(policy)
            .with_max_turns(100);
        let (mut world, mut scheduler) = setup_with(config, factory(|| Cruiser));

        let first = scheduler.run_turn(&mut world).unwrap();
        assert_eq!(first.completed, vec![RobotId(0), RobotId(1)]);
        for _ in 0..2 {
            let report = scheduler.run_turn(&mut world).unwrap();
            assert_eq!(report.skipped, vec![RobotId(1)]);
        }
        world
    }

    #[test]
    fn test_repeat_last_keeps_orders_through_skips() {
        let world = cruise(SkipPolicy::RepeatLast);
        let peer = world.peer(RobotId(1)).unwrap();

        assert_eq!(peer.skipped_turns, 2);
        assert_eq!(peer.orders.velocity, 4.0);
        assert_eq!(peer.orders.turn_rate, 5.0);
    }

    #[test]
    fn test_hold_clears_orders_on_skip() {
        let world = cruise(SkipPolicy::Hold);
        let peer = world.peer(RobotId(1)).unwrap();

        assert_eq!(peer.skipped_turns, 2);
        assert_eq!(peer.orders.velocity, 0.0);
        assert_eq!(peer.orders.turn_rate, 0.0);
    }

    #[test]
    fn test_shutdown_shares_one_grace_period() {
        let limits = SandboxLimits {
            watchdog_ms: 20,
            shutdown_grace_ms: 100,
            ..Default::default()
        };
        let config = BattleConfig::with_robots(["a", "b", "c"])
            .with_limits(limits)
            .with_max_turns(100);
        let mut world = World::new(0, &config, &[]).unwrap();
        let mut scheduler = TurnScheduler::new(limits);
        for i in 0..3 {
            scheduler.spawn(RobotId(i), "sleeper", factory(|| Sleeper)).unwrap();
        }

        let report = scheduler.run_turn(&mut world).unwrap();
        assert_eq!(report.skipped.len(), 3);

        let started = Instant::now();
        let stuck = scheduler.shutdown();
        let elapsed = started.elapsed();

        assert_eq!(stuck.len(), 3);
        assert!(elapsed < Duration::from_millis(250), "took {:?}", elapsed);
        assert_eq!(scheduler.worker_count(), 0);
        for (_, handle) in stuck {
            handle.join().unwrap();
        }
    }
}
