//! Execution Sandbox: one worker thread per robot.
//!
//! The robot program is built and owned by its worker. The scheduler talks
//! to it only through channels: a [`WorkerRequest`] carrying the turn view
//! and budget goes in, a [`WorkerReply`] tagged with the same turn comes
//! back. Panics are caught at the worker boundary and reported as faults.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use robowar_api::{Budget, Capability, Halt, Intent, Robot, RobotContext, RobotId, TurnView};
use robowar_core::EngineError;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Builds a fresh robot instance; called once per round inside the worker.
pub type RobotFactory = Arc<dyn Fn() -> Box<dyn Robot> + Send + Sync>;

/// Wraps a constructor into a [`RobotFactory`].
pub fn factory<R, F>(make: F) -> RobotFactory
where
    R: Robot,
    F: Fn() -> R + Send + Sync + 'static,
{
    Arc::new(move || Box::new(make()) as Box<dyn Robot>)
}

/// Errors hosting a robot.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The worker thread could not be started
    #[error("failed to spawn worker for {name}: {reason}")]
    Spawn { name: String, reason: String },

    /// The worker is gone
    #[error("worker for {0} disconnected")]
    Disconnected(RobotId),
}

impl From<SandboxError> for EngineError {
    fn from(err: SandboxError) -> Self {
        EngineError::Sandbox(err.to_string())
    }
}

/// Message from the scheduler to a worker.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Run one turn
    Turn { turn: u64, view: TurnView, budget: Budget },

    /// Exit the worker loop
    Shutdown,
}

/// How a robot's turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Returned normally; the intent is queued for the turn
    Completed(Intent),

    /// Ran out of fuel
    BudgetExhausted,

    /// Panicked or returned a fault
    Fault(String),

    /// Asked for a capability it does not hold
    Denied(Capability),
}

/// Message from a worker back to the scheduler.
#[derive(Debug)]
pub struct WorkerReply {
    /// Turn the reply belongs to
    pub turn: u64,

    pub outcome: TurnOutcome,

    /// Lines logged through the context
    pub logs: Vec<String>,

    /// Fuel charged during the turn
    pub fuel_spent: u64,
}

/// Renders a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Runs one turn of a robot program under `catch_unwind`.
pub fn run_contained(robot: &mut dyn Robot, view: TurnView, budget: Budget) -> (TurnOutcome, Vec<String>, u64) {
    let mut ctx = RobotContext::new(view, budget);
    let result = catch_unwind(AssertUnwindSafe(|| robot.run_turn(&mut ctx)));
    let (intent, logs, spent) = ctx.into_parts();

    let outcome = match result {
        Ok(Ok(())) => TurnOutcome::Completed(intent),
        Ok(Err(Halt::BudgetExhausted)) => TurnOutcome::BudgetExhausted,
        Ok(Err(Halt::Denied(capability))) => TurnOutcome::Denied(capability),
        Ok(Err(Halt::Fault(reason))) => TurnOutcome::Fault(reason),
        Err(payload) => TurnOutcome::Fault(panic_message(payload.as_ref())),
    };
    (outcome, logs, spent)
}

fn worker_loop(factory: RobotFactory, requests: Receiver<WorkerRequest>, replies: Sender<WorkerReply>) {
    let mut robot = catch_unwind(AssertUnwindSafe(|| factory())).map_err(|p| panic_message(p.as_ref()));

    while let Ok(request) = requests.recv() {
        let (turn, view, budget) = match request {
            WorkerRequest::Shutdown => break,
            WorkerRequest::Turn { turn, view, budget } => (turn, view, budget),
        };

        let (outcome, logs, fuel_spent) = match robot.as_mut() {
            Ok(robot) => run_contained(robot.as_mut(), view, budget),
            Err(reason) => (TurnOutcome::Fault(format!("construction {}", reason)), Vec::new(), 0),
        };

        let reply = WorkerReply {
            turn,
            outcome,
            logs,
            fuel_spent,
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
}

/// Scheduler-side handle to one robot worker.
pub struct Sandbox {
    id: RobotId,
    name: String,
    requests: Sender<WorkerRequest>,
    replies: Receiver<WorkerReply>,
    handle: Option<JoinHandle<()>>,

    /// Turn still being computed by the worker, if any
    busy_turn: Option<u64>,

    /// Replies for earlier turns, kept until drained
    late: Vec<WorkerReply>,
}

impl Sandbox {
    /// Starts a worker thread that builds its robot from `factory`.
    pub fn spawn(id: RobotId, name: &str, factory: RobotFactory) -> Result<Self, SandboxError> {
        let (req_tx, req_rx) = channel::bounded(1);
        let (rep_tx, rep_rx) = channel::bounded(1);

        let handle = thread::Builder::new()
            .name(format!("robot-{}", name))
            .spawn(move || worker_loop(factory, req_rx, rep_tx))
            .map_err(|e| SandboxError::Spawn {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            name: name.to_string(),
            requests: req_tx,
            replies: rep_rx,
            handle: Some(handle),
            busy_turn: None,
            late: Vec::new(),
        })
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the worker is still on an earlier turn.
    pub fn is_busy(&self) -> bool {
        self.busy_turn.is_some()
    }

    /// Collects replies that arrived after their deadline.
    ///
    /// Their intents are stale, but a fault or a denied capability still
    /// counts against the robot.
    pub fn drain_late(&mut self) -> Vec<WorkerReply> {
        while let Ok(reply) = self.replies.try_recv() {
            self.late.push(reply);
        }
        for reply in &self.late {
            debug!(robot = %self.name, turn = reply.turn, "late reply");
            if self.busy_turn == Some(reply.turn) {
                self.busy_turn = None;
            }
        }
        std::mem::take(&mut self.late)
    }

    /// Sends a turn to the worker.
    pub fn dispatch(&mut self, turn: u64, view: TurnView, budget: Budget) -> Result<(), SandboxError> {
        self.requests
            .try_send(WorkerRequest::Turn { turn, view, budget })
            .map_err(|_| SandboxError::Disconnected(self.id))?;
        self.busy_turn = Some(turn);
        Ok(())
    }

    /// Waits for the reply to `turn` until `deadline`.
    ///
    /// Returns `Ok(None)` when the deadline passes first; the worker then
    /// stays busy until its late reply is drained. Replies for earlier
    /// turns are set aside for [`Sandbox::drain_late`].
    pub fn await_reply(&mut self, turn: u64, deadline: Instant) -> Result<Option<WorkerReply>, SandboxError> {
        loop {
            match self.replies.recv_deadline(deadline) {
                Ok(reply) if reply.turn == turn => {
                    self.busy_turn = None;
                    return Ok(Some(reply));
                }
                Ok(stale) => self.late.push(stale),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(SandboxError::Disconnected(self.id)),
            }
        }
    }

    /// Asks the worker to exit without waiting for it.
    pub fn signal_shutdown(&mut self) {
        let _ = self.requests.try_send(WorkerRequest::Shutdown);
    }

    /// Waits until `deadline` for a signalled worker to exit.
    ///
    /// Returns the thread handle of a worker that is still running, so the
    /// caller can keep track of it. Rust threads cannot be killed.
    pub fn wait_stopped(&mut self, deadline: Instant) -> Option<JoinHandle<()>> {
        loop {
            match self.replies.recv_deadline(deadline) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(handle) = self.handle.take() {
                        let _ = handle.join();
                    }
                    return None;
                }
                Err(RecvTimeoutError::Timeout) => {
                    let handle = self.handle.take()?;
                    warn!(robot = %self.name, "worker did not stop in time, abandoning it");
                    return Some(handle);
                }
            }
        }
    }

    /// Stops the worker, waiting at most `grace`.
    pub fn shutdown(&mut self, grace: Duration) -> Option<JoinHandle<()>> {
        self.signal_shutdown();
        self.wait_stopped(Instant::now() + grace)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        // Dropping the channels ends an idle worker; a busy one is detached
        if self.handle.take().is_some() {
            self.signal_shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robowar_api::{RobotEvent, RobotStatus};

    fn view(turn: u64) -> TurnView {
        TurnView {
            id: RobotId(0),
            round: 0,
            turn,
            arena_width: 800.0,
            arena_height: 600.0,
            others: 1,
            status: RobotStatus::default(),
            events: vec![RobotEvent::RoundStarted { round: 0 }],
            seed: 1,
        }
    }

    struct Steady;
    impl Robot for Steady {
        fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
            ctx.log("tick")?;
            ctx.set_velocity(4.0)?;
            ctx.fire(1.0)
        }
    }

    struct Panicky;
    impl Robot for Panicky {
        fn run_turn(&mut self, _ctx: &mut RobotContext) -> Result<(), Halt> {
            panic!("boom");
        }
    }

    struct Spinning;
    impl Robot for Spinning {
        fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
            loop {
                ctx.spend(7)?;
            }
        }
    }

    struct Snooper;
    impl Robot for Snooper {
        fn run_turn(&mut self, ctx: &mut RobotContext) -> Result<(), Halt> {
            ctx.request(Capability::FileRead)
        }
    }

    struct Slow;
    impl Robot for Slow {
        fn run_turn(&mut self, _ctx: &mut RobotContext) -> Result<(), Halt> {
            thread::sleep(Duration::from_millis(150));
            Ok(())
        }
    }

    #[test]
    fn test_run_contained_outcomes() {
        let budget = Budget::default();

        let (outcome, logs, spent) = run_contained(&mut Steady, view(1), budget);
        match outcome {
            TurnOutcome::Completed(intent) => {
                assert_eq!(intent.velocity, Some(4.0));
                assert_eq!(intent.fire, Some(1.0));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(logs, vec!["tick".to_string()]);
        assert!(spent > 0);

        let (outcome, _, _) = run_contained(&mut Panicky, view(1), budget);
        assert_eq!(outcome, TurnOutcome::Fault("panicked: boom".into()));

        let (outcome, _, spent) = run_contained(&mut Spinning, view(1), budget);
        assert_eq!(outcome, TurnOutcome::BudgetExhausted);
        assert_eq!(spent, budget.fuel);

        let (outcome, _, _) = run_contained(&mut Snooper, view(1), budget);
        assert_eq!(outcome, TurnOutcome::Denied(Capability::FileRead));
    }

    #[test]
    fn test_worker_round_trip() {
        let mut sandbox = Sandbox::spawn(RobotId(0), "steady", factory(|| Steady)).unwrap();

        for turn in 1..=3 {
            sandbox.dispatch(turn, view(turn), Budget::default()).unwrap();
            assert!(sandbox.is_busy());
            let reply = sandbox
                .await_reply(turn, Instant::now() + Duration::from_secs(5))
                .unwrap()
                .expect("reply in time");
            assert_eq!(reply.turn, turn);
            assert!(matches!(reply.outcome, TurnOutcome::Completed(_)));
            assert!(!sandbox.is_busy());
        }

        sandbox.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_worker_survives_panic() {
        let mut sandbox = Sandbox::spawn(RobotId(0), "panicky", factory(|| Panicky)).unwrap();
        sandbox.dispatch(1, view(1), Budget::default()).unwrap();
        let reply = sandbox
            .await_reply(1, Instant::now() + Duration::from_secs(5))
            .unwrap()
            .expect("fault reported");
        assert!(matches!(reply.outcome, TurnOutcome::Fault(_)));
        sandbox.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_late_reply_is_set_aside() {
        let mut sandbox = Sandbox::spawn(RobotId(0), "slow", factory(|| Slow)).unwrap();
        sandbox.dispatch(1, view(1), Budget::default()).unwrap();

        let missed = sandbox
            .await_reply(1, Instant::now() + Duration::from_millis(10))
            .unwrap();
        assert!(missed.is_none());
        assert!(sandbox.is_busy());

        thread::sleep(Duration::from_millis(300));
        let late = sandbox.drain_late();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].turn, 1);
        assert!(!sandbox.is_busy());

        sandbox.dispatch(2, view(2), Budget::default()).unwrap();
        let reply = sandbox
            .await_reply(2, Instant::now() + Duration::from_secs(5))
            .unwrap()
            .expect("second turn answered");
        assert_eq!(reply.turn, 2);
        sandbox.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_stuck_worker_handle_is_returned() {
        let mut sandbox = Sandbox::spawn(RobotId(0), "slow", factory(|| Slow)).unwrap();
        sandbox.dispatch(1, view(1), Budget::default()).unwrap();

        let handle = sandbox.shutdown(Duration::from_millis(10));
        let handle = handle.expect("worker still sleeping");
        assert!(!handle.is_finished());

        // The worker exits on its own once the turn is over
        handle.join().unwrap();
        assert!(sandbox.shutdown(Duration::from_millis(10)).is_none());
    }
}
