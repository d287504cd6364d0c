//! Round/Battle Orchestrator.
//!
//! Drives the `RoundStarting → RoundRunning → RoundEnding` cycle once per
//! configured round, feeds the scoring engine and the snapshot sinks, and
//! watches the cancel token between turns.

use crate::bots;
use crate::exporter::SnapshotSink;
use crate::sandbox::RobotFactory;
use crate::scheduler::TurnScheduler;
use robowar_api::RobotId;
use robowar_core::{
    BattleConfig, BattleEvent, BattleResults, DisableReason, EngineError, RoundScoring, ScoreBoard, TurnSnapshot,
    World,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Where the battle state machine stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattlePhase {
    /// Next step deploys a round
    RoundStarting,

    /// Next step resolves a turn
    RoundRunning,

    /// Next step closes the round's scores
    RoundEnding,

    /// Next step produces the results
    BattleEnding,

    /// Nothing left to do
    Finished,
}

/// User stop request, shared between the battle and whoever may stop it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the battle to stop after the current turn.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Everything that lives exactly as long as one round.
struct ActiveRound {
    world: World,
    scheduler: TurnScheduler,
    scoring: RoundScoring,
}

/// A battle: rounds of turns with scores accumulated across rounds.
pub struct Battle {
    config: BattleConfig,
    names: Vec<String>,
    factories: Vec<RobotFactory>,
    sinks: Vec<Box<dyn SnapshotSink>>,
    cancel: CancelToken,
    phase: BattlePhase,

    /// Index of the current (or next) round
    round: u32,

    /// Robots banned for the rest of the battle, by id
    banned: Vec<bool>,

    /// Workers that outlived their round; their robots sit out until they exit
    stuck: BTreeMap<RobotId, JoinHandle<()>>,

    active: Option<ActiveRound>,
    board: ScoreBoard,
    aborted: bool,
}

impl Battle {
    /// Creates a battle with one factory per roster entry, in roster order.
    pub fn new(config: BattleConfig, factories: Vec<RobotFactory>) -> Result<Self, EngineError> {
        config.validate()?;
        if factories.len() != config.roster.len() {
            return Err(EngineError::config(format!(
                "roster has {} robots but {} factories were given",
                config.roster.len(),
                factories.len()
            )));
        }

        let names: Vec<String> = config.roster.iter().map(|e| e.name.clone()).collect();
        Ok(Self {
            board: ScoreBoard::new(&names),
            banned: vec![false; names.len()],
            names,
            factories,
            sinks: Vec::new(),
            cancel: CancelToken::new(),
            phase: BattlePhase::RoundStarting,
            round: 0,
            stuck: BTreeMap::new(),
            active: None,
            aborted: false,
            config,
        })
    }

    /// Creates a battle whose roster names refer to the reference robots.
    pub fn with_bots(config: BattleConfig) -> Result<Self, EngineError> {
        let names: Vec<&str> = config.roster.iter().map(|e| e.name.as_str()).collect();
        let factories = bots::resolve(&names)?;
        Self::new(config, factories)
    }

    /// Adds a snapshot consumer.
    pub fn with_sink(mut self, sink: impl SnapshotSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Uses an externally created cancel token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops this battle.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Workers from finished rounds that are still running.
    pub fn stuck_workers(&self) -> usize {
        self.stuck.values().filter(|h| !h.is_finished()).count()
    }

    /// Advances the state machine by one step (one turn while a round runs).
    ///
    /// A stop request is honored before deploying or running a turn. A round
    /// that already ended is still committed.
    pub fn step(&mut self) -> Result<BattlePhase, EngineError> {
        if self.cancel.is_cancelled() && matches!(self.phase, BattlePhase::RoundStarting | BattlePhase::RoundRunning) {
            self.abort();
            return Ok(self.phase);
        }

        self.phase = match self.phase {
            BattlePhase::RoundStarting => self.start_round()?,
            BattlePhase::RoundRunning => self.run_turn()?,
            BattlePhase::RoundEnding => self.end_round()?,
            BattlePhase::BattleEnding | BattlePhase::Finished => BattlePhase::Finished,
        };
        Ok(self.phase)
    }

    /// Runs every remaining step and returns the results.
    pub fn run(&mut self) -> Result<BattleResults, EngineError> {
        info!(
            "Battle: {} robots, {} rounds, seed={}",
            self.names.len(),
            self.config.rounds,
            self.config.seed
        );

        while self.step()? != BattlePhase::Finished {}

        let results = self.results();
        match results.winner() {
            Some(w) if !results.aborted => info!("Battle over: {} wins with {:.1} points", w.name, w.total_score),
            _ if results.aborted => warn!("Battle stopped after {} rounds", self.board.rounds_played()),
            _ => info!("Battle over: no winner"),
        }
        Ok(results)
    }

    /// Results of the rounds finished so far.
    pub fn results(&self) -> BattleResults {
        self.board.results(self.aborted)
    }

    fn start_round(&mut self) -> Result<BattlePhase, EngineError> {
        let mut world = World::new(self.round, &self.config, &self.banned)?;
        let mut scheduler = TurnScheduler::new(self.config.limits);

        self.stuck.retain(|_, handle| !handle.is_finished());
        let alive: Vec<(RobotId, String)> = world
            .peers()
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| (p.id, p.name.clone()))
            .collect();
        for (id, name) in alive {
            if self.stuck.contains_key(&id) {
                warn!("{} still running from an earlier round, sitting this one out", name);
                world.disable(id, DisableReason::Unresponsive);
                continue;
            }
            let factory = self.factories[id.index()].clone();
            scheduler.spawn(id, &name, factory)?;
        }
        let scoring = RoundScoring::new(self.round, &self.names, &self.config.rules, &self.banned);

        info!(
            "Round {}/{} started with {} robots",
            self.round + 1,
            self.config.rounds,
            scheduler.worker_count()
        );

        let snapshot = world.snapshot();
        self.emit(&snapshot);
        self.active = Some(ActiveRound {
            world,
            scheduler,
            scoring,
        });
        Ok(BattlePhase::RoundRunning)
    }

    fn run_turn(&mut self) -> Result<BattlePhase, EngineError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(BattlePhase::RoundStarting);
        };

        let report = active.scheduler.run_turn(&mut active.world)?;
        let snapshot = report.snapshot;
        active.scoring.record_turn(snapshot.turn, &snapshot.events);

        if !report.skipped.is_empty() {
            debug!(
                turn = snapshot.turn,
                skipped = ?report.skipped,
                barrier = ?report.barrier_time,
                "turn resolved with skips"
            );
        }
        for event in &snapshot.events {
            if let BattleEvent::RobotBanned { robot, capability } = event {
                warn!("{} banned for the battle (requested {})", self.names[robot.index()], capability);
                self.banned[robot.index()] = true;
            }
        }

        let round_final = snapshot.round_final;
        self.emit(&snapshot);
        Ok(if round_final {
            BattlePhase::RoundEnding
        } else {
            BattlePhase::RoundRunning
        })
    }

    fn end_round(&mut self) -> Result<BattlePhase, EngineError> {
        let Some(ActiveRound {
            world,
            mut scheduler,
            scoring,
        }) = self.active.take()
        else {
            return Ok(BattlePhase::RoundStarting);
        };
        self.stuck.extend(scheduler.shutdown());

        let score = scoring.finish(world.turn());
        match score.winner {
            Some(w) => info!(
                "Round {} over after {} turns: {} survives",
                self.round + 1,
                score.turns,
                self.names[w.index()]
            ),
            None if score.stalemate => info!("Round {} over after {} turns: stalemate", self.round + 1, score.turns),
            None => info!("Round {} over after {} turns: no survivors", self.round + 1, score.turns),
        }

        for sink in &mut self.sinks {
            sink.on_round_end(&score);
        }
        self.board.add_round(score);

        self.round += 1;
        Ok(if self.round < self.config.rounds {
            BattlePhase::RoundStarting
        } else {
            BattlePhase::BattleEnding
        })
    }

    /// Stops the running round; its partial scores are discarded.
    fn abort(&mut self) {
        if let Some(mut active) = self.active.take() {
            info!("Stopping round {} at turn {}", self.round + 1, active.world.turn());
            let stuck = active.scheduler.shutdown();
            self.stuck.extend(stuck);
        }
        self.aborted = true;
        self.phase = BattlePhase::BattleEnding;
    }

    fn emit(&mut self, snapshot: &TurnSnapshot) {
        for sink in &mut self.sinks {
            sink.on_snapshot(snapshot);
        }
    }
}
