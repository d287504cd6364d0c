//! Snapshot sinks and the JSON replay exporter.
//!
//! The orchestrator pushes every resolved turn into its sinks. A
//! [`ReplayRecorder`] buffers the whole battle and writes it out as one JSON
//! document for external viewers.

use robowar_core::{BattleConfig, BattleResults, EngineError, RoundScore, TurnSnapshot};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

/// Consumer of the turn snapshot stream.
pub trait SnapshotSink: Send {
    /// Called once per resolved turn, and once with turn 0 after deployment.
    fn on_snapshot(&mut self, snapshot: &TurnSnapshot);

    /// Called after a round's scores are final.
    fn on_round_end(&mut self, _score: &RoundScore) {}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Collects snapshots in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    snapshots: Arc<Mutex<Vec<TurnSnapshot>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything received so far.
    pub fn snapshots(&self) -> Vec<TurnSnapshot> {
        lock(&self.snapshots).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.snapshots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotSink for VecSink {
    fn on_snapshot(&mut self, snapshot: &TurnSnapshot) {
        lock(&self.snapshots).push(snapshot.clone());
    }
}

/// Complete battle replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Seed used
    pub seed: u64,

    /// Configuration the battle ran with
    pub config: BattleConfig,

    /// Every snapshot in play order
    pub snapshots: Vec<TurnSnapshot>,

    /// Round scores in play order
    pub rounds: Vec<RoundScore>,

    /// Final results, once the battle is over
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<BattleResults>,
}

impl Replay {
    /// Creates an empty replay container.
    pub fn new(config: &BattleConfig) -> Self {
        Self {
            seed: config.seed,
            config: config.clone(),
            snapshots: Vec::new(),
            rounds: Vec::new(),
            results: None,
        }
    }

    /// Serializes the replay as pretty JSON.
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Export(e.to_string()))
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), EngineError> {
        let json = self.to_json()?;
        let mut file = File::create(path).map_err(|e| EngineError::Export(format!("{}: {}", path, e)))?;
        file.write_all(json.as_bytes())
            .map_err(|e| EngineError::Export(format!("{}: {}", path, e)))?;
        Ok(())
    }
}

/// Buffers a whole battle for export. Clones share the same replay.
#[derive(Debug, Clone)]
pub struct ReplayRecorder {
    replay: Arc<Mutex<Replay>>,
}

impl ReplayRecorder {
    pub fn new(config: &BattleConfig) -> Self {
        Self {
            replay: Arc::new(Mutex::new(Replay::new(config))),
        }
    }

    /// Attaches the final results.
    pub fn finalize(&self, results: &BattleResults) {
        lock(&self.replay).results = Some(results.clone());
    }

    /// Copies out the replay recorded so far.
    pub fn replay(&self) -> Replay {
        lock(&self.replay).clone()
    }

    /// Number of buffered snapshots.
    pub fn frame_count(&self) -> usize {
        lock(&self.replay).snapshots.len()
    }

    /// Writes the replay to a JSON file.
    pub fn write_to_file(&self, path: &str) -> Result<(), EngineError> {
        lock(&self.replay).write_to_file(path)
    }
}

impl SnapshotSink for ReplayRecorder {
    fn on_snapshot(&mut self, snapshot: &TurnSnapshot) {
        lock(&self.replay).snapshots.push(snapshot.clone());
    }

    fn on_round_end(&mut self, score: &RoundScore) {
        lock(&self.replay).rounds.push(score.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(turn: u64) -> TurnSnapshot {
        TurnSnapshot {
            round: 0,
            turn,
            robots: Vec::new(),
            bullets: Vec::new(),
            events: Vec::new(),
            round_final: false,
        }
    }

    #[test]
    fn test_vec_sink_shares_buffer() {
        let sink = VecSink::new();
        let mut writer = sink.clone();
        writer.on_snapshot(&snapshot(0));
        writer.on_snapshot(&snapshot(1));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.snapshots()[1].turn, 1);
    }

    #[test]
    fn test_recorder_writes_json() {
        let config = BattleConfig::with_robots(["a", "b"]).with_seed(9);
        let recorder = ReplayRecorder::new(&config);
        let mut sink = recorder.clone();
        sink.on_snapshot(&snapshot(0));
        sink.on_snapshot(&snapshot(1));
        assert_eq!(recorder.frame_count(), 2);

        let path = std::env::temp_dir().join(format!("robowar-replay-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();
        recorder.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Replay = serde_json::from_str(&text).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(parsed.seed, 9);
        assert_eq!(parsed.config.roster.len(), 2);
        assert_eq!(parsed.snapshots.len(), 2);
        assert!(parsed.results.is_none());
    }

    #[test]
    fn test_write_to_bad_path_is_export_error() {
        let recorder = ReplayRecorder::new(&BattleConfig::default());
        let err = recorder.write_to_file("/nonexistent-dir/replay.json").unwrap_err();
        assert!(matches!(err, EngineError::Export(_)));
    }
}
