//! Scoring Engine: turns in-round events into scores and placements.
//!
//! A [`RoundScoring`] is fed every turn's events while the round runs and
//! produces a [`RoundScore`] when it ends. A [`ScoreBoard`] accumulates round
//! scores into the final [`BattleResults`].

use crate::events::{BattleEvent, DeathCause};
use crate::rules::Rules;
use robowar_api::RobotId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// SCORE COMPONENTS
// ============================================================================

/// The parts a robot's score is made of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Points for outliving opponents
    pub survival: f64,

    /// Points for being alone at the end of a round
    pub last_survivor_bonus: f64,

    /// Bullet damage dealt
    pub bullet_damage: f64,

    /// Bonus for bullet kills
    pub bullet_kill_bonus: f64,

    /// Points for damage dealt while ramming
    pub ram_damage: f64,

    /// Bonus for ram kills
    pub ram_kill_bonus: f64,
}

impl ScoreComponents {
    pub fn total(&self) -> f64 {
        self.survival
            + self.last_survivor_bonus
            + self.bullet_damage
            + self.bullet_kill_bonus
            + self.ram_damage
            + self.ram_kill_bonus
    }

    fn accumulate(&mut self, other: &ScoreComponents) {
        self.survival += other.survival;
        self.last_survivor_bonus += other.last_survivor_bonus;
        self.bullet_damage += other.bullet_damage;
        self.bullet_kill_bonus += other.bullet_kill_bonus;
        self.ram_damage += other.ram_damage;
        self.ram_kill_bonus += other.ram_kill_bonus;
    }
}

/// Ordinal suffix used in results tables: `1st`, `2nd`, `3rd`, `4th`.
///
/// Numbers from 4 to 19 always take `th`; every other number is suffixed by
/// its last digit, so 111 reads `111st`.
pub fn placement_string(place: u32) -> String {
    let suffix = if place > 3 && place < 20 {
        "th"
    } else {
        match place % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{}{}", place, suffix)
}

// ============================================================================
// ROUND SCORING
// ============================================================================

/// One robot's result for a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEntry {
    pub id: RobotId,
    pub name: String,
    pub components: ScoreComponents,
    pub total: f64,

    /// Still in the arena when the round ended
    pub survived: bool,

    /// Survival placement within the round (1 = winner)
    pub place: u32,

    /// Banned in or before this round
    pub disqualified: bool,
}

/// Result of a single round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundScore {
    pub round: u32,

    /// Turns played
    pub turns: u64,

    /// Sole survivor, if any
    pub winner: Option<RobotId>,

    /// Ended on the turn ceiling with several robots alive
    pub stalemate: bool,

    /// One entry per roster robot, in id order
    pub entries: Vec<RoundEntry>,
}

/// Live score tracking for one round.
#[derive(Debug, Clone)]
pub struct RoundScoring {
    round: u32,
    rules: Rules,
    names: Vec<String>,
    participants: usize,
    alive: Vec<bool>,
    disqualified: Vec<bool>,
    scores: Vec<ScoreComponents>,

    /// `[shooter][victim]` bullet damage this round
    bullet_dealt: Vec<Vec<f64>>,

    /// `[rammer][victim]` ram damage this round
    ram_dealt: Vec<Vec<f64>>,

    /// Elimination turn per robot, for round placement
    eliminated_at: Vec<Option<u64>>,
}

impl RoundScoring {
    /// Starts scoring a round. Robots in `banned` are not deployed.
    pub fn new(round: u32, names: &[String], rules: &Rules, banned: &[bool]) -> Self {
        let n = names.len();
        let deployed: Vec<bool> = (0..n).map(|i| !banned.get(i).copied().unwrap_or(false)).collect();
        Self {
            round,
            rules: rules.clone(),
            names: names.to_vec(),
            participants: deployed.iter().filter(|d| **d).count(),
            alive: deployed,
            disqualified: (0..n).map(|i| banned.get(i).copied().unwrap_or(false)).collect(),
            scores: vec![ScoreComponents::default(); n],
            bullet_dealt: vec![vec![0.0; n]; n],
            ram_dealt: vec![vec![0.0; n]; n],
            eliminated_at: vec![None; n],
        }
    }

    /// Scores one resolved turn's events.
    ///
    /// Robots eliminated in the same turn do not outlive each other.
    pub fn record_turn(&mut self, turn: u64, events: &[BattleEvent]) {
        let mut eliminated = Vec::new();

        for event in events {
            if let Some(robot) = event.eliminated() {
                eliminated.push(robot);
            }
            match *event {
                BattleEvent::BulletHit { owner, victim, damage, .. } => {
                    self.scores[owner.index()].bullet_damage += damage;
                    self.bullet_dealt[owner.index()][victim.index()] += damage;
                }
                BattleEvent::RobotsCollided {
                    a,
                    b,
                    a_at_fault,
                    b_at_fault,
                    damage,
                } => {
                    if a_at_fault {
                        self.record_ram(a, b, damage);
                    }
                    if b_at_fault {
                        self.record_ram(b, a, damage);
                    }
                }
                BattleEvent::RobotDied { robot, cause } => self.record_kill(robot, cause),
                BattleEvent::RobotBanned { robot, .. } => self.disqualified[robot.index()] = true,
                _ => {}
            }
        }

        eliminated.sort();
        eliminated.dedup();
        eliminated.retain(|id| self.alive[id.index()]);
        for id in &eliminated {
            self.alive[id.index()] = false;
            self.eliminated_at[id.index()] = Some(turn);
        }
        for _ in &eliminated {
            for (i, alive) in self.alive.iter().enumerate() {
                if *alive {
                    self.scores[i].survival += self.rules.survival_score;
                }
            }
        }
    }

    fn record_ram(&mut self, rammer: RobotId, victim: RobotId, damage: f64) {
        self.scores[rammer.index()].ram_damage += self.rules.ram_score_factor * damage;
        self.ram_dealt[rammer.index()][victim.index()] += damage;
    }

    fn record_kill(&mut self, victim: RobotId, cause: DeathCause) {
        match cause {
            DeathCause::Bullet { shooter } if shooter != victim => {
                let dealt = self.bullet_dealt[shooter.index()][victim.index()];
                self.scores[shooter.index()].bullet_kill_bonus += self.rules.bullet_kill_bonus * dealt;
            }
            DeathCause::Ram { rammer: Some(rammer) } if rammer != victim => {
                let dealt = self.ram_dealt[rammer.index()][victim.index()];
                self.scores[rammer.index()].ram_kill_bonus += self.rules.ram_kill_bonus * dealt;
            }
            _ => {}
        }
    }

    /// Robots still alive in this round's scoring.
    pub fn survivors(&self) -> Vec<RobotId> {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, a)| **a)
            .map(|(i, _)| RobotId(i as u32))
            .collect()
    }

    /// Current round score of a robot.
    pub fn score(&self, id: RobotId) -> Option<&ScoreComponents> {
        self.scores.get(id.index())
    }

    /// Closes the round: applies the last-survivor bonus and ranks robots.
    pub fn finish(mut self, turns: u64) -> RoundScore {
        let survivors = self.survivors();
        let winner = if survivors.len() == 1 { Some(survivors[0]) } else { None };
        if let Some(w) = winner {
            let opponents = self.participants.saturating_sub(1) as f64;
            self.scores[w.index()].last_survivor_bonus += self.rules.last_survivor_bonus * opponents;
        }

        let mut entries: Vec<RoundEntry> = (0..self.names.len())
            .map(|i| RoundEntry {
                id: RobotId(i as u32),
                name: self.names[i].clone(),
                components: self.scores[i],
                total: self.scores[i].total(),
                survived: self.alive[i],
                place: 0,
                disqualified: self.disqualified[i],
            })
            .collect();

        // Survivors first, then later eliminations, then round score
        let mut order: Vec<usize> = (0..entries.len()).collect();
        order.sort_by(|&a, &b| {
            let key = |i: usize| self.eliminated_at[i].map_or(u64::MAX, |t| t);
            entries[a]
                .disqualified
                .cmp(&entries[b].disqualified)
                .then_with(|| key(b).cmp(&key(a)))
                .then_with(|| entries[b].total.total_cmp(&entries[a].total))
                .then_with(|| a.cmp(&b))
        });
        for (place, idx) in order.into_iter().enumerate() {
            entries[idx].place = place as u32 + 1;
        }

        RoundScore {
            round: self.round,
            turns,
            winner,
            stalemate: survivors.len() > 1,
            entries,
        }
    }
}

// ============================================================================
// BATTLE RESULTS
// ============================================================================

/// One robot's standing after the battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotResult {
    /// 1-based rank
    pub rank: u32,

    /// Rank as shown in results tables (`1st`, `2nd`, ...)
    pub placement: String,

    pub id: RobotId,
    pub name: String,
    pub total_score: f64,
    pub components: ScoreComponents,
    pub firsts: u32,
    pub seconds: u32,
    pub thirds: u32,
    pub rounds_survived: u32,

    /// Banned for a capability violation
    pub disqualified: bool,
}

/// Final results of a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleResults {
    /// Robots in rank order
    pub robots: Vec<RobotResult>,

    /// Per-round scores in play order
    pub rounds: Vec<RoundScore>,

    /// Set when the battle was stopped before its last round finished
    pub aborted: bool,
}

impl BattleResults {
    /// Result for a robot name.
    pub fn robot(&self, name: &str) -> Option<&RobotResult> {
        self.robots.iter().find(|r| r.name == name)
    }

    /// The top-ranked robot.
    pub fn winner(&self) -> Option<&RobotResult> {
        self.robots.first().filter(|r| !r.disqualified)
    }
}

/// Accumulates round scores across a battle.
#[derive(Debug, Clone)]
pub struct ScoreBoard {
    names: Vec<String>,
    totals: Vec<ScoreComponents>,
    places: Vec<[u32; 3]>,
    survived: Vec<u32>,
    disqualified: Vec<bool>,
    rounds: Vec<RoundScore>,
}

impl ScoreBoard {
    pub fn new(names: &[String]) -> Self {
        let n = names.len();
        Self {
            names: names.to_vec(),
            totals: vec![ScoreComponents::default(); n],
            places: vec![[0; 3]; n],
            survived: vec![0; n],
            disqualified: vec![false; n],
            rounds: Vec::new(),
        }
    }

    /// Adds a finished round.
    pub fn add_round(&mut self, round: RoundScore) {
        for entry in &round.entries {
            let i = entry.id.index();
            self.totals[i].accumulate(&entry.components);
            if entry.survived {
                self.survived[i] += 1;
            }
            if entry.disqualified {
                self.disqualified[i] = true;
            } else if (1..=3).contains(&entry.place) {
                self.places[i][entry.place as usize - 1] += 1;
            }
        }
        self.rounds.push(round);
    }

    /// Rounds added so far.
    pub fn rounds_played(&self) -> usize {
        self.rounds.len()
    }

    /// Ranks robots and produces the final results.
    pub fn results(&self, aborted: bool) -> BattleResults {
        let mut order: Vec<usize> = (0..self.names.len()).collect();
        order.sort_by(|&a, &b| self.compare(a, b));

        let robots = order
            .into_iter()
            .enumerate()
            .map(|(rank, i)| {
                let rank = rank as u32 + 1;
                RobotResult {
                    rank,
                    placement: placement_string(rank),
                    id: RobotId(i as u32),
                    name: self.names[i].clone(),
                    total_score: self.totals[i].total(),
                    components: self.totals[i],
                    firsts: self.places[i][0],
                    seconds: self.places[i][1],
                    thirds: self.places[i][2],
                    rounds_survived: self.survived[i],
                    disqualified: self.disqualified[i],
                }
            })
            .collect();

        BattleResults {
            robots,
            rounds: self.rounds.clone(),
            aborted,
        }
    }

    /// Placement order: disqualified last, then total score, rounds
    /// survived and bullet damage (all descending), then id.
    fn compare(&self, a: usize, b: usize) -> Ordering {
        self.disqualified[a]
            .cmp(&self.disqualified[b])
            .then_with(|| self.totals[b].total().total_cmp(&self.totals[a].total()))
            .then_with(|| self.survived[b].cmp(&self.survived[a]))
            .then_with(|| self.totals[b].bullet_damage.total_cmp(&self.totals[a].bullet_damage))
            .then_with(|| a.cmp(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::DisableReason;
    use approx::assert_relative_eq;

    const A: RobotId = RobotId(0);
    const B: RobotId = RobotId(1);
    const C: RobotId = RobotId(2);

    fn names(n: usize) -> Vec<String> {
        ["alpha", "bravo", "charlie", "delta"][..n].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_placement_strings() {
        let cases = [
            (1, "1st"),
            (2, "2nd"),
            (3, "3rd"),
            (4, "4th"),
            (11, "11th"),
            (12, "12th"),
            (13, "13th"),
            (20, "20th"),
            (21, "21st"),
            (22, "22nd"),
            (23, "23rd"),
            (111, "111st"),
            (112, "112nd"),
            (113, "113rd"),
        ];
        for (n, expected) in cases {
            assert_eq!(placement_string(n), expected);
        }
    }

    #[test]
    fn test_bullet_damage_then_ram_kill() {
        let rules = Rules::default();
        let names = names(2);
        let mut round = RoundScoring::new(0, &names, &rules, &[false, false]);

        for turn in 1..=5 {
            round.record_turn(
                turn,
                &[BattleEvent::BulletHit {
                    bullet: turn,
                    owner: A,
                    victim: B,
                    damage: 4.0,
                }],
            );
        }
        round.record_turn(
            6,
            &[
                BattleEvent::RobotsCollided {
                    a: A,
                    b: B,
                    a_at_fault: true,
                    b_at_fault: false,
                    damage: 0.6,
                },
                BattleEvent::RobotDied {
                    robot: B,
                    cause: DeathCause::Ram { rammer: Some(A) },
                },
            ],
        );

        let score = round.finish(6);
        let a = &score.entries[0];
        let b = &score.entries[1];

        assert_eq!(score.winner, Some(A));
        assert!(!score.stalemate);
        assert_relative_eq!(a.components.bullet_damage, 20.0);
        assert_relative_eq!(a.components.survival, 50.0);
        assert_relative_eq!(a.components.last_survivor_bonus, 10.0);
        assert_relative_eq!(a.components.ram_damage, 1.2, epsilon = 1e-9);
        assert_relative_eq!(a.components.ram_kill_bonus, 0.18, epsilon = 1e-9);
        assert_relative_eq!(b.components.total(), 0.0);
        assert!(!b.survived);
        assert_eq!((a.place, b.place), (1, 2));

        let mut board = ScoreBoard::new(&names);
        board.add_round(score);
        let results = board.results(false);
        assert_eq!(results.robots[0].name, "alpha");
        assert_eq!(results.robots[0].placement, "1st");
        assert_eq!(results.robots[1].placement, "2nd");
        assert_eq!(results.robots[0].firsts, 1);
        assert_eq!(results.robots[1].seconds, 1);
        assert_eq!(results.robots[0].rounds_survived, 1);
    }

    #[test]
    fn test_bullet_kill_bonus() {
        let rules = Rules::default();
        let mut round = RoundScoring::new(0, &names(3), &rules, &[false; 3]);
        round.record_turn(
            1,
            &[
                BattleEvent::BulletHit {
                    bullet: 1,
                    owner: C,
                    victim: B,
                    damage: 16.0,
                },
                BattleEvent::RobotDied {
                    robot: B,
                    cause: DeathCause::Bullet { shooter: C },
                },
            ],
        );

        let c = round.score(C).copied().unwrap_or_default();
        assert_relative_eq!(c.bullet_kill_bonus, 3.2, epsilon = 1e-9);
        assert_relative_eq!(c.survival, 50.0);
        assert_relative_eq!(round.score(A).map(|s| s.survival).unwrap_or(0.0), 50.0);
    }

    #[test]
    fn test_simultaneous_deaths_do_not_outlive_each_other() {
        let rules = Rules::default();
        let mut round = RoundScoring::new(0, &names(3), &rules, &[false; 3]);
        round.record_turn(
            9,
            &[
                BattleEvent::RobotDied { robot: A, cause: DeathCause::Wall },
                BattleEvent::RobotDied { robot: B, cause: DeathCause::Wall },
            ],
        );

        let score = round.finish(9);
        assert_relative_eq!(score.entries[0].components.survival, 0.0);
        assert_relative_eq!(score.entries[1].components.survival, 0.0);
        assert_relative_eq!(score.entries[2].components.survival, 100.0);
        assert_relative_eq!(score.entries[2].components.last_survivor_bonus, 20.0);
        assert_eq!(score.winner, Some(C));
    }

    #[test]
    fn test_stalemate_gives_no_last_survivor_bonus() {
        let rules = Rules::default();
        let mut round = RoundScoring::new(0, &names(3), &rules, &[false; 3]);
        round.record_turn(
            3,
            &[BattleEvent::RobotDisabled {
                robot: C,
                reason: DisableReason::SkippedTurns,
            }],
        );

        let score = round.finish(100);
        assert!(score.stalemate);
        assert_eq!(score.winner, None);
        assert!(score.entries.iter().all(|e| e.components.last_survivor_bonus == 0.0));
        assert_relative_eq!(score.entries[0].components.survival, 50.0);
    }

    #[test]
    fn test_banned_robot_ranks_last() {
        let rules = Rules::default();
        let names = names(3);
        let mut round = RoundScoring::new(0, &names, &rules, &[false; 3]);
        round.record_turn(
            1,
            &[BattleEvent::BulletHit {
                bullet: 1,
                owner: A,
                victim: B,
                damage: 12.0,
            }],
        );
        round.record_turn(
            2,
            &[BattleEvent::RobotBanned {
                robot: A,
                capability: "network".into(),
            }],
        );

        let mut board = ScoreBoard::new(&names);
        board.add_round(round.finish(50));

        // Not deployed in the next round
        let next = RoundScoring::new(1, &names, &rules, &[true, false, false]);
        assert_eq!(next.survivors(), vec![B, C]);
        board.add_round(next.finish(50));

        let results = board.results(false);
        let last = &results.robots[2];
        assert_eq!(last.name, "alpha");
        assert!(last.disqualified);
        assert_relative_eq!(last.components.bullet_damage, 12.0);
        assert_eq!(results.winner().map(|r| r.name.as_str()), Some("bravo"));
    }

    #[test]
    fn test_rank_tie_breakers() {
        let names = names(3);
        let mut board = ScoreBoard::new(&names);
        let entry = |id: u32, survived: bool, bullet: f64, survival: f64| RoundEntry {
            id: RobotId(id),
            name: names[id as usize].clone(),
            components: ScoreComponents {
                survival,
                bullet_damage: bullet,
                ..Default::default()
            },
            total: survival + bullet,
            survived,
            place: 0,
            disqualified: false,
        };
        board.add_round(RoundScore {
            round: 0,
            turns: 10,
            winner: None,
            stalemate: true,
            entries: vec![
                entry(0, false, 50.0, 0.0),
                entry(1, true, 0.0, 50.0),
                entry(2, true, 0.0, 50.0),
            ],
        });

        let results = board.results(false);
        let order: Vec<&str> = results.robots.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["bravo", "charlie", "alpha"]);
    }
}
