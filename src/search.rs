//! Memory-guided move search for a single position.
//!
//! Each call to [`LearnerSession::find_move`] analyses the position, checks
//! the move memory, then spends its attempt budget on simulations: ranked
//! tactical candidates first, then untried legal moves, then the best
//! retry-eligible moves already in memory. The first simulated win ends the
//! search; otherwise the draw with the most accumulated material is returned.

use chess::{ChessMove, Color};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};

use crate::config::LearnerConfig;
use crate::errors::Result;
use crate::memory::StatisticsStore;
use crate::oracle::OpponentOracle;
use crate::position_key::{color_name, PositionKey};
use crate::rules::{move_from_id, move_id, Position};
use crate::simulator::{simulate, Outcome};
use crate::tactics::{TacticalAnalysis, TacticalAnalyzer};

/// Where a searched move came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveSource {
    Memory,
    Priority,
    Untried,
    Retry,
}

impl MoveSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveSource::Memory => "MEMORY",
            MoveSource::Priority => "PRIORITY",
            MoveSource::Untried => "UNTRIED",
            MoveSource::Retry => "RETRY",
        }
    }
}

impl fmt::Display for MoveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Win,
    Draw,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Win => f.write_str("WIN"),
            Verdict::Draw => f.write_str("DRAW"),
        }
    }
}

/// The move a search settled on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub move_id: String,
    pub notation: String,
    pub verdict: Verdict,
    pub source: MoveSource,
}

/// One simulated attempt of a search
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    pub move_id: String,
    pub notation: String,
    pub source: MoveSource,
    pub is_capture: bool,
    /// Wins, draws and losses recorded for the move before this attempt
    pub prior: (u32, u32, u32),
    pub outcome: Outcome,
    pub plies: u32,
    pub captures: usize,
    pub material_change: i32,
}

#[derive(Debug, Clone)]
pub struct SearchReport {
    pub key: PositionKey,
    pub analysis: TacticalAnalysis,
    pub attempts: Vec<AttemptRecord>,
    pub recommendation: Option<Recommendation>,
}

impl SearchReport {
    pub fn found_win(&self) -> bool {
        matches!(
            self.recommendation,
            Some(Recommendation {
                verdict: Verdict::Win,
                ..
            })
        )
    }
}

/// Learning session bound to one position and one learner colour
pub struct LearnerSession {
    position: Position,
    learner: Color,
    config: LearnerConfig,
    oracle: Box<dyn OpponentOracle>,
    store: StatisticsStore,
    rng: StdRng,
}

impl LearnerSession {
    /// The learner must be the side to move in `position`.
    pub fn new(
        position: Position,
        learner: Color,
        config: LearnerConfig,
        oracle: Box<dyn OpponentOracle>,
        store: StatisticsStore,
    ) -> Result<Self> {
        config.validate()?;
        check_learner_to_move(&position, learner)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            position,
            learner,
            config,
            oracle,
            store,
            rng,
        })
    }

    pub fn set_position(&mut self, position: Position, learner: Color) -> Result<()> {
        check_learner_to_move(&position, learner)?;
        self.position = position;
        self.learner = learner;
        Ok(())
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    pub fn position_key(&self) -> PositionKey {
        PositionKey::encode(&self.position, self.learner)
    }

    pub fn analyze(&self) -> TacticalAnalysis {
        TacticalAnalyzer::new(self.learner).analyze(&self.position)
    }

    pub fn store(&self) -> &StatisticsStore {
        &self.store
    }

    pub fn into_store(self) -> StatisticsStore {
        self.store
    }

    /// Search for a winning (or failing that, drawing) move within `max_attempts` simulations
    pub fn find_move(&mut self, max_attempts: u32) -> SearchReport {
        let key = self.position_key();
        let analysis = self.analyze();
        info!(
            strategy = analysis.strategy.as_str(),
            threats = analysis.threats.len(),
            in_check = analysis.king_in_check,
            "position analysed"
        );

        let mut report = SearchReport {
            key: key.clone(),
            analysis,
            attempts: Vec::new(),
            recommendation: None,
        };

        // Draw to fall back on, tracked by move id so material is read from the live record
        let mut best_draw: Option<(String, MoveSource)> = None;

        if let Some((best_id, record)) = self.store.best_move(&key) {
            if record.wins > 0 {
                info!(notation = %record.notation, "winning move found in memory");
                report.recommendation = Some(Recommendation {
                    move_id: best_id.to_string(),
                    notation: record.notation.clone(),
                    verdict: Verdict::Win,
                    source: MoveSource::Memory,
                });
                return report;
            }

            if report.analysis.strategy.is_defensive() {
                info!(
                    notation = %record.notation,
                    "best memorised move has no win, searching for an escape"
                );
            } else if record.draws > 0 {
                info!(
                    notation = %record.notation,
                    "drawing move found in memory, searching for a win"
                );
                best_draw = Some((best_id.to_string(), MoveSource::Memory));
            }
        }

        let mut priority: VecDeque<ChessMove> = report
            .analysis
            .priority_moves(self.config.priority_limit)
            .into();
        let settings = self.config.simulation_settings();

        for attempt in 1..=max_attempts {
            let (chess_move, source) = match self.next_candidate(&key, &mut priority) {
                Some(candidate) => candidate,
                None => {
                    info!(attempts = attempt - 1, "no moves left worth trying");
                    break;
                }
            };

            let id = move_id(chess_move);
            let notation = self.position.to_notation(chess_move);
            let prior = self
                .store
                .record(&key, &id)
                .map_or((0, 0, 0), |r| (r.wins, r.draws, r.losses));
            let is_capture = self.position.is_capture(chess_move);

            let result = simulate(
                &self.position,
                chess_move,
                self.learner,
                self.oracle.as_mut(),
                &settings,
                &mut self.rng,
            );

            let captures = result.trace.captures_by_us.len();
            let material_change = result.trace.material_balance_change;
            self.store.record_outcome(
                &key,
                &id,
                &notation,
                result.outcome,
                result.ply_count,
                result.trace,
            );

            info!(
                attempt,
                notation = %notation,
                source = source.as_str(),
                outcome = result.outcome.as_str(),
                plies = result.ply_count,
                captures,
                material = material_change,
                "attempt finished"
            );

            report.attempts.push(AttemptRecord {
                attempt,
                move_id: id.clone(),
                notation: notation.clone(),
                source,
                is_capture,
                prior,
                outcome: result.outcome,
                plies: result.ply_count,
                captures,
                material_change,
            });

            match result.outcome {
                Outcome::Win => {
                    report.recommendation = Some(Recommendation {
                        move_id: id,
                        notation,
                        verdict: Verdict::Win,
                        source,
                    });
                    return report;
                }
                Outcome::Draw => {
                    let replace = match &best_draw {
                        None => true,
                        Some((best_id, _)) => {
                            self.material_gained(&key, &id) > self.material_gained(&key, best_id)
                        }
                    };
                    if replace {
                        debug!(notation = %notation, "new best draw");
                        best_draw = Some((id, source));
                    }
                }
                Outcome::Loss => {}
            }
        }

        report.recommendation = best_draw.and_then(|(id, source)| {
            self.store.record(&key, &id).map(|record| Recommendation {
                move_id: id.clone(),
                notation: record.notation.clone(),
                verdict: Verdict::Draw,
                source,
            })
        });

        if report.recommendation.is_none() {
            info!(
                learner = color_name(self.learner),
                "no winning or drawing move found"
            );
        }

        report
    }

    /// Untried priority move, then random untried move, then best retry-eligible move
    fn next_candidate(
        &mut self,
        key: &PositionKey,
        priority: &mut VecDeque<ChessMove>,
    ) -> Option<(ChessMove, MoveSource)> {
        let records = self.store.records(key);
        let is_untried =
            |m: &ChessMove| records.map_or(true, |moves| !moves.contains_key(&move_id(*m)));

        let untried: Vec<ChessMove> = self
            .position
            .legal_moves()
            .into_iter()
            .filter(|m| is_untried(m))
            .collect();

        if !untried.is_empty() {
            if let Some(index) = priority.iter().position(|m| untried.contains(m)) {
                if let Some(chess_move) = priority.remove(index) {
                    return Some((chess_move, MoveSource::Priority));
                }
            }
            let chess_move = untried[self.rng.gen_range(0..untried.len())];
            return Some((chess_move, MoveSource::Untried));
        }

        let threshold = self.config.retry_trial_threshold;
        let mut best: Option<(&str, f64)> = None;
        for (id, record) in records? {
            if !record.should_retry_after(threshold) {
                continue;
            }
            let score = record.score();
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((id.as_str(), score));
            }
        }

        let (id, _) = best?;
        match move_from_id(id) {
            Ok(chess_move) if self.position.is_legal(chess_move) => {
                Some((chess_move, MoveSource::Retry))
            }
            _ => {
                debug!(move_id = id, "memorised move is not legal here, skipping retries");
                None
            }
        }
    }

    fn material_gained(&self, key: &PositionKey, id: &str) -> i64 {
        self.store
            .record(key, id)
            .map_or(0, |record| record.total_material_gained)
    }
}

fn check_learner_to_move(position: &Position, learner: Color) -> Result<()> {
    if position.side_to_move() != learner {
        return Err(crate::config_error!(
            "learner plays {} but {} is to move in {}",
            color_name(learner),
            color_name(position.side_to_move()),
            position.fen()
        ));
    }
    Ok(())
}
