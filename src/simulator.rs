//! Single randomized playout of a candidate move against the opponent oracle.

use chess::{ChessMove, Color};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::oracle::OpponentOracle;
use crate::rules::{Position, Termination};

/// Result of a finished simulation, always from the learner's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "WIN",
            Outcome::Draw => "DRAW",
            Outcome::Loss => "LOSS",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capture made during a playout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEvent {
    #[serde(rename = "move")]
    pub notation: String,
    pub value: i32,
}

/// Tactical events collected while a playout runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TacticalTrace {
    #[serde(default)]
    pub captures_by_us: Vec<CaptureEvent>,
    #[serde(default)]
    pub captures_by_opponent: Vec<CaptureEvent>,
    /// Learner material balance at the end minus the balance right after the first move
    #[serde(default)]
    pub material_balance_change: i32,
    #[serde(default)]
    pub checks_given: u32,
    #[serde(default)]
    pub checks_received: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<Termination>,
}

/// Playout parameters
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Ply count (first move included) at which the game is scored as a draw
    pub depth_cap: u32,
    /// Probability that the learner plays a random capture when one exists
    pub capture_bias: f64,
    /// Thinking time granted to the oracle per reply
    pub oracle_budget: Duration,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            depth_cap: 200,
            capture_bias: 0.3,
            oracle_budget: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub outcome: Outcome,
    pub ply_count: u32,
    pub trace: TacticalTrace,
}

/// Play `first_move` from `start`, then alternate random learner moves and
/// oracle replies until the game ends or `depth_cap` plies have been played.
pub fn simulate<R: Rng + ?Sized>(
    start: &Position,
    first_move: ChessMove,
    learner: Color,
    oracle: &mut dyn OpponentOracle,
    settings: &SimulationSettings,
    rng: &mut R,
) -> SimulationResult {
    let mut trace = TacticalTrace::default();

    // Only plies after the first move are traced
    let mut position = start.apply(first_move);
    let mut ply_count: u32 = 1;
    let initial_balance = position.material_balance(learner);

    while !position.is_game_over() && ply_count < settings.depth_cap {
        let legal_moves = position.legal_moves();
        if legal_moves.is_empty() {
            break;
        }

        let learner_to_move = position.side_to_move() == learner;
        let chess_move = if learner_to_move {
            choose_learner_move(&position, &legal_moves, settings.capture_bias, rng)
        } else {
            match oracle.best_reply(&position, settings.oracle_budget) {
                Ok(reply) if position.is_legal(reply) => reply,
                Ok(reply) => {
                    debug!(
                        oracle = oracle.name(),
                        reply = %reply,
                        "oracle reply is illegal, playing random move"
                    );
                    random_move(&legal_moves, rng)
                }
                Err(e) => {
                    debug!(
                        oracle = oracle.name(),
                        error = %e,
                        "oracle reply unavailable, playing random move"
                    );
                    random_move(&legal_moves, rng)
                }
            }
        };

        if position.is_capture(chess_move) {
            let event = CaptureEvent {
                notation: position.to_notation(chess_move),
                value: position.captured_value(chess_move),
            };
            if learner_to_move {
                trace.captures_by_us.push(event);
            } else {
                trace.captures_by_opponent.push(event);
            }
        }

        position = position.apply(chess_move);

        if position.is_check() {
            if learner_to_move {
                trace.checks_given += 1;
            } else {
                trace.checks_received += 1;
            }
        }

        ply_count += 1;
    }

    trace.material_balance_change = position.material_balance(learner) - initial_balance;

    let termination = position.termination();
    let outcome = match termination {
        Some(Termination::Checkmate) => {
            // The side to move is the one that got mated
            let winner = !position.side_to_move();
            if winner == learner {
                Outcome::Win
            } else {
                Outcome::Loss
            }
        }
        _ => Outcome::Draw,
    };
    trace.termination = Some(termination.unwrap_or(Termination::DepthCap));

    debug!(
        first_move = %first_move,
        outcome = outcome.as_str(),
        plies = ply_count,
        "simulation finished"
    );

    SimulationResult {
        outcome,
        ply_count,
        trace,
    }
}

fn choose_learner_move<R: Rng + ?Sized>(
    position: &Position,
    legal_moves: &[ChessMove],
    capture_bias: f64,
    rng: &mut R,
) -> ChessMove {
    let captures: Vec<ChessMove> = legal_moves
        .iter()
        .copied()
        .filter(|&m| position.is_capture(m))
        .collect();

    if !captures.is_empty() && rng.gen_bool(capture_bias) {
        random_move(&captures, rng)
    } else {
        random_move(legal_moves, rng)
    }
}

/// Uniform pick from a non-empty slice
fn random_move<R: Rng + ?Sized>(moves: &[ChessMove], rng: &mut R) -> ChessMove {
    moves[rng.gen_range(0..moves.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OfflineOracle, OracleError};
    use crate::rules::move_from_id;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Oracle that always answers with the first legal move
    struct FirstMoveOracle;

    impl OpponentOracle for FirstMoveOracle {
        fn name(&self) -> &str {
            "first-move"
        }

        fn best_reply(
            &mut self,
            position: &Position,
            _budget: Duration,
        ) -> Result<ChessMove, OracleError> {
            position
                .legal_moves()
                .first()
                .copied()
                .ok_or(OracleError::Unavailable)
        }
    }

    fn settings(depth_cap: u32) -> SimulationSettings {
        SimulationSettings {
            depth_cap,
            ..SimulationSettings::default()
        }
    }

    #[test]
    fn test_immediate_mate_is_a_win() {
        let position = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let result = simulate(
            &position,
            move_from_id("a1a8").unwrap(),
            Color::White,
            &mut OfflineOracle,
            &settings(200),
            &mut rng,
        );

        assert_eq!(result.outcome, Outcome::Win);
        assert_eq!(result.ply_count, 1);
        assert_eq!(result.trace.checks_given, 0);
        assert_eq!(result.trace.termination, Some(Termination::Checkmate));
    }

    #[test]
    fn test_offline_oracle_terminates_within_cap() {
        let mut rng = StdRng::seed_from_u64(42);
        for cap in [1, 10, 60] {
            let result = simulate(
                &Position::default(),
                move_from_id("e2e4").unwrap(),
                Color::White,
                &mut OfflineOracle,
                &settings(cap),
                &mut rng,
            );
            assert!(result.ply_count <= cap.max(1));
            if result.trace.termination == Some(Termination::DepthCap) {
                assert_eq!(result.outcome, Outcome::Draw);
                assert_eq!(result.ply_count, cap.max(1));
            }
        }
    }

    #[test]
    fn test_seeded_playouts_are_reproducible() {
        let run = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            simulate(
                &Position::default(),
                move_from_id("d2d4").unwrap(),
                Color::White,
                &mut FirstMoveOracle,
                &settings(120),
                &mut rng,
            )
        };

        let first = run(1234);
        let second = run(1234);
        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.ply_count, second.ply_count);
        assert_eq!(first.trace, second.trace);
    }

    #[test]
    fn test_first_move_not_traced() {
        let position = Position::from_fen("4k3/8/8/3n4/8/8/8/3RK3 w - - 0 1").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let result = simulate(
            &position,
            move_from_id("d1d5").unwrap(),
            Color::White,
            &mut OfflineOracle,
            &settings(1),
            &mut rng,
        );

        // The opening capture is neither listed nor part of the swing
        assert!(result.trace.captures_by_us.is_empty());
        assert_eq!(result.trace.checks_given, 0);
        assert_eq!(result.trace.material_balance_change, 0);
        assert_eq!(result.outcome, Outcome::Draw);
    }

    #[test]
    fn test_learner_playing_black_can_lose() {
        // After Kh8 the back rank is sealed and Ra8 mates
        let position = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 b - - 0 1").unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        struct MatingOracle;
        impl OpponentOracle for MatingOracle {
            fn name(&self) -> &str {
                "mating"
            }
            fn best_reply(
                &mut self,
                position: &Position,
                _budget: Duration,
            ) -> Result<ChessMove, OracleError> {
                let mate = move_from_id("a1a8").unwrap();
                if position.is_legal(mate) {
                    Ok(mate)
                } else {
                    Err(OracleError::Unavailable)
                }
            }
        }

        let result = simulate(
            &position,
            move_from_id("g8h8").unwrap(),
            Color::Black,
            &mut MatingOracle,
            &settings(200),
            &mut rng,
        );

        assert_eq!(result.outcome, Outcome::Loss);
        assert_eq!(result.ply_count, 2);
        assert_eq!(result.trace.checks_received, 1);
    }

    const PAWN_TRADE: &str = "4k3/8/8/3p4/2P1P3/8/8/4K3 w - - 0 1";

    #[test]
    fn test_full_capture_bias_always_captures() {
        let position = Position::from_fen(PAWN_TRADE).unwrap();
        let legal_moves = position.legal_moves();
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..100 {
            let chosen = choose_learner_move(&position, &legal_moves, 1.0, &mut rng);
            assert!(position.is_capture(chosen));
        }
    }

    #[test]
    fn test_zero_capture_bias_picks_uniformly() {
        let position = Position::from_fen(PAWN_TRADE).unwrap();
        let legal_moves = position.legal_moves();
        let mut rng = StdRng::seed_from_u64(5);

        let mut captures = 0;
        let mut quiet = 0;
        for _ in 0..200 {
            let chosen = choose_learner_move(&position, &legal_moves, 0.0, &mut rng);
            assert!(legal_moves.contains(&chosen));
            if position.is_capture(chosen) {
                captures += 1;
            } else {
                quiet += 1;
            }
        }

        assert!(captures > 0);
        assert!(quiet > captures);
    }

    #[test]
    fn test_capture_bias_without_captures_plays_any_move() {
        let position = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let legal_moves = position.legal_moves();
        let mut rng = StdRng::seed_from_u64(5);

        let chosen = choose_learner_move(&position, &legal_moves, 1.0, &mut rng);
        assert!(legal_moves.contains(&chosen));
    }
}
