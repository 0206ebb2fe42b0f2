//! Tactical analysis that biases which moves the search tries first.
//!
//! Everything here looks exactly one ply ahead: threats against the learner's
//! king, forcing attacks (mate, check, winning capture) and defensive replies.
//! The hanging-piece estimate in [`TacticalAnalyzer::rank_defenses`] only
//! compares direct attackers and defenders of the destination square.

use chess::{ChessMove, Color, Piece, Square};
use std::fmt;

use crate::rules::{piece_value, Position};

/// Priority of a move that delivers mate
pub const CHECKMATE_PRIORITY: i32 = 10_000;
/// Base priority of a checking move (material gained is added on top)
pub const CHECK_PRIORITY: i32 = 5_000;
/// Bonus for a defence that gets the king out of check
pub const CHECK_REMOVAL_BONUS: i32 = 10_000;
/// Bonus per attacker removed from the king
pub const THREAT_REDUCTION_BONUS: i32 = 1_000;
/// Smallest capture (in centipawns) worth switching to a capture strategy
pub const CAPTURE_STRATEGY_THRESHOLD: i32 = 300;

/// Opposing piece that attacks the learner's king
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreatRecord {
    pub attacker: Piece,
    pub attacker_square: Square,
    pub king_square: Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackKind {
    Checkmate,
    Check,
    Capture,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::Checkmate => "checkmate",
            AttackKind::Check => "check",
            AttackKind::Capture => "capture",
        }
    }
}

/// One-move attacking candidate
#[derive(Debug, Clone)]
pub struct AttackSequence {
    pub chess_move: ChessMove,
    pub kind: AttackKind,
    pub material_gain: i32,
    pub priority: i32,
}

/// One-move defensive candidate
#[derive(Debug, Clone)]
pub struct DefenseSequence {
    pub chess_move: ChessMove,
    pub removes_check: bool,
    pub threats_reduced: i32,
    pub material_cost: i32,
    pub priority: i32,
}

/// Recommended plan for the position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Attack,
    Defend,
    CounterAttack,
    Checkmate,
    Capture,
    Positional,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Attack => "attack",
            Strategy::Defend => "defend",
            Strategy::CounterAttack => "counter_attack",
            Strategy::Checkmate => "checkmate",
            Strategy::Capture => "capture",
            Strategy::Positional => "positional",
        }
    }

    /// Strategies reached because the learner's king is under fire
    pub fn is_defensive(&self) -> bool {
        matches!(self, Strategy::Defend | Strategy::CounterAttack)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full tactical picture of a position
#[derive(Debug, Clone)]
pub struct TacticalAnalysis {
    pub king_in_check: bool,
    pub threats: Vec<ThreatRecord>,
    pub material_balance: i32,
    pub attacks: Vec<AttackSequence>,
    /// Only computed when the king is in danger
    pub defenses: Vec<DefenseSequence>,
    pub strategy: Strategy,
}

impl TacticalAnalysis {
    pub fn in_danger(&self) -> bool {
        self.king_in_check || !self.threats.is_empty()
    }

    /// Moves the search should try first, best first
    pub fn priority_moves(&self, limit: usize) -> Vec<ChessMove> {
        match self.strategy {
            Strategy::Defend => self
                .defenses
                .iter()
                .take(limit)
                .map(|d| d.chess_move)
                .collect(),
            Strategy::Attack
            | Strategy::Checkmate
            | Strategy::Capture
            | Strategy::CounterAttack => self
                .attacks
                .iter()
                .take(limit)
                .map(|a| a.chess_move)
                .collect(),
            Strategy::Positional => Vec::new(),
        }
    }
}

/// One-ply tactical analyzer for a fixed learner colour
#[derive(Debug, Clone, Copy)]
pub struct TacticalAnalyzer {
    learner: Color,
}

impl TacticalAnalyzer {
    pub fn new(learner: Color) -> Self {
        Self { learner }
    }

    /// Every opposing piece attacking the learner's king
    pub fn detect_threats(&self, position: &Position) -> Vec<ThreatRecord> {
        threats_against(position, self.learner)
    }

    /// Mates, checks and winning captures available to the side to move,
    /// best first. Ties keep move-generation order.
    pub fn rank_attacks(&self, position: &Position) -> Vec<AttackSequence> {
        let mut sequences: Vec<AttackSequence> = position
            .legal_moves()
            .into_iter()
            .filter_map(|chess_move| {
                let material_gain = position.captured_value(chess_move);
                let after = position.apply(chess_move);

                let (kind, priority) = if after.is_checkmate() {
                    (AttackKind::Checkmate, CHECKMATE_PRIORITY)
                } else if after.is_check() {
                    (AttackKind::Check, CHECK_PRIORITY + material_gain)
                } else if position.is_capture(chess_move) && material_gain > 0 {
                    (AttackKind::Capture, material_gain)
                } else {
                    return None;
                };

                Some(AttackSequence {
                    chess_move,
                    kind,
                    material_gain,
                    priority,
                })
            })
            .collect();

        sequences.sort_by(|a, b| b.priority.cmp(&a.priority));
        sequences
    }

    /// Every legal move scored as a defence of the mover's king, best first.
    /// Ties keep move-generation order.
    pub fn rank_defenses(&self, position: &Position) -> Vec<DefenseSequence> {
        let defender = position.side_to_move();
        let in_check = position.is_check();
        let threats_before = threats_against(position, defender).len() as i32;

        let mut defenses: Vec<DefenseSequence> = position
            .legal_moves()
            .into_iter()
            .map(|chess_move| {
                let after = position.apply(chess_move);
                let threats_after = threats_against(&after, defender).len() as i32;

                // Capturing while defending lowers the cost
                let mut material_cost = -position.captured_value(chess_move);

                if !after.is_game_over() {
                    if let Some(moved) = position.moved_piece(chess_move) {
                        let dest = chess_move.get_dest();
                        if after.is_attacked_by(!defender, dest)
                            && !after.is_attacked_by(defender, dest)
                        {
                            material_cost += piece_value(moved);
                        }
                    }
                }

                let removes_check = in_check && !after.is_check();
                let threats_reduced = threats_before - threats_after;

                let mut priority = threats_reduced * THREAT_REDUCTION_BONUS - material_cost;
                if removes_check {
                    priority += CHECK_REMOVAL_BONUS;
                }

                DefenseSequence {
                    chess_move,
                    removes_check,
                    threats_reduced,
                    material_cost,
                    priority,
                }
            })
            .collect();

        defenses.sort_by(|a, b| b.priority.cmp(&a.priority));
        defenses
    }

    /// Threats, attack and defence rankings, and the resulting strategy
    pub fn analyze(&self, position: &Position) -> TacticalAnalysis {
        let king_in_check = position.is_check() && position.side_to_move() == self.learner;
        let threats = self.detect_threats(position);
        let attacks = self.rank_attacks(position);
        let in_danger = king_in_check || !threats.is_empty();

        let defenses = if in_danger {
            self.rank_defenses(position)
        } else {
            Vec::new()
        };

        let strategy = choose_strategy(in_danger, &attacks, &defenses);

        TacticalAnalysis {
            king_in_check,
            threats,
            material_balance: position.material_balance(self.learner),
            attacks,
            defenses,
            strategy,
        }
    }

    pub fn recommend(&self, position: &Position) -> Strategy {
        self.analyze(position).strategy
    }
}

fn threats_against(position: &Position, color: Color) -> Vec<ThreatRecord> {
    let king_square = match position.king_square(color) {
        Some(square) => square,
        None => return Vec::new(),
    };

    position
        .attackers_of(!color, king_square)
        .into_iter()
        .filter_map(|square| {
            position.board().piece_on(square).map(|attacker| ThreatRecord {
                attacker,
                attacker_square: square,
                king_square,
            })
        })
        .collect()
}

fn choose_strategy(
    in_danger: bool,
    attacks: &[AttackSequence],
    defenses: &[DefenseSequence],
) -> Strategy {
    let best_attack = attacks.first();

    if in_danger {
        return match best_attack {
            Some(attack) if attack.kind == AttackKind::Checkmate => Strategy::Attack,
            _ if !defenses.is_empty() => Strategy::Defend,
            _ => Strategy::CounterAttack,
        };
    }

    match best_attack {
        Some(attack) if attack.kind == AttackKind::Checkmate => Strategy::Checkmate,
        Some(attack) if attack.kind == AttackKind::Check => Strategy::Attack,
        Some(attack) if attack.material_gain >= CAPTURE_STRATEGY_THRESHOLD => Strategy::Capture,
        _ => Strategy::Positional,
    }
}
