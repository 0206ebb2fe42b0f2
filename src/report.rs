//! Plain-text renderers for the command-line report. Every function returns
//! a `String`; printing is left to the caller.

use chess::Color;

use crate::config::LearnerConfig;
use crate::memory::{MoveRecord, OutcomeEntry, StatisticsStore};
use crate::position_key::{color_name, PositionKey};
use crate::rules::{piece_name, Position};
use crate::search::{AttemptRecord, Recommendation, Verdict};
use crate::simulator::{CaptureEvent, Outcome};
use crate::tactics::TacticalAnalysis;

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

pub fn position_banner(position: &Position, learner: Color, config: &LearnerConfig) -> String {
    [
        RULE.to_string(),
        "CHESS MOVE LEARNER".to_string(),
        RULE.to_string(),
        format!("Position: {}", position.fen()),
        format!("Playing as: {}", color_name(learner)),
        format!(
            "Max depth: {} plies | Max attempts: {}",
            config.depth_cap, config.max_attempts
        ),
        format!("Memory: {}", config.memory_path.display()),
        RULE.to_string(),
    ]
    .join("\n")
}

pub fn analysis_summary(analysis: &TacticalAnalysis, position: &Position) -> String {
    let mut lines = vec![
        "TACTICAL ANALYSIS".to_string(),
        THIN_RULE.to_string(),
        format!("King in check: {}", yes_no(analysis.king_in_check)),
        format!("Material balance: {:+}", analysis.material_balance),
    ];

    if analysis.threats.is_empty() {
        lines.push("Threats to king: none".to_string());
    } else {
        lines.push(format!("Threats to king: {}", analysis.threats.len()));
        for threat in &analysis.threats {
            lines.push(format!(
                "  {} on {} attacks king on {}",
                piece_name(threat.attacker),
                threat.attacker_square,
                threat.king_square
            ));
        }
    }

    if !analysis.attacks.is_empty() {
        lines.push(format!("Attacking moves: {}", analysis.attacks.len()));
        for attack in analysis.attacks.iter().take(3) {
            lines.push(format!(
                "  {} ({}, material {:+}, priority {})",
                position.to_notation(attack.chess_move),
                attack.kind.as_str(),
                attack.material_gain,
                attack.priority
            ));
        }
    }

    if !analysis.defenses.is_empty() {
        lines.push(format!("Defensive moves: {}", analysis.defenses.len()));
        for defense in analysis.defenses.iter().take(3) {
            lines.push(format!(
                "  {} (removes check: {}, threats reduced: {}, cost {}, priority {})",
                position.to_notation(defense.chess_move),
                yes_no(defense.removes_check),
                defense.threats_reduced,
                defense.material_cost,
                defense.priority
            ));
        }
    }

    lines.push(format!("Strategy: {}", analysis.strategy.as_str().to_uppercase()));
    lines.join("\n")
}

/// Winning, drawing and losing playouts recorded for one move
pub fn move_sequences(record: &MoveRecord) -> String {
    let mut lines = vec![
        RULE.to_string(),
        format!("MOVE SEQUENCES FOR: {}", record.notation),
        RULE.to_string(),
    ];

    if record.results.is_empty() {
        lines.push("No sequence data available yet.".to_string());
        return lines.join("\n");
    }

    let by_result = |outcome: Outcome| {
        record
            .results
            .iter()
            .filter(move |r| r.result == outcome)
            .collect::<Vec<&OutcomeEntry>>()
    };
    let wins = by_result(Outcome::Win);
    let mut draws = by_result(Outcome::Draw);
    let losses = by_result(Outcome::Loss);

    if !wins.is_empty() {
        lines.push(format!("WINNING SEQUENCES ({}):", wins.len()));
        lines.push(THIN_RULE.to_string());
        for (i, entry) in wins.iter().take(5).enumerate() {
            let info = &entry.tactical_info;
            lines.push(format!(
                "  {}. Win in {} moves | Captures: {} | Material: {:+}",
                i + 1,
                entry.move_count,
                info.captures_by_us.len(),
                info.material_balance_change
            ));
            if !info.captures_by_us.is_empty() {
                lines.push(format!("     Key captures: {}", capture_list(&info.captures_by_us)));
            }
        }
    }

    if !draws.is_empty() {
        draws.sort_by(|a, b| {
            b.tactical_info
                .material_balance_change
                .cmp(&a.tactical_info.material_balance_change)
        });
        lines.push(format!("DRAWING SEQUENCES ({}):", draws.len()));
        lines.push(THIN_RULE.to_string());
        for (i, entry) in draws.iter().take(5).enumerate() {
            let info = &entry.tactical_info;
            let ending = info
                .termination
                .map(|t| format!(" ({})", t.describe()))
                .unwrap_or_default();
            lines.push(format!(
                "  {}. Draw in {} moves{} | Captures: {} | Material: {:+}",
                i + 1,
                entry.move_count,
                ending,
                info.captures_by_us.len(),
                info.material_balance_change
            ));
            if !info.captures_by_us.is_empty() {
                lines.push(format!("     Captures: {}", capture_list(&info.captures_by_us)));
            }
        }
    }

    if !losses.is_empty() {
        let average =
            losses.iter().map(|l| f64::from(l.move_count)).sum::<f64>() / losses.len() as f64;
        lines.push(format!("LOSING SEQUENCES ({}):", losses.len()));
        lines.push(THIN_RULE.to_string());
        lines.push(format!("  Average loss in {:.1} moves", average));
    }

    lines.push(RULE.to_string());
    lines.join("\n")
}

fn capture_list(captures: &[CaptureEvent]) -> String {
    captures
        .iter()
        .take(3)
        .map(|c| format!("{}({})", c.notation, c.value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-move statistics for every move tested from `key`
pub fn detailed_statistics(
    store: &StatisticsStore,
    key: &PositionKey,
    position: &Position,
) -> String {
    let mut lines = vec![
        RULE.to_string(),
        "DETAILED STATISTICS".to_string(),
        RULE.to_string(),
    ];

    let moves = match store.records(key) {
        Some(moves) if !moves.is_empty() => moves,
        _ => {
            lines.push("No moves have been tested yet for this position.".to_string());
            lines.push(RULE.to_string());
            return lines.join("\n");
        }
    };

    let tested = moves.len();
    let simulations: u32 = moves.values().map(MoveRecord::total).sum();

    let mut winning: Vec<&MoveRecord> = moves.values().filter(|r| r.wins > 0).collect();
    let mut drawing: Vec<&MoveRecord> = moves.values().filter(|r| r.draws > 0).collect();
    let mut losing: Vec<&MoveRecord> = moves.values().filter(|r| r.losses > 0).collect();

    // Most wins, then fastest, then most material
    winning.sort_by(|a, b| {
        b.wins
            .cmp(&a.wins)
            .then(a.min_moves_to_win.cmp(&b.min_moves_to_win))
            .then(b.total_material_gained.cmp(&a.total_material_gained))
    });
    drawing.sort_by(|a, b| {
        b.total_material_gained
            .cmp(&a.total_material_gained)
            .then(b.draws.cmp(&a.draws))
    });
    losing.sort_by(|a, b| b.loss_rate().total_cmp(&a.loss_rate()));

    lines.push(format!(
        "Moves tested: {}/{}",
        tested,
        position.legal_moves().len()
    ));
    lines.push(format!("Total simulations run: {}", simulations));
    lines.push(format!("Winning moves: {}/{}", winning.len(), tested));
    lines.push(format!("Drawing moves: {}/{}", drawing.len(), tested));
    lines.push(format!("Losing moves: {}/{}", losing.len(), tested));

    if !winning.is_empty() {
        lines.push(THIN_RULE.to_string());
        lines.push("WINNING MOVES:".to_string());
        for (i, record) in winning.iter().enumerate() {
            lines.push(format!(
                "{}. Move: {:<6} | Wins: {}/{} ({:.1}%) | {}",
                i + 1,
                record.notation,
                record.wins,
                record.total(),
                record.win_rate() * 100.0,
                speed_and_material(record, record.min_moves_to_win)
            ));
        }
    }

    if !drawing.is_empty() {
        lines.push(THIN_RULE.to_string());
        lines.push("DRAWING MOVES (sorted by material advantage):".to_string());
        for (i, record) in drawing.iter().enumerate() {
            lines.push(format!(
                "{}. Move: {:<6} | Draws: {}/{} ({:.1}%) | {}",
                i + 1,
                record.notation,
                record.draws,
                record.total(),
                record.draw_rate() * 100.0,
                speed_and_material(record, record.min_moves_to_draw)
            ));
        }
    }

    if !losing.is_empty() {
        lines.push(THIN_RULE.to_string());
        lines.push("LOSING MOVES:".to_string());
        for (i, record) in losing.iter().enumerate() {
            lines.push(format!(
                "{}. Move: {:<6} | Losses: {}/{} ({:.1}%)",
                i + 1,
                record.notation,
                record.losses,
                record.total(),
                record.loss_rate() * 100.0
            ));
        }
    }

    lines.push(RULE.to_string());
    lines.join("\n")
}

fn plies(min_moves: Option<u32>) -> String {
    min_moves.map_or_else(|| "-".to_string(), |n| n.to_string())
}

fn speed_and_material(record: &MoveRecord, fastest: Option<u32>) -> String {
    format!(
        "Fastest: {} moves | Captures: {} | Material: {:+}",
        plies(fastest),
        record.total_captures,
        record.total_material_gained
    )
}

pub fn attempt_line(attempt: &AttemptRecord, max_attempts: u32) -> String {
    let mut line = format!(
        "Attempt {}/{}: {} ({})",
        attempt.attempt,
        max_attempts,
        attempt.notation,
        attempt.source.as_str()
    );
    if attempt.is_capture {
        line.push_str(" CAPTURE");
    }
    let (wins, draws, losses) = attempt.prior;
    if wins + draws + losses > 0 {
        line.push_str(&format!(" [History: W:{} D:{} L:{}]", wins, draws, losses));
    }
    line.push_str(&format!(
        "\n  Result: {} in {} moves | Captures: {} | Material: {:+}",
        attempt.outcome, attempt.plies, attempt.captures, attempt.material_change
    ));
    line
}

pub fn recommendation_line(recommendation: Option<&Recommendation>) -> String {
    match recommendation {
        Some(rec) => match rec.verdict {
            Verdict::Win => format!(
                "FOUND WINNING MOVE: {} ({}, {})",
                rec.notation, rec.move_id, rec.source
            ),
            Verdict::Draw => format!(
                "BEST MOVE FOUND: {} ({}, DRAW, {})",
                rec.notation, rec.move_id, rec.source
            ),
        },
        None => "NO WINNING OR DRAWING MOVE FOUND".to_string(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
