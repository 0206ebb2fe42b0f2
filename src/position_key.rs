use chess::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::Position;

/// Identity of a (position, learner colour) pair in the move memory.
///
/// Built from the first four FEN fields (placement, side to move, castling
/// rights, en-passant target) followed by `|playing_as_<colour>`. Move
/// counters are left out so transpositions with different clocks share
/// one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(String);

impl PositionKey {
    pub fn encode(position: &Position, learner: Color) -> Self {
        let fen = position.board().to_string();
        let placement: Vec<&str> = fen.split_whitespace().take(4).collect();
        PositionKey(format!(
            "{}|playing_as_{}",
            placement.join(" "),
            color_name(learner)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PositionKey {
    fn from(raw: &str) -> Self {
        PositionKey(raw.to_string())
    }
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_position_key() {
        let key = PositionKey::encode(&Position::default(), Color::White);
        assert_eq!(
            key.as_str(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -|playing_as_white"
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let position = Position::from_fen("start").unwrap();
        let first = PositionKey::encode(&position, Color::Black);
        let second = PositionKey::encode(&position.clone(), Color::Black);
        assert_eq!(first, second);
    }

    #[test]
    fn test_learner_colour_distinguishes_keys() {
        let position = Position::default();
        assert_ne!(
            PositionKey::encode(&position, Color::White),
            PositionKey::encode(&position, Color::Black)
        );
    }

    #[test]
    fn test_side_to_move_distinguishes_keys() {
        let white = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let black = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 b - - 0 1").unwrap();
        assert_ne!(
            PositionKey::encode(&white, Color::White),
            PositionKey::encode(&black, Color::White)
        );
    }

    #[test]
    fn test_move_counters_ignored() {
        let early = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 0 1").unwrap();
        let late = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 37 60").unwrap();
        assert_eq!(
            PositionKey::encode(&early, Color::White),
            PositionKey::encode(&late, Color::White)
        );
    }
}
