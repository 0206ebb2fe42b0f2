//! Chess rules helpers used by the analyzer, the simulator and the search loop.
//!
//! Move generation and attack tables come from the `chess` crate. `chess::Board`
//! carries neither a half-move clock nor a position history, so [`Position`]
//! tracks both to detect fifty-move and threefold-repetition draws.
//! Human-readable notation is produced through `shakmaty`.

use chess::{BitBoard, Board, BoardStatus, ChessMove, Color, MoveGen, Piece, Square, EMPTY};
use serde::{Deserialize, Serialize};
use shakmaty::{fen::Fen, san::SanPlus, uci::Uci, CastlingMode, Chess};
use std::str::FromStr;

use crate::errors::{LearnerError, Result};
use crate::invalid_position;

/// FEN of the standard starting position
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Light squares (b1, d1, ..., a2, c2, ...)
const LIGHT_SQUARES: BitBoard = BitBoard(0x55AA_55AA_55AA_55AA);

/// Material value of a piece in centipawns. The king is priceless and counts as zero.
pub fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 100,
        Piece::Knight => 320,
        Piece::Bishop => 330,
        Piece::Rook => 500,
        Piece::Queen => 900,
        Piece::King => 0,
    }
}

/// Lowercase piece name used in reports
pub fn piece_name(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "pawn",
        Piece::Knight => "knight",
        Piece::Bishop => "bishop",
        Piece::Rook => "rook",
        Piece::Queen => "queen",
        Piece::King => "king",
    }
}

/// Canonical move identifier (coordinate form such as `e2e4` or `e7e8q`)
pub fn move_id(chess_move: ChessMove) -> String {
    chess_move.to_string()
}

/// Parse a coordinate move identifier. Legality is not checked here.
pub fn move_from_id(id: &str) -> Result<ChessMove> {
    let id = id.trim();
    if !id.is_ascii() || !(4..=5).contains(&id.len()) {
        return Err(LearnerError::InvalidMove(format!("malformed move id '{}'", id)));
    }

    let source = Square::from_str(&id[0..2])
        .map_err(|_| LearnerError::InvalidMove(format!("bad source square in '{}'", id)))?;
    let dest = Square::from_str(&id[2..4])
        .map_err(|_| LearnerError::InvalidMove(format!("bad destination square in '{}'", id)))?;

    let promotion = match id.as_bytes().get(4) {
        None => None,
        Some(b'q') => Some(Piece::Queen),
        Some(b'r') => Some(Piece::Rook),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'n') => Some(Piece::Knight),
        Some(_) => {
            return Err(LearnerError::InvalidMove(format!(
                "bad promotion piece in '{}'",
                id
            )))
        }
    };

    Ok(ChessMove::new(source, dest, promotion))
}

/// Why a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMoves,
    Repetition,
    /// Simulation stopped at the ply cap without a decisive result
    DepthCap,
}

impl Termination {
    pub fn describe(&self) -> &'static str {
        match self {
            Termination::Checkmate => "checkmate",
            Termination::Stalemate => "stalemate",
            Termination::InsufficientMaterial => "insufficient material",
            Termination::FiftyMoves => "fifty-move rule",
            Termination::Repetition => "threefold repetition",
            Termination::DepthCap => "depth cap",
        }
    }
}

/// Board state plus the move counters and history needed for draw detection
#[derive(Debug, Clone)]
pub struct Position {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
    /// Hashes of every position since the last pawn move or capture, current one last
    history: Vec<u64>,
}

impl Default for Position {
    fn default() -> Self {
        Self::from_board(Board::default())
    }
}

impl Position {
    /// Wrap a board with fresh counters
    pub fn from_board(board: Board) -> Self {
        Self {
            board,
            halfmove_clock: 0,
            fullmove_number: 1,
            history: vec![board.get_hash()],
        }
    }

    /// Parse a FEN string. The literal `start` (any case) selects the initial position.
    pub fn from_fen(fen: &str) -> Result<Self> {
        let fen = fen.trim();
        let fen = if fen.eq_ignore_ascii_case("start") {
            START_FEN
        } else {
            fen
        };

        let board = Board::from_str(fen).map_err(|e| invalid_position!("{} ({})", fen, e))?;

        let mut fields = fen.split_whitespace().skip(4);
        let halfmove_clock = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let fullmove_number = fields
            .next()
            .and_then(|s| s.parse().ok())
            .filter(|n: &u32| *n > 0)
            .unwrap_or(1);

        Ok(Self {
            board,
            halfmove_clock,
            fullmove_number,
            history: vec![board.get_hash()],
        })
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Full FEN with this position's own move counters
    pub fn fen(&self) -> String {
        let board_fen = self.board.to_string();
        let fields: Vec<&str> = board_fen.split_whitespace().take(4).collect();
        format!(
            "{} {} {}",
            fields.join(" "),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board).collect()
    }

    pub fn is_legal(&self, chess_move: ChessMove) -> bool {
        self.board.legal(chess_move)
    }

    fn is_en_passant(&self, chess_move: ChessMove) -> bool {
        self.board.piece_on(chess_move.get_source()) == Some(Piece::Pawn)
            && chess_move.get_source().get_file() != chess_move.get_dest().get_file()
            && self.board.piece_on(chess_move.get_dest()).is_none()
    }

    /// Whether the move takes a piece, en passant included
    pub fn is_capture(&self, chess_move: ChessMove) -> bool {
        self.board.piece_on(chess_move.get_dest()).is_some() || self.is_en_passant(chess_move)
    }

    /// Kind of piece taken by the move; en passant resolves to a pawn
    pub fn captured_piece(&self, chess_move: ChessMove) -> Option<Piece> {
        match self.board.piece_on(chess_move.get_dest()) {
            Some(piece) => Some(piece),
            None if self.is_en_passant(chess_move) => Some(Piece::Pawn),
            None => None,
        }
    }

    pub fn captured_value(&self, chess_move: ChessMove) -> i32 {
        self.captured_piece(chess_move).map_or(0, piece_value)
    }

    pub fn moved_piece(&self, chess_move: ChessMove) -> Option<Piece> {
        self.board.piece_on(chess_move.get_source())
    }

    /// Squares attacked by the piece standing on `square` (empty if the square is empty)
    pub fn attacks_from(&self, square: Square) -> BitBoard {
        let (piece, color) = match (self.board.piece_on(square), self.board.color_on(square)) {
            (Some(piece), Some(color)) => (piece, color),
            _ => return EMPTY,
        };
        let occupied = *self.board.combined();

        match piece {
            Piece::Pawn => chess::get_pawn_attacks(square, color, !EMPTY),
            Piece::Knight => chess::get_knight_moves(square),
            Piece::Bishop => chess::get_bishop_moves(square, occupied),
            Piece::Rook => chess::get_rook_moves(square, occupied),
            Piece::Queen => {
                chess::get_bishop_moves(square, occupied) | chess::get_rook_moves(square, occupied)
            }
            Piece::King => chess::get_king_moves(square),
        }
    }

    /// Squares holding pieces of `color` that attack `target`
    pub fn attackers_of(&self, color: Color, target: Square) -> Vec<Square> {
        let target_bb = BitBoard::from_square(target);
        (*self.board.color_combined(color))
            .into_iter()
            .filter(|&square| self.attacks_from(square) & target_bb != EMPTY)
            .collect()
    }

    pub fn is_attacked_by(&self, color: Color, target: Square) -> bool {
        !self.attackers_of(color, target).is_empty()
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        let kings = *self.board.pieces(Piece::King) & *self.board.color_combined(color);
        if kings == EMPTY {
            None
        } else {
            Some(kings.to_square())
        }
    }

    /// Whether the side to move is in check
    pub fn is_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    pub fn is_checkmate(&self) -> bool {
        self.board.status() == BoardStatus::Checkmate
    }

    pub fn is_stalemate(&self) -> bool {
        self.board.status() == BoardStatus::Stalemate
    }

    /// Neither side can ever mate: bare kings, a single minor piece, or
    /// bishops that all share one square colour.
    pub fn is_insufficient_material(&self) -> bool {
        let heavy = *self.board.pieces(Piece::Pawn)
            | *self.board.pieces(Piece::Rook)
            | *self.board.pieces(Piece::Queen);
        if heavy != EMPTY {
            return false;
        }

        let knights = *self.board.pieces(Piece::Knight);
        let bishops = *self.board.pieces(Piece::Bishop);
        if (knights | bishops).popcnt() <= 1 {
            return true;
        }

        knights == EMPTY && (bishops & LIGHT_SQUARES == EMPTY || bishops & !LIGHT_SQUARES == EMPTY)
    }

    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100 && !self.is_checkmate()
    }

    pub fn is_threefold_repetition(&self) -> bool {
        let current = self.board.get_hash();
        self.history.iter().filter(|&&hash| hash == current).count() >= 3
    }

    /// First terminal condition that applies, if any
    pub fn termination(&self) -> Option<Termination> {
        match self.board.status() {
            BoardStatus::Checkmate => return Some(Termination::Checkmate),
            BoardStatus::Stalemate => return Some(Termination::Stalemate),
            BoardStatus::Ongoing => {}
        }

        if self.is_insufficient_material() {
            Some(Termination::InsufficientMaterial)
        } else if self.is_fifty_move_draw() {
            Some(Termination::FiftyMoves)
        } else if self.is_threefold_repetition() {
            Some(Termination::Repetition)
        } else {
            None
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.termination().is_some()
    }

    /// Successor position; `self` is left untouched
    pub fn apply(&self, chess_move: ChessMove) -> Position {
        let irreversible = self.moved_piece(chess_move) == Some(Piece::Pawn)
            || self.is_capture(chess_move);
        let board = self.board.make_move_new(chess_move);

        let mut history = if irreversible {
            Vec::new()
        } else {
            self.history.clone()
        };
        history.push(board.get_hash());

        Position {
            board,
            halfmove_clock: if irreversible {
                0
            } else {
                self.halfmove_clock + 1
            },
            fullmove_number: if self.side_to_move() == Color::Black {
                self.fullmove_number + 1
            } else {
                self.fullmove_number
            },
            history,
        }
    }

    /// Standard algebraic notation with check/mate suffix. Falls back to the
    /// coordinate id if the move cannot be rendered.
    pub fn to_notation(&self, chess_move: ChessMove) -> String {
        self.san(chess_move).unwrap_or_else(|| move_id(chess_move))
    }

    fn san(&self, chess_move: ChessMove) -> Option<String> {
        let fen: Fen = self.fen().parse().ok()?;
        let position: Chess = fen.into_position(CastlingMode::Standard).ok()?;
        let uci: Uci = move_id(chess_move).parse().ok()?;
        let sm_move = uci.to_move(&position).ok()?;
        Some(SanPlus::from_move(position, &sm_move).to_string())
    }

    /// Total material of one side
    pub fn material_count(&self, color: Color) -> i32 {
        [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen]
            .iter()
            .map(|&piece| {
                let count =
                    (*self.board.pieces(piece) & *self.board.color_combined(color)).popcnt();
                count as i32 * piece_value(piece)
            })
            .sum()
    }

    /// Material from `perspective`'s point of view; positive means ahead
    pub fn material_balance(&self, perspective: Color) -> i32 {
        self.material_count(perspective) - self.material_count(!perspective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(position: &Position, ids: &[&str]) -> Position {
        ids.iter().fold(position.clone(), |pos, id| {
            let mv = move_from_id(id).unwrap();
            assert!(pos.is_legal(mv), "{} should be legal", id);
            pos.apply(mv)
        })
    }

    #[test]
    fn test_start_sentinel() {
        let position = Position::from_fen("start").unwrap();
        assert_eq!(position.legal_moves().len(), 20);
        assert_eq!(position.fen(), START_FEN);
    }

    #[test]
    fn test_invalid_fen_rejected() {
        let result = Position::from_fen("not a fen");
        assert!(matches!(result, Err(LearnerError::InvalidPosition(_))));
    }

    #[test]
    fn test_move_id_parsing() {
        let mv = move_from_id("e7e8q").unwrap();
        assert_eq!(mv.get_promotion(), Some(Piece::Queen));
        assert_eq!(move_id(mv), "e7e8q");
        assert!(move_from_id("e2").is_err());
        assert!(move_from_id("e7e8x").is_err());
        assert!(move_from_id("z9e4").is_err());
    }

    #[test]
    fn test_notation() {
        let position = Position::default();
        assert_eq!(position.to_notation(move_from_id("e2e4").unwrap()), "e4");
        assert_eq!(position.to_notation(move_from_id("g1f3").unwrap()), "Nf3");

        let mate = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        assert_eq!(mate.to_notation(move_from_id("a1a8").unwrap()), "Ra8#");
    }

    #[test]
    fn test_en_passant_capture() {
        let position = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").unwrap();
        let ep = move_from_id("e5d6").unwrap();
        assert!(position.is_legal(ep));
        assert!(position.is_capture(ep));
        assert_eq!(position.captured_piece(ep), Some(Piece::Pawn));
        assert_eq!(position.captured_value(ep), 100);

        let after = position.apply(ep);
        assert_eq!(after.material_balance(Color::White), 100);
        assert_eq!(after.halfmove_clock(), 0);
    }

    #[test]
    fn test_material_balance() {
        let position =
            Position::from_fen("rnbqkb1r/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").unwrap();
        assert_eq!(position.material_balance(Color::White), 320);
        assert_eq!(position.material_balance(Color::Black), -320);
    }

    #[test]
    fn test_attacks_and_attackers() {
        let position = Position::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
        let e1 = Square::from_str("e1").unwrap();
        let e2 = Square::from_str("e2").unwrap();

        assert_eq!(position.attackers_of(Color::Black, e1), vec![e2]);
        assert!(position.is_attacked_by(Color::White, e2));
        assert!(position.is_check());
        assert_eq!(position.king_square(Color::White), Some(e1));
        assert_eq!(position.attacks_from(Square::from_str("d4").unwrap()), EMPTY);
    }

    #[test]
    fn test_insufficient_material() {
        let bare = Position::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(bare.is_insufficient_material());

        let knight = Position::from_fen("8/8/8/4k3/8/8/8/3NK3 w - - 0 1").unwrap();
        assert!(knight.is_insufficient_material());

        let same_colour_bishops = Position::from_fen("5b2/8/8/4k3/8/8/8/2B1K3 w - - 0 1").unwrap();
        assert!(same_colour_bishops.is_insufficient_material());

        let rook = Position::from_fen("8/8/8/4k3/8/8/8/R3K3 w - - 0 1").unwrap();
        assert!(!rook.is_insufficient_material());
        assert_eq!(bare.termination(), Some(Termination::InsufficientMaterial));
    }

    #[test]
    fn test_fifty_move_rule() {
        let position = Position::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 99 80").unwrap();
        assert!(!position.is_fifty_move_draw());

        let after = play(&position, &["a1a2"]);
        assert!(after.is_fifty_move_draw());
        assert_eq!(after.termination(), Some(Termination::FiftyMoves));
    }

    #[test]
    fn test_threefold_repetition() {
        let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
        let once = play(&Position::default(), &shuffle);
        assert!(!once.is_threefold_repetition());

        let twice = play(&once, &shuffle);
        assert!(twice.is_threefold_repetition());
        assert_eq!(twice.termination(), Some(Termination::Repetition));
    }

    #[test]
    fn test_apply_is_pure() {
        let position = Position::default();
        let fen_before = position.fen();
        let after = position.apply(move_from_id("e2e4").unwrap());

        assert_eq!(position.fen(), fen_before);
        assert_eq!(after.side_to_move(), Color::Black);
    }

    #[test]
    fn test_checkmate_and_stalemate() {
        let mated = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 1 1").unwrap();
        assert!(mated.is_checkmate());
        assert_eq!(mated.termination(), Some(Termination::Checkmate));

        let stalemate = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert!(stalemate.is_stalemate());
        assert_eq!(stalemate.termination(), Some(Termination::Stalemate));
    }
}
