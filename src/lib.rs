//! # Chess Move Learner
//!
//! Finds a move for a chess position by simulation instead of tree search.
//! Candidate moves are played out to the end of the game against an opponent
//! engine, every result is remembered per position, and the move with the
//! best record wins. Tactical analysis decides which candidates are tried
//! first.
//!
//! ## Features
//!
//! - **Tactical analysis**: king threats, ranked checkmate/check/capture moves and ranked defences
//! - **Monte-Carlo playouts**: random learner moves with a capture bias against a UCI opponent
//! - **Move memory**: per-position win/draw/loss statistics persisted as JSON
//! - **Memory-guided search**: priority candidates, untried moves, then retries of promising moves
//!
//! ## Quick Start
//!
//! ```rust
//! use chess::Color;
//! use chess_move_learner::{
//!     LearnerConfig, LearnerSession, OfflineOracle, Position, StatisticsStore,
//! };
//!
//! let position = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
//! let config = LearnerConfig {
//!     seed: Some(1),
//!     ..LearnerConfig::quick()
//! };
//!
//! let mut session = LearnerSession::new(
//!     position,
//!     Color::White,
//!     config,
//!     Box::new(OfflineOracle),
//!     StatisticsStore::in_memory(),
//! )
//! .unwrap();
//!
//! let report = session.find_move(5);
//! assert!(report.found_win());
//! println!("Best move: {}", report.recommendation.unwrap().notation);
//! ```

// Core modules
pub mod errors;
pub mod rules;

pub mod config;
pub mod memory;
pub mod oracle;
pub mod position_key;
pub mod report;
pub mod search;
pub mod simulator;
pub mod tactics;

// Re-export commonly used types
pub use config::LearnerConfig;
pub use errors::{LearnerError, Result};
pub use memory::{MoveRecord, OutcomeEntry, StatisticsStore};
pub use oracle::{OfflineOracle, OpponentOracle, OracleConfig, OracleError, StockfishOracle};
pub use position_key::PositionKey;
pub use rules::{move_from_id, move_id, Position, Termination};
pub use search::{AttemptRecord, LearnerSession, MoveSource, Recommendation, SearchReport, Verdict};
pub use simulator::{simulate, Outcome, SimulationResult, SimulationSettings, TacticalTrace};
pub use tactics::{Strategy, TacticalAnalysis, TacticalAnalyzer};
