//! Persistent per-position move statistics.
//!
//! The whole store lives in memory and is rewritten to a single JSON file
//! after every recorded outcome. A missing or unreadable file starts an
//! empty store; a failed write is logged and the in-memory state is kept.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::position_key::PositionKey;
use crate::simulator::{Outcome, TacticalTrace};

/// Score floor for any move that has won at least once
pub const WIN_TIER: f64 = 10_000.0;
/// Score floor for any move that has drawn but never won
pub const DRAW_TIER: f64 = 5_000.0;
/// Bound on the capture/material bonus so it can never cross a tier
pub const TACTICAL_BONUS_LIMIT: f64 = 1_500.0;
/// Trials after which a move with no win and no draw stops being retried
pub const RETRY_TRIAL_THRESHOLD: u32 = 3;

/// Moves recorded for one position, keyed by coordinate move id
pub type MoveTable = BTreeMap<String, MoveRecord>;

/// One simulation result as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEntry {
    pub result: Outcome,
    pub move_count: u32,
    pub timestamp: String,
    #[serde(default)]
    pub tactical_info: TacticalTrace,
}

/// Aggregated statistics of one move from one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    #[serde(rename = "san")]
    pub notation: String,
    #[serde(default)]
    pub results: Vec<OutcomeEntry>,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub draws: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default, with = "infinity_sentinel")]
    pub min_moves_to_win: Option<u32>,
    #[serde(default, with = "infinity_sentinel")]
    pub min_moves_to_draw: Option<u32>,
    #[serde(default)]
    pub total_captures: u32,
    #[serde(default)]
    pub total_material_gained: i64,
}

impl MoveRecord {
    pub fn new(notation: &str) -> Self {
        Self {
            notation: notation.to_string(),
            results: Vec::new(),
            wins: 0,
            draws: 0,
            losses: 0,
            min_moves_to_win: None,
            min_moves_to_draw: None,
            total_captures: 0,
            total_material_gained: 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.wins + self.draws + self.losses
    }

    /// Append an outcome and update every derived counter
    pub fn push(&mut self, entry: OutcomeEntry) {
        self.total_captures += entry.tactical_info.captures_by_us.len() as u32;
        self.total_material_gained += i64::from(entry.tactical_info.material_balance_change);

        match entry.result {
            Outcome::Win => {
                self.wins += 1;
                self.min_moves_to_win = Some(running_min(self.min_moves_to_win, entry.move_count));
            }
            Outcome::Draw => {
                self.draws += 1;
                self.min_moves_to_draw =
                    Some(running_min(self.min_moves_to_draw, entry.move_count));
            }
            Outcome::Loss => self.losses += 1,
        }

        self.results.push(entry);
    }

    /// Rank of this move among the moves tried from the same position.
    ///
    /// Wins score above 10000 (faster and more frequent wins higher), draws
    /// between 5000 and 6500, pure losses at most 100. Captures and material
    /// add a bonus clamped to +/-1500, which keeps the three tiers apart.
    pub fn score(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let total = f64::from(total);

        let base = if self.wins > 0 {
            WIN_TIER + speed_bonus(self.min_moves_to_win) + f64::from(self.wins) / total * 500.0
        } else if self.draws > 0 {
            DRAW_TIER + speed_bonus(self.min_moves_to_draw) + f64::from(self.draws) / total * 500.0
        } else {
            let loss_rate = f64::from(self.losses) / total;
            100.0 / (1.0 + loss_rate * 10.0)
        };

        base + self.tactical_bonus()
    }

    pub fn tactical_bonus(&self) -> f64 {
        let raw = f64::from(self.total_captures) * 10.0 + self.total_material_gained as f64 / 10.0;
        raw.clamp(-TACTICAL_BONUS_LIMIT, TACTICAL_BONUS_LIMIT)
    }

    pub fn should_retry(&self) -> bool {
        self.should_retry_after(RETRY_TRIAL_THRESHOLD)
    }

    /// Moves that ever won or drew stay eligible; others get `min_trials` chances
    pub fn should_retry_after(&self, min_trials: u32) -> bool {
        self.wins > 0 || self.draws > 0 || self.total() < min_trials
    }

    pub fn win_rate(&self) -> f64 {
        rate(self.wins, self.total())
    }

    pub fn draw_rate(&self) -> f64 {
        rate(self.draws, self.total())
    }

    pub fn loss_rate(&self) -> f64 {
        rate(self.losses, self.total())
    }
}

fn running_min(current: Option<u32>, candidate: u32) -> u32 {
    current.map_or(candidate, |best| best.min(candidate))
}

fn speed_bonus(min_moves: Option<u32>) -> f64 {
    match min_moves {
        Some(plies) if plies > 0 => 1000.0 / f64::from(plies),
        _ => 0.0,
    }
}

fn rate(count: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(count) / f64::from(total)
    }
}

/// Move statistics for every position the learner has studied
#[derive(Debug, Default)]
pub struct StatisticsStore {
    path: Option<PathBuf>,
    positions: BTreeMap<PositionKey, MoveTable>,
}

impl StatisticsStore {
    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the store at `path`. Missing or corrupt files give an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();

        let positions = if path.exists() {
            match Self::read_file(&path) {
                Ok(positions) => {
                    info!(
                        path = %path.display(),
                        positions = positions.len(),
                        "loaded move memory"
                    );
                    positions
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "could not load move memory, starting fresh"
                    );
                    BTreeMap::new()
                }
            }
        } else {
            info!(path = %path.display(), "no move memory found, starting fresh");
            BTreeMap::new()
        };

        Self {
            path: Some(path),
            positions,
        }
    }

    fn read_file(path: &Path) -> Result<BTreeMap<PositionKey, MoveTable>> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rewrite the whole memory file
    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.positions)?;
        writer.flush()?;
        debug!(path = %path.display(), "move memory saved");
        Ok(())
    }

    /// Append a simulation result for `move_id` played from `key`, then persist.
    pub fn record_outcome(
        &mut self,
        key: &PositionKey,
        move_id: &str,
        notation: &str,
        outcome: Outcome,
        ply_count: u32,
        trace: TacticalTrace,
    ) -> &MoveRecord {
        let entry = OutcomeEntry {
            result: outcome,
            move_count: ply_count,
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            tactical_info: trace,
        };

        self.positions
            .entry(key.clone())
            .or_default()
            .entry(move_id.to_string())
            .or_insert_with(|| MoveRecord::new(notation))
            .push(entry);

        if let Err(e) = self.save() {
            warn!(error = %e, "could not save move memory, keeping results in memory");
        }

        &self.positions[key][move_id]
    }

    pub fn records(&self, key: &PositionKey) -> Option<&MoveTable> {
        self.positions.get(key)
    }

    pub fn record(&self, key: &PositionKey, move_id: &str) -> Option<&MoveRecord> {
        self.positions.get(key).and_then(|moves| moves.get(move_id))
    }

    /// Highest-scoring recorded move for `key` (first in id order on ties)
    pub fn best_move(&self, key: &PositionKey) -> Option<(&str, &MoveRecord)> {
        let mut best: Option<(&str, &MoveRecord, f64)> = None;

        for (move_id, record) in self.positions.get(key)? {
            let score = record.score();
            if best.map_or(true, |(_, _, best_score)| score > best_score) {
                best = Some((move_id.as_str(), record, score));
            }
        }

        best.map(|(move_id, record, _)| (move_id, record))
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }
}

/// `Option<u32>` stored as a number, or as the string `"infinity"` when absent.
/// `null` and non-finite reals are read back as absent too.
mod infinity_sentinel {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const SENTINEL: &str = "infinity";

    pub fn serialize<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(plies) => serializer.serialize_u32(*plies),
            None => serializer.serialize_str(SENTINEL),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Count(u64),
        Real(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Count(plies)) => Ok(u32::try_from(plies).ok()),
            Some(Raw::Real(plies)) if plies.is_finite() && plies >= 0.0 => Ok(Some(plies as u32)),
            Some(Raw::Real(_)) => Ok(None),
            Some(Raw::Text(text))
                if text.eq_ignore_ascii_case(SENTINEL) || text.eq_ignore_ascii_case("inf") =>
            {
                Ok(None)
            }
            Some(Raw::Text(text)) => Err(D::Error::custom(format!(
                "expected a ply count or \"{}\", got \"{}\"",
                SENTINEL, text
            ))),
        }
    }
}
