//! Opponent oracle: the engine that answers for the side the learner does not play.

use chess::ChessMove;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::rules::{move_from_id, Position};

/// Time allowed past the move budget before a reply is abandoned
pub const REPLY_GRACE: Duration = Duration::from_secs(1);

/// Time an engine gets to exit after `quit` before it is killed
const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Configuration for the UCI opponent engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub engine_path: String,
    pub skill_level: Option<u8>, // 0-20, lower = weaker
    pub threads: Option<u8>,
    pub hash_mb: Option<u32>,
    pub move_time_ms: u64, // thinking time per reply
    pub handshake_timeout_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            engine_path: "stockfish".to_string(), // Assume stockfish in PATH
            skill_level: Some(5),
            threads: Some(1),
            hash_mb: Some(16),
            move_time_ms: 50,
            handshake_timeout_ms: 5_000,
        }
    }
}

impl OracleConfig {
    pub fn move_time(&self) -> Duration {
        Duration::from_millis(self.move_time_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

/// Opponent oracle failures. All of them are recoverable for a single ply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    LaunchError(String),
    CommunicationError(String),
    ParseError(String),
    IllegalReply(String),
    /// No engine behind this oracle
    Unavailable,
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LaunchError(msg) => write!(f, "Launch error: {}", msg),
            Self::CommunicationError(msg) => write!(f, "Communication error: {}", msg),
            Self::ParseError(msg) => write!(f, "Parse error: {}", msg),
            Self::IllegalReply(msg) => write!(f, "Illegal reply: {}", msg),
            Self::Unavailable => write!(f, "Opponent engine unavailable"),
        }
    }
}

impl std::error::Error for OracleError {}

/// Supplies a reply move for the non-learning side
pub trait OpponentOracle {
    fn name(&self) -> &str;

    /// Best reply in `position` within roughly `budget` of thinking time
    fn best_reply(&mut self, position: &Position, budget: Duration)
        -> Result<ChessMove, OracleError>;
}

/// Oracle with no engine behind it; every request fails so callers fall back
/// to a random legal move.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineOracle;

impl OpponentOracle for OfflineOracle {
    fn name(&self) -> &str {
        "offline"
    }

    fn best_reply(
        &mut self,
        _position: &Position,
        _budget: Duration,
    ) -> Result<ChessMove, OracleError> {
        Err(OracleError::Unavailable)
    }
}

/// Stockfish (or any UCI engine) driven over stdin/stdout.
///
/// Engine output is read on a background thread so every wait has a
/// deadline. A reply that misses `budget` plus [`REPLY_GRACE`] is abandoned
/// with `stop`, and the engine is resynchronised before the next request.
pub struct StockfishOracle {
    process: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    config: OracleConfig,
    stale: bool,
}

impl StockfishOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let mut process = Command::new(&config.engine_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                OracleError::LaunchError(format!("Failed to start {}: {}", config.engine_path, e))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| OracleError::LaunchError("Failed to get stdin".to_string()))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| OracleError::LaunchError("Failed to get stdout".to_string()))?;

        let mut engine = Self {
            process,
            stdin,
            lines: spawn_reader(stdout),
            config,
            stale: false,
        };

        engine.initialize().map_err(|e| match e {
            OracleError::Unavailable => OracleError::LaunchError(format!(
                "{} did not finish the UCI handshake within {} ms",
                engine.config.engine_path, engine.config.handshake_timeout_ms
            )),
            other => other,
        })?;
        debug!(engine = %engine.config.engine_path, "opponent engine ready");

        Ok(engine)
    }

    fn initialize(&mut self) -> Result<(), OracleError> {
        let timeout = self.config.handshake_timeout();

        self.send_command("uci")?;
        self.wait_for("uciok", timeout)?;

        if let Some(skill_level) = self.config.skill_level {
            self.send_command(&format!("setoption name Skill Level value {}", skill_level))?;
        }

        if let Some(threads) = self.config.threads {
            self.send_command(&format!("setoption name Threads value {}", threads))?;
        }

        if let Some(hash_mb) = self.config.hash_mb {
            self.send_command(&format!("setoption name Hash value {}", hash_mb))?;
        }

        self.send_command("setoption name Ponder value false")?;

        self.send_command("isready")?;
        self.wait_for("readyok", timeout)?;

        Ok(())
    }

    fn send_command(&mut self, command: &str) -> Result<(), OracleError> {
        writeln!(self.stdin, "{}", command)
            .map_err(|e| OracleError::CommunicationError(format!("Send failed: {}", e)))?;
        self.stdin
            .flush()
            .map_err(|e| OracleError::CommunicationError(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    /// Next engine line, or `Unavailable` once `timeout` passes
    fn read_response(&mut self, timeout: Duration) -> Result<String, OracleError> {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => Ok(line),
            Err(RecvTimeoutError::Timeout) => Err(OracleError::Unavailable),
            Err(RecvTimeoutError::Disconnected) => Err(OracleError::CommunicationError(
                "Engine closed its output".to_string(),
            )),
        }
    }

    /// Skips lines until `token`. Anything else read on the way is discarded.
    fn wait_for(&mut self, token: &str, timeout: Duration) -> Result<(), OracleError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if self.read_response(remaining)? == token {
                return Ok(());
            }
        }
    }

    /// Drops output left over from an abandoned search
    fn resync(&mut self) -> Result<(), OracleError> {
        self.send_command("isready")?;
        self.wait_for("readyok", self.config.handshake_timeout())?;
        self.stale = false;
        debug!(engine = %self.config.engine_path, "opponent engine resynchronised");
        Ok(())
    }
}

impl OpponentOracle for StockfishOracle {
    fn name(&self) -> &str {
        &self.config.engine_path
    }

    fn best_reply(
        &mut self,
        position: &Position,
        budget: Duration,
    ) -> Result<ChessMove, OracleError> {
        if self.stale {
            self.resync()?;
        }

        self.send_command(&format!("position fen {}", position.fen()))?;
        self.send_command(&format!("go movetime {}", budget.as_millis().max(1)))?;

        let deadline = Instant::now() + budget + REPLY_GRACE;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let response = match self.read_response(remaining) {
                Ok(response) => response,
                Err(OracleError::Unavailable) => {
                    warn!(
                        engine = %self.config.engine_path,
                        budget_ms = budget.as_millis() as u64,
                        "no bestmove before the deadline, abandoning the search"
                    );
                    self.stale = true;
                    self.send_command("stop")?;
                    return Err(OracleError::Unavailable);
                }
                Err(e) => return Err(e),
            };

            if let Some(rest) = response.strip_prefix("bestmove") {
                let reply = parse_bestmove(rest)?;
                if !position.is_legal(reply) {
                    return Err(OracleError::IllegalReply(reply.to_string()));
                }
                return Ok(reply);
            }
        }
    }
}

impl Drop for StockfishOracle {
    fn drop(&mut self) {
        if self.send_command("quit").is_err() {
            warn!("could not send quit to opponent engine");
        }

        let deadline = Instant::now() + QUIT_GRACE;
        while Instant::now() < deadline {
            match self.process.try_wait() {
                Ok(Some(_)) | Err(_) => return,
                Ok(None) => thread::sleep(Duration::from_millis(10)),
            }
        }

        warn!(engine = %self.config.engine_path, "opponent engine ignored quit, killing it");
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Forwards engine output line by line until the pipe closes
fn spawn_reader(stdout: ChildStdout) -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if sender.send(line.trim().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    receiver
}

/// Parse the payload of a `bestmove` line (`e2e4 ponder e7e5`)
fn parse_bestmove(payload: &str) -> Result<ChessMove, OracleError> {
    match payload.split_whitespace().next() {
        None | Some("(none)") => Err(OracleError::ParseError(
            "engine returned no move".to_string(),
        )),
        Some(id) => move_from_id(id).map_err(|e| OracleError::ParseError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_config_default() {
        let config = OracleConfig::default();
        assert_eq!(config.engine_path, "stockfish");
        assert_eq!(config.skill_level, Some(5));
        assert_eq!(config.move_time(), Duration::from_millis(50));
    }

    #[test]
    fn test_offline_oracle_always_unavailable() {
        let mut oracle = OfflineOracle;
        let reply = oracle.best_reply(&Position::default(), Duration::from_millis(10));
        assert_eq!(reply, Err(OracleError::Unavailable));
    }

    #[test]
    fn test_parse_bestmove() {
        let mv = parse_bestmove(" e2e4 ponder e7e5").unwrap();
        assert_eq!(mv.to_string(), "e2e4");
        assert!(parse_bestmove(" (none)").is_err());
        assert!(parse_bestmove("").is_err());
    }

    #[test]
    fn test_missing_engine_fails_to_launch() {
        let config = OracleConfig {
            engine_path: "/nonexistent/path/to/engine".to_string(),
            ..OracleConfig::default()
        };
        assert!(matches!(
            StockfishOracle::new(config),
            Err(OracleError::LaunchError(_))
        ));
    }

    /// Executable shell script standing in for a UCI engine
    #[cfg(unix)]
    fn script_engine(dir: &tempfile::TempDir, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("engine.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_engine_times_out_during_handshake() {
        let dir = tempfile::tempdir().unwrap();
        let config = OracleConfig {
            engine_path: script_engine(&dir, "while read line; do :; done\n"),
            handshake_timeout_ms: 200,
            ..OracleConfig::default()
        };

        let started = Instant::now();
        let result = StockfishOracle::new(config);
        assert!(matches!(result, Err(OracleError::LaunchError(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_stalled_search_is_abandoned() {
        // Answers the handshake but never sends bestmove
        let dir = tempfile::tempdir().unwrap();
        let body = r#"while read line; do
  case "$line" in
    uci) echo uciok ;;
    isready) echo readyok ;;
    quit) exit 0 ;;
  esac
done
"#;
        let config = OracleConfig {
            engine_path: script_engine(&dir, body),
            handshake_timeout_ms: 2_000,
            ..OracleConfig::default()
        };
        let mut oracle = StockfishOracle::new(config).unwrap();

        let started = Instant::now();
        let budget = Duration::from_millis(10);
        assert_eq!(
            oracle.best_reply(&Position::default(), budget),
            Err(OracleError::Unavailable)
        );
        assert!(oracle.stale);

        // Resynchronises, then stalls again
        assert_eq!(
            oracle.best_reply(&Position::default(), budget),
            Err(OracleError::Unavailable)
        );
        assert!(started.elapsed() < REPLY_GRACE * 4);
    }
}
