//! Stockfish engine wrapper using UCI protocol (async I/O)
//!
//! One [`StockfishEngine`] is one engine process. Call [`StockfishEngine::quit`]
//! when done; on any other exit path `Drop` kills the process.

use std::future::Future;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use chess_core::fen_of;
use shakmaty::Chess;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::analysis::Evaluator;

/// Score reported for a forced mate, minus the number of moves to mate.
/// Positive when the side to move mates, negative when it gets mated.
pub const MATE_SCORE: i32 = 1000;

/// Extra time on top of the search budget before the engine counts as hung
pub const RESPONSE_GRACE: Duration = Duration::from_secs(10);

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

pub const QUIT_TIMEOUT: Duration = Duration::from_secs(1);

/// How long to wait on the engine at each stage of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub handshake: Duration,
    pub response_grace: Duration,
    pub quit: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: HANDSHAKE_TIMEOUT,
            response_grace: RESPONSE_GRACE,
            quit: QUIT_TIMEOUT,
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Stockfish executable not found at {0}")]
    NotFound(String),

    #[error("Failed to start engine at {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine at {path} did not complete the UCI handshake: {reason}")]
    Handshake { path: String, reason: String },

    #[error("{0}")]
    Protocol(String),
}

impl EngineError {
    /// True when the engine never became usable.
    pub fn is_launch(&self) -> bool {
        !matches!(self, EngineError::Protocol(_))
    }
}

/// Evaluation score relative to the side to move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Cp(i32),
    /// Mate in N moves (positive = side to move mates)
    Mate(i32),
}

impl Score {
    /// Collapse to a single centipawn number, mates mapped around [`MATE_SCORE`].
    pub fn centipawns(self) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(n) if n > 0 => MATE_SCORE - n,
            Score::Mate(n) => -MATE_SCORE - n,
        }
    }
}

/// Result of a single position evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalResult {
    pub score: Score,
    /// First move of the principal variation in UCI notation
    pub best_move: Option<String>,
}

/// Stockfish engine instance
pub struct StockfishEngine {
    path: String,
    timeouts: Timeouts,
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new engine process and run the UCI handshake
    pub async fn open(path: &str) -> Result<Self, EngineError> {
        Self::open_with(path, Timeouts::default()).await
    }

    pub async fn open_with(path: &str, timeouts: Timeouts) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => EngineError::NotFound(path.to_string()),
                _ => EngineError::Spawn {
                    path: path.to_string(),
                    source: e,
                },
            })?;

        let handshake_error = |reason: &str| EngineError::Handshake {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| handshake_error("stdin not captured"))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| handshake_error("stdout not captured"))?;

        let mut engine = Self {
            path: path.to_string(),
            timeouts,
            process,
            stdin,
            stdout: BufReader::new(stdout),
        };

        let handshake = timeout(timeouts.handshake, engine.handshake()).await;
        match handshake {
            Ok(Ok(())) => Ok(engine),
            Ok(Err(e)) => Err(handshake_error(&e.to_string())),
            Err(_) => Err(handshake_error("timed out")),
        }
    }

    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    /// Send a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| EngineError::Protocol(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EngineError::Protocol(format!("Failed to flush engine stdin: {e}")))
    }

    /// Read one line, treating end of output as a dead engine
    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| EngineError::Protocol(format!("Failed to read from engine: {e}")))?;
        if read == 0 {
            return Err(EngineError::Protocol(
                "engine process terminated unexpectedly".to_string(),
            ));
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "SF >");
        Ok(trimmed)
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Search a position for `budget` and report the score and best move
    pub async fn evaluate(
        &mut self,
        position: &Chess,
        budget: Duration,
    ) -> Result<EvalResult, EngineError> {
        let fen = fen_of(position);
        let movetime = budget.as_millis().max(1);

        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go movetime {movetime}")).await?;

        let deadline = budget + self.timeouts.response_grace;
        match timeout(deadline, self.read_search()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Protocol(format!(
                "no bestmove within {}ms for {fen}",
                deadline.as_millis()
            ))),
        }
    }

    /// Collect info lines up to `bestmove`; the last score and PV win
    async fn read_search(&mut self) -> Result<EvalResult, EngineError> {
        let mut score = None;
        let mut best_move = None;

        loop {
            let line = self.read_line().await?;

            if line.starts_with("info") {
                let info = parse_info(&line);
                if info.multipv.unwrap_or(1) != 1 {
                    continue;
                }
                if info.score.is_some() {
                    score = info.score;
                }
                if info.pv_head.is_some() {
                    best_move = info.pv_head;
                }
            } else if line.starts_with("bestmove") {
                let score = score.ok_or_else(|| {
                    EngineError::Protocol("engine returned bestmove without a score".to_string())
                })?;
                return Ok(EvalResult { score, best_move });
            }
        }
    }

    /// Send quit command and wait for process to exit, killing it if it lingers
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        if timeout(self.timeouts.quit, self.process.wait()).await.is_err() {
            warn!(path = %self.path, "Engine ignored quit, killing it");
            let _ = self.process.kill().await;
        }
    }
}

impl Evaluator for StockfishEngine {
    fn evaluate(
        &mut self,
        position: &Chess,
        budget: Duration,
    ) -> impl Future<Output = Result<EvalResult, EngineError>> + Send {
        StockfishEngine::evaluate(self, position, budget)
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// The parts of an `info` line a search result is built from
#[derive(Debug, Default, PartialEq, Eq)]
struct Info {
    multipv: Option<u32>,
    score: Option<Score>,
    pv_head: Option<String>,
}

/// Single pass over an `info` line. Everything after `pv` or `string` is
/// free text as far as the keys are concerned.
fn parse_info(line: &str) -> Info {
    let mut info = Info::default();
    let mut tokens = line.split_whitespace();

    while let Some(token) = tokens.next() {
        match token {
            "multipv" => info.multipv = tokens.next().and_then(|v| v.parse().ok()),
            "score" => {
                let kind = tokens.next();
                let value = tokens.next().and_then(|v| v.parse().ok());
                info.score = match (kind, value) {
                    (Some("cp"), Some(v)) => Some(Score::Cp(v)),
                    (Some("mate"), Some(v)) => Some(Score::Mate(v)),
                    _ => None,
                };
            }
            "pv" => {
                info.pv_head = tokens.next().map(str::to_string);
                break;
            }
            "string" => break,
            _ => {}
        }
    }

    info
}
