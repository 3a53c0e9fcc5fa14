//! Move-by-move game analysis
//!
//! Replays the main line from the game's starting position and scores the
//! position reached after every move. Evaluation is strictly sequential and
//! the first engine failure aborts the whole run.

use std::future::Future;
use std::time::Duration;

use chess_core::{fen_of, Game};
use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Position};
use tracing::debug;

use crate::error::AppError;
use crate::stockfish::{EngineError, EvalResult};

/// Anything that can score a position, normally a running engine
pub trait Evaluator {
    fn evaluate(
        &mut self,
        position: &Chess,
        budget: Duration,
    ) -> impl Future<Output = Result<EvalResult, EngineError>> + Send;
}

/// Move output for JSON serialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAnalysis {
    #[serde(rename = "move")]
    pub move_uci: String,
    pub score: i32,
    pub best_move: Option<String>,
    pub fen: String,
}

/// Analyze every move of `game`, one result per move in move order
pub async fn analyze_game<E: Evaluator>(
    game: &Game,
    engine: &mut E,
    budget: Duration,
) -> Result<Vec<MoveAnalysis>, AppError> {
    let mut board = game.start_position.clone();
    let mut results = Vec::with_capacity(game.len());

    for (ply, mv) in game.moves.iter().enumerate() {
        board = board
            .play(mv.clone())
            .map_err(|_| anyhow::anyhow!("move {} at ply {} is illegal", game.uci(mv), ply + 1))?;

        let eval = engine.evaluate(&board, budget).await?;

        let analysis = MoveAnalysis {
            move_uci: game.uci(mv),
            score: eval.score.centipawns(),
            best_move: eval.best_move,
            fen: fen_of(&board),
        };
        debug!(ply = ply + 1, mv = %analysis.move_uci, score = analysis.score, "Evaluated");
        results.push(analysis);
    }

    Ok(results)
}
