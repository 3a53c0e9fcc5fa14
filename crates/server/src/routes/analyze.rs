use axum::{extract::rejection::JsonRejection, Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{self, MoveAnalysis};
use crate::clients::pgn_source::PgnSource;
use crate::config::Config;
use crate::error::AppError;
use crate::stockfish::StockfishEngine;

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub message: String,
    pub url: String,
    pub analysis: Vec<MoveAnalysis>,
}

/// The `gameUrl` of a request body, exactly as sent. Anything other than a
/// non-blank string, including a body that is not an object, is rejected.
fn require_game_url(body: &Value) -> Result<String, AppError> {
    body.get("gameUrl")
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("Game URL is required".into()))
}

/// POST /analyze
pub async fn analyze(
    Extension(config): Extension<Config>,
    Extension(source): Extension<PgnSource>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let Json(body) = payload
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e.body_text())))?;
    let game_url = require_game_url(&body)?;

    let game = source.fetch_and_parse(&game_url).await?;
    tracing::info!(
        url = %game_url,
        moves = game.len(),
        white = game.metadata.white.as_deref().unwrap_or("?"),
        black = game.metadata.black.as_deref().unwrap_or("?"),
        "Analyzing game"
    );

    let mut engine = StockfishEngine::open(&config.stockfish_path).await?;
    let outcome = analysis::analyze_game(&game, &mut engine, config.analysis_time).await;
    engine.quit().await;
    let analysis = outcome?;

    tracing::info!(url = %game_url, moves = analysis.len(), "Analysis done");

    Ok(Json(AnalyzeResponse {
        message: "Analysis done".to_string(),
        url: game_url,
        analysis,
    }))
}
