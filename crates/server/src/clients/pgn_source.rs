use std::time::Duration;

use chess_core::{parse_game, Game};
use reqwest::Client;

use crate::error::AppError;

/// Downloads PGN text over HTTP. One attempt per call, no retries.
#[derive(Clone)]
pub struct PgnSource {
    client: Client,
}

impl PgnSource {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("PgnAnalyzer/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch the raw PGN text behind `url`.
    pub async fn fetch_pgn(&self, url: &str) -> Result<String, AppError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Request error: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::Fetch(format!("HTTP {} for url: {url}", resp.status())));
        }

        resp.text()
            .await
            .map_err(|e| AppError::Fetch(format!("Body read error: {e}")))
    }

    /// Fetch `url` and parse the first game it contains.
    pub async fn fetch_and_parse(&self, url: &str) -> Result<Game, AppError> {
        let pgn = self.fetch_pgn(url).await?;
        tracing::debug!(url, bytes = pgn.len(), "Fetched PGN");
        Ok(parse_game(&pgn)?)
    }
}
