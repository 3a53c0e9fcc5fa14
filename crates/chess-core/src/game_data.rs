use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move};

/// Tag pairs worth keeping around for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameMetadata {
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>, // "1-0", "0-1", "1/2-1/2", "*"
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
}

/// A parsed game: the starting position and the main line played from it.
#[derive(Debug, Clone)]
pub struct Game {
    pub metadata: GameMetadata,
    pub start_position: Chess,
    pub castling_mode: CastlingMode,
    pub moves: Vec<Move>,
}

impl Game {
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// UCI notation for a move of this game (`e2e4`, `e7e8q`, `e1g1`).
    pub fn uci(&self, mv: &Move) -> String {
        mv.to_uci(self.castling_mode).to_string()
    }
}

/// FEN of a position, with the en passant square only when a capture is legal.
pub fn fen_of(position: &Chess) -> String {
    Fen::from_position(position, EnPassantMode::Legal).to_string()
}
