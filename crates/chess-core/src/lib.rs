pub mod game_data;
pub mod pgn;

pub use game_data::{fen_of, Game, GameMetadata};
pub use pgn::{parse_game, PgnError};
