pub mod pgn_source;
