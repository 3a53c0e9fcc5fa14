//! PGN parsing: reads the first game of a PGN text into a [`Game`].
//!
//! Only the main line is kept. Variations, comments and NAGs are skipped.
//! Every move is checked for legality while the game is read, so a returned
//! [`Game`] can always be replayed from its starting position.

use std::io::{Cursor, Seek};
use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Move, Position};
use thiserror::Error;

use crate::game_data::{Game, GameMetadata};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PgnError {
    #[error("No game found in the PGN data")]
    NoGame,

    #[error("Invalid FEN tag {fen:?}: {reason}")]
    InvalidFen { fen: String, reason: String },

    #[error("Illegal move {san} at ply {ply}")]
    IllegalMove { san: String, ply: usize },

    #[error("Unrecognised move text {0:?}")]
    UnknownToken(String),

    #[error("Unreadable PGN: {0}")]
    Read(String),
}

/// Tags collected during header parsing.
#[derive(Default)]
struct GameTags {
    seen: bool,
    fen: Option<String>,
    chess960: bool,
    metadata: GameMetadata,
}

/// State during movetext parsing.
struct MainLine {
    had_tags: bool,
    metadata: GameMetadata,
    start_position: Chess,
    castling_mode: CastlingMode,
    position: Chess,
    moves: Vec<Move>,
}

/// Visitor that replays the main line of a single game.
struct GameReader;

impl Visitor for GameReader {
    type Tags = GameTags;
    type Movetext = MainLine;
    type Output = Result<Game, PgnError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, GameTags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut GameTags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        tags.seen = true;
        let value = value.decode_utf8_lossy().into_owned();
        match name {
            b"FEN" => tags.fen = Some(value),
            b"Variant" => tags.chess960 = value.eq_ignore_ascii_case("chess960"),
            b"White" => tags.metadata.white = Some(value),
            b"Black" => tags.metadata.black = Some(value),
            b"Result" => tags.metadata.result = Some(value),
            b"Event" => tags.metadata.event = Some(value),
            b"Site" => tags.metadata.site = Some(value),
            b"Date" => tags.metadata.date = Some(value),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: GameTags) -> ControlFlow<Self::Output, MainLine> {
        let castling_mode = if tags.chess960 {
            CastlingMode::Chess960
        } else {
            CastlingMode::Standard
        };

        let start_position = match tags.fen {
            Some(fen) => match starting_position(&fen, castling_mode) {
                Ok(pos) => pos,
                Err(e) => return ControlFlow::Break(Err(e)),
            },
            None => Chess::default(),
        };

        ControlFlow::Continue(MainLine {
            had_tags: tags.seen,
            metadata: tags.metadata,
            position: start_position.clone(),
            start_position,
            castling_mode,
            moves: Vec::new(),
        })
    }

    fn begin_variation(&mut self, _line: &mut MainLine) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, line: &mut MainLine, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        let ply = line.moves.len() + 1;
        let illegal = || PgnError::IllegalMove {
            san: san_plus.to_string(),
            ply,
        };

        let mv = match san_plus.san.to_move(&line.position) {
            Ok(mv) => mv,
            Err(_) => return ControlFlow::Break(Err(illegal())),
        };

        let position = std::mem::take(&mut line.position);
        match position.play(mv.clone()) {
            Ok(next) => {
                line.position = next;
                line.moves.push(mv);
                ControlFlow::Continue(())
            }
            Err(_) => ControlFlow::Break(Err(illegal())),
        }
    }

    fn end_game(&mut self, line: MainLine) -> Self::Output {
        if !line.had_tags && line.moves.is_empty() {
            return Err(PgnError::NoGame);
        }

        Ok(Game {
            metadata: line.metadata,
            start_position: line.start_position,
            castling_mode: line.castling_mode,
            moves: line.moves,
        })
    }
}

fn starting_position(fen: &str, castling_mode: CastlingMode) -> Result<Chess, PgnError> {
    let invalid = |reason: String| PgnError::InvalidFen {
        fen: fen.to_string(),
        reason,
    };

    let setup: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    setup
        .into_position(castling_mode)
        .map_err(|e| invalid(format!("{e}")))
}

/// True for anything pgn-reader acts on in the main line: moves, move
/// numbers, NAGs, annotation glyphs and results.
fn is_movetext_token(token: &str) -> bool {
    let token = token.trim_end_matches(['!', '?']);
    token.is_empty()
        || token.bytes().all(|b| b.is_ascii_digit())
        || token.starts_with('$')
        || matches!(token, "*" | "1-0" | "0-1" | "1/2-1/2" | "½-½")
        || matches!(token.trim_end_matches(['+', '#']), "0-0" | "0-0-0")
        || token.parse::<SanPlus>().is_ok()
}

/// pgn-reader drops main-line tokens it cannot read as a move, which would
/// shift every later move onto the wrong ply. Find the first such token.
fn unknown_token(text: &str) -> Option<String> {
    let mut in_comment = false;
    let mut depth = 0usize;

    for line in text.lines() {
        if !in_comment && (line.starts_with('[') || line.starts_with('%')) {
            continue;
        }

        let mut rest = line;
        loop {
            if in_comment {
                match rest.find('}') {
                    Some(i) => {
                        rest = &rest[i + 1..];
                        in_comment = false;
                    }
                    None => break,
                }
            }

            rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '.');
            match rest.chars().next() {
                None | Some(';') => break,
                Some('{') => {
                    in_comment = true;
                    rest = &rest[1..];
                }
                Some('(') => {
                    depth += 1;
                    rest = &rest[1..];
                }
                Some(')') => {
                    depth = depth.saturating_sub(1);
                    rest = &rest[1..];
                }
                Some(_) => {
                    let end = rest
                        .find(|c: char| c.is_whitespace() || "{}();.".contains(c))
                        .unwrap_or(rest.len());
                    let token = &rest[..end];
                    rest = &rest[end..];
                    if depth == 0 && !is_movetext_token(token) {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Parse the first game of a PGN text.
pub fn parse_game(pgn: &str) -> Result<Game, PgnError> {
    let mut reader = Reader::new(Cursor::new(pgn.as_bytes()));
    let game = match reader.read_game(&mut GameReader) {
        Ok(Some(game)) => game?,
        Ok(None) => return Err(PgnError::NoGame),
        Err(e) => return Err(PgnError::Read(e.to_string())),
    };

    // the reader stops at the end of the first game
    let end = reader
        .stream_position()
        .map_err(|e| PgnError::Read(e.to_string()))?;
    let first_game = usize::try_from(end)
        .ok()
        .and_then(|end| pgn.get(..end))
        .unwrap_or(pgn);
    match unknown_token(first_game) {
        Some(token) => Err(PgnError::UnknownToken(token)),
        None => Ok(game),
    }
}
