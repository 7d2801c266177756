//! Typed command parsing for the input line.

use strictly_chess::{ClientError, ClientErrorKind, MoveIntent, Square};

/// Something the player asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start a solo game.
    Solo,
    /// Choose remote play and create a session.
    Host,
    /// Create a session while waiting.
    Create,
    /// Join a session by id.
    Join(String),
    /// Play a move.
    Submit(MoveIntent),
    /// Show targets for the piece on a square.
    Highlight(Square),
    /// Abandon the session.
    Reset,
    /// Acknowledge a finished game.
    Acknowledge,
    /// Leave the client.
    Quit,
}

/// Parses one input line.
pub fn parse_command(line: &str) -> Result<Action, ClientError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match word.to_ascii_lowercase().as_str() {
        "q" | "quit" => Ok(Action::Quit),
        "r" | "reset" => Ok(Action::Reset),
        "n" | "new" => Ok(Action::Acknowledge),
        "s" | "solo" => Ok(Action::Solo),
        "h" | "host" => Ok(Action::Host),
        "c" | "create" => Ok(Action::Create),
        "j" | "join" => Ok(Action::Join(rest.to_string())),
        _ if word.len() == 2 => word.parse().map(Action::Highlight),
        _ if !word.is_empty() => word.parse().map(Action::Submit),
        _ => Err(ClientError::new(ClientErrorKind::Validation(
            "type a move like e2e4".to_string(),
        ))),
    }
}
