//! Presentation state: the input line, the status line and highlights.

use crossterm::event::KeyCode;
use tracing::debug;

use strictly_chess::{Notification, Square};

use super::input::{self, Action};

/// What the view shows besides the board.
#[derive(Debug, Default)]
pub struct App {
    input: String,
    status_message: String,
    selected: Option<Square>,
    highlights: Vec<Square>,
    flash: Option<Square>,
}

impl App {
    /// Creates the view state.
    pub fn new() -> Self {
        Self {
            status_message: "s: solo  h: host  j <id>: join  q: quit".to_string(),
            ..Self::default()
        }
    }

    /// Text typed so far.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Last status message.
    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Square whose targets are highlighted.
    pub fn selected(&self) -> Option<Square> {
        self.selected
    }

    /// Highlighted target squares.
    pub fn highlights(&self) -> &[Square] {
        &self.highlights
    }

    /// Target square of the last refused move.
    pub fn flash(&self) -> Option<Square> {
        self.flash
    }

    /// Replaces the status line.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    /// Shows the targets of `square`.
    pub fn set_highlights(&mut self, square: Square, targets: Vec<Square>) {
        self.selected = Some(square);
        self.highlights = targets;
    }

    /// Reacts to a controller notification.
    pub fn handle_notification(&mut self, notification: Notification) {
        debug!(%notification, "Notification");
        match &notification {
            Notification::MoveRejected { square, .. } => self.flash = Some(*square),
            Notification::SessionChanged(_) | Notification::GameOver(_) => {
                self.flash = None;
                self.clear_highlights();
            }
            _ => {}
        }
        self.status_message = match notification {
            Notification::GameOver(winner) => format!("{}. n: new game  r: menu", winner),
            Notification::SessionChanged(session) => match session.session_id() {
                Some(id) => format!("Session {} ({})", id, session.status()),
                None => format!("{} ({})", session.mode(), session.status()),
            },
            other => other.to_string(),
        };
    }

    /// Edits the input line. Returns an action when a line is completed.
    pub fn handle_key(&mut self, key: KeyCode) -> Option<Action> {
        match key {
            KeyCode::Char(c) => {
                self.input.push(c);
                None
            }
            KeyCode::Backspace => {
                self.input.pop();
                None
            }
            KeyCode::Esc => {
                self.input.clear();
                self.clear_highlights();
                None
            }
            KeyCode::Enter => {
                let line = std::mem::take(&mut self.input);
                match input::parse_command(&line) {
                    Ok(action) => {
                        self.flash = None;
                        if !matches!(action, Action::Highlight(_)) {
                            self.clear_highlights();
                        }
                        Some(action)
                    }
                    Err(e) => {
                        self.status_message = e.user_message();
                        None
                    }
                }
            }
            _ => None,
        }
    }

    fn clear_highlights(&mut self) {
        self.selected = None;
        self.highlights.clear();
    }
}
