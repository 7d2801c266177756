//! Stateless rendering of the board and session.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use strictly_chess::{BoardState, GameSession, Side, Square, piece_at};

use super::app::App;

const MOVES_SHOWN: usize = 12;

/// Renders the whole screen.
pub fn draw(frame: &mut Frame, board: &BoardState, session: &GameSession, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(12),   // Board and info
            Constraint::Length(3), // Input
            Constraint::Length(3), // Status
        ])
        .split(area);

    let title = Paragraph::new("Strictly Chess")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    frame.render_widget(title, chunks[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(30)])
        .split(chunks[1]);

    draw_board(frame, middle[0], board, app);
    draw_info(frame, middle[1], board, session);

    let input = Paragraph::new(format!("> {}", app.input()))
        .block(Block::default().title("Command").borders(Borders::ALL));
    frame.render_widget(input, chunks[2]);

    let status = Paragraph::new(app.status_message())
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, chunks[3]);
}

fn draw_board(frame: &mut Frame, area: Rect, board: &BoardState, app: &App) {
    let mut lines = Vec::with_capacity(10);
    for rank in (0..8u8).rev() {
        let mut spans = vec![Span::styled(
            format!("{} ", rank + 1),
            Style::default().fg(Color::DarkGray),
        )];
        for file in 0..8u8 {
            let Some(square) = Square::new(file, rank) else {
                continue;
            };
            spans.push(draw_cell(board, square, app));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(Span::styled(
        "   a  b  c  d  e  f  g  h",
        Style::default().fg(Color::DarkGray),
    )));

    let paragraph =
        Paragraph::new(lines).block(Block::default().title("Board").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn draw_cell(board: &BoardState, square: Square, app: &App) -> Span<'static> {
    let symbol = match piece_at(board.position(), square) {
        Some((Side::White, kind)) => kind.to_char().to_ascii_uppercase(),
        Some((Side::Black, kind)) => kind.to_char(),
        None => '.',
    };

    let light = (square.file() + square.rank()) % 2 == 0;
    let mut style = Style::default().bg(if light { Color::Gray } else { Color::DarkGray });
    style = if symbol.is_ascii_uppercase() {
        style.fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        style.fg(Color::Black)
    };

    if app.flash() == Some(square) {
        style = style.bg(Color::Red);
    } else if app.selected() == Some(square) {
        style = style.bg(Color::Blue);
    } else if app.highlights().contains(&square) {
        style = style.bg(Color::Green);
    }

    Span::styled(format!(" {} ", symbol), style)
}

fn draw_info(frame: &mut Frame, area: Rect, board: &BoardState, session: &GameSession) {
    let turn = match board.turn() {
        Some(side) => side.to_string(),
        None => "-".to_string(),
    };
    let mut flags = Vec::new();
    if board.is_checkmate() {
        flags.push("checkmate");
    } else if board.is_check() {
        flags.push("check");
    }

    let mut lines = vec![
        Line::from(format!(
            "Mode: {}  Status: {}",
            session.mode(),
            session.status()
        )),
        Line::from(format!(
            "Session: {}",
            session.session_id().map(|id| id.as_str()).unwrap_or("-")
        )),
        Line::from(format!("Turn: {}  Ply: {}  {}", turn, board.ply_count(), flags.join(" "))),
        Line::from(format!(
            "White {} [{}]  Black {} [{}]",
            board.score(Side::White),
            captures_text(board, Side::White),
            board.score(Side::Black),
            captures_text(board, Side::Black),
        )),
    ];
    if let Some(winner) = session.winner() {
        lines.push(Line::from(Span::styled(
            format!("Result: {}", winner),
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(""));
    let moves = board.numbered_moves();
    let skip = moves.len().saturating_sub(MOVES_SHOWN);
    lines.extend(moves.into_iter().skip(skip).map(Line::from));

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Game").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn captures_text(board: &BoardState, side: Side) -> String {
    board
        .captured_by(side)
        .to_vec()
        .into_iter()
        .map(|kind| kind.to_char())
        .collect()
}
