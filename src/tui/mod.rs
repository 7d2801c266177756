//! Terminal UI for Strictly Chess.
//!
//! The view holds no game logic: it renders the controller's board and
//! session, turns typed lines into controller calls and shows notifications.

mod app;
mod input;
mod ui;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

use strictly_chess::{Notification, SessionController, SessionMode};

use app::App;
use input::Action;

const INPUT_POLL: Duration = Duration::from_millis(50);

/// How the session starts when the view opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opening {
    /// Wait for the player to pick a mode.
    Menu,
    /// Start a solo game.
    Solo,
    /// Choose remote play and create a session.
    Host,
    /// Choose remote play and join a session.
    Join(String),
}

/// Runs the view until the player quits.
pub async fn run_tui(mut controller: SessionController, opening: Opening) -> Result<()> {
    info!(?opening, "Starting Strictly Chess TUI");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_session(&mut terminal, &mut controller, opening).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    controller.reset().await;

    if let Err(err) = &res {
        error!(error = ?err, "Session loop error");
    }
    res
}

/// Main loop: controller signals, notifications and key presses.
#[instrument(skip_all)]
async fn run_session(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    controller: &mut SessionController,
    opening: Opening,
) -> Result<()> {
    let mut notifications = controller.subscribe_notifications();
    let mut app = App::new();

    let first = match opening {
        Opening::Menu => None,
        Opening::Solo => Some(Action::Solo),
        Opening::Host => Some(Action::Host),
        Opening::Join(id) => Some(Action::Join(id)),
    };
    if let Some(action) = first {
        perform(controller, &mut app, action).await;
    }

    loop {
        drain_notifications(&mut notifications, &mut app);
        terminal.draw(|f| ui::draw(f, controller.board(), controller.session(), &app))?;

        tokio::select! {
            Some(signal) = controller.recv_signal() => {
                controller.handle_signal(signal).await;
            }
            _ = tokio::time::sleep(INPUT_POLL) => {
                while event::poll(Duration::ZERO)? {
                    let Event::Key(key) = event::read()? else {
                        continue;
                    };
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    let Some(action) = app.handle_key(key.code) else {
                        continue;
                    };
                    if action == Action::Quit {
                        info!("User quit");
                        return Ok(());
                    }
                    perform(controller, &mut app, action).await;
                }
            }
        }
    }
}

fn drain_notifications(notifications: &mut broadcast::Receiver<Notification>, app: &mut App) {
    loop {
        match notifications.try_recv() {
            Ok(notification) => app.handle_notification(notification),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "Notifications lagged");
            }
            Err(_) => return,
        }
    }
}

/// Hands an action to the controller. Failures are already surfaced as
/// notifications.
async fn perform(controller: &mut SessionController, app: &mut App, action: Action) {
    debug!(?action, "Performing action");
    let result = match action {
        Action::Solo => controller.choose_solo().await,
        Action::Host => match controller.choose_remote().await {
            Ok(()) => controller.create_session().await,
            Err(e) => Err(e),
        },
        Action::Create => controller.create_session().await,
        Action::Join(id) => {
            if controller.session().mode() == SessionMode::Unselected
                && let Err(e) = controller.choose_remote().await
            {
                debug!(error = %e, "Could not choose remote play");
                return;
            }
            controller.join_session(&id).await
        }
        Action::Submit(intent) => controller.submit(intent),
        Action::Highlight(square) => match controller.highlights(square).await {
            Ok(targets) => {
                app.set_highlights(square, targets);
                Ok(())
            }
            Err(e) => {
                app.set_status(e.user_message());
                Ok(())
            }
        },
        Action::Reset => {
            controller.reset().await;
            Ok(())
        }
        Action::Acknowledge => controller.acknowledge_game_over().await,
        Action::Quit => Ok(()),
    };
    if let Err(e) = result {
        debug!(error = %e, "Action failed");
    }
}
