//! Reusable TUI widgets.

use courseware_shared::LoadState;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str) -> Paragraph<'_> {
    Paragraph::new(format!(" {msg}"))
        .style(
            Style::default()
                .bg(Color::DarkGray)
                .fg(Color::White),
        )
}

/// One-line rendering of a load state; `None` once content is showing.
pub(crate) fn load_state_line(state: &LoadState) -> Option<Line<'static>> {
    match state {
        LoadState::Initial | LoadState::Loaded => None,
        LoadState::Loading => Some(Line::from("Loading...").style(Style::default().fg(Color::Yellow))),
        LoadState::Empty { message, .. } => {
            Some(Line::from(message.clone()).style(Style::default().fg(Color::DarkGray)))
        }
        LoadState::Failed { message, retryable } => {
            let hint = if *retryable { "  (press R to retry)" } else { "" };
            Some(Line::from(format!("{message}{hint}")).style(Style::default().fg(Color::Red)))
        }
    }
}
