//! "Find Courses" screen: search bar over the course catalog.

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use courseware_search::WebSearchHelper;

use crate::widgets::load_state_line;

pub(crate) struct FindCoursesScreen {
    helper: WebSearchHelper,
    query: String,
    editing: bool,
    error: Option<String>,
}

impl FindCoursesScreen {
    pub(crate) fn new(helper: WebSearchHelper) -> Self {
        Self {
            helper,
            query: String::new(),
            editing: false,
            error: None,
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Search bar
                Constraint::Min(1),    // Page
            ])
            .split(area);

        let bar_style = if self.editing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let bar = Paragraph::new(self.query.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Search courses (Enter to edit / submit) ")
                .border_style(bar_style),
        );
        f.render_widget(bar, chunks[0]);

        let mut lines = Vec::new();
        if let Some(url) = self.helper.current_request() {
            lines.push(Line::from(format!("Request: {url}")));
        }
        if let Some(line) = load_state_line(&self.helper.load_state()) {
            lines.push(line);
        } else if let Some(page) = self.helper.page().filter(|_| self.helper.is_loaded()) {
            lines.push(Line::from(format!(
                "{} {}",
                page.status,
                page.title.as_deref().unwrap_or("(untitled)")
            )));
            lines.push(Line::from(format!("{} bytes from {}", page.body_len, page.url)));
        }
        if let Some(error) = &self.error {
            lines.push(Line::from(error.clone()).style(Style::default().fg(Color::Red)));
        }

        let page = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Results "));
        f.render_widget(page, chunks[1]);
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) -> Option<String> {
        if self.editing {
            match code {
                KeyCode::Esc => self.editing = false,
                KeyCode::Backspace => {
                    self.query.pop();
                }
                KeyCode::Char(c) => self.query.push(c),
                KeyCode::Enter => {
                    self.editing = false;
                    return Some(self.submit());
                }
                _ => {}
            }
            return None;
        }

        match code {
            KeyCode::Enter | KeyCode::Char('/') => {
                self.editing = true;
                None
            }
            KeyCode::Char('R') => self
                .helper
                .retry()
                .map(|_| "Retrying search...".to_string()),
            _ => None,
        }
    }

    fn submit(&mut self) -> String {
        match self.helper.search_submitted(&self.query) {
            Ok(_) => {
                self.error = None;
                format!("Searching for \"{}\"...", self.query.trim())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                "Search failed".to_string()
            }
        }
    }

    pub(crate) fn shutdown(&self) {
        self.helper.shutdown();
    }
}
