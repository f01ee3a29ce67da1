//! "Outline" screen: one level of the course tree, grouped by header.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block as Pane, Borders, Clear, List, ListItem, Paragraph};
use tracing::warn;

use courseware_core::{
    CourseQuerier, DownloadOutcome, OutlineEnvironment, OutlineScreenController, OutlineView,
};
use courseware_shared::{Block, BlockId, BlockType};

use crate::widgets::load_state_line;

pub(crate) struct OutlineScreen {
    controller: Arc<OutlineScreenController>,
    querier: Arc<dyn CourseQuerier>,
    selected: usize,
}

/// A selectable row and the header it sits under.
struct Row {
    block: Block,
    parent_id: BlockId,
}

fn rows(view: &OutlineView) -> Vec<Row> {
    view.groups
        .iter()
        .flat_map(|group| {
            group.children.iter().map(|block| Row {
                block: block.clone(),
                parent_id: group.block.id.clone(),
            })
        })
        .collect()
}

impl OutlineScreen {
    /// Create the screen and start loading it.
    pub(crate) fn open(env: OutlineEnvironment, root: Option<BlockId>) -> Self {
        let querier = Arc::clone(&env.querier);
        let controller = Arc::new(OutlineScreenController::new(env, root));
        controller.start();
        let screen = Self {
            controller,
            querier,
            selected: 0,
        };
        screen.appear();
        screen
    }

    /// The screen became visible again.
    pub(crate) fn appear(&self) {
        let controller = Arc::clone(&self.controller);
        tokio::spawn(async move { controller.view_will_appear().await });
    }

    pub(crate) fn controller(&self) -> &OutlineScreenController {
        &self.controller
    }

    pub(crate) fn close(&self) {
        self.controller.shutdown();
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let view = self.controller.view();
        let rows = rows(&view);
        let selected = self.selected.min(rows.len().saturating_sub(1));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(if view.last_accessed.is_some() { 3 } else { 0 }),
                Constraint::Min(1),    // Outline
                Constraint::Length(1), // Load state / hints
            ])
            .split(area);

        if let Some(item) = &view.last_accessed {
            let resume = Paragraph::new(format!("{}  (press l to resume)", item.display_name)).block(
                Pane::default()
                    .borders(Borders::ALL)
                    .title(" Last accessed "),
            );
            f.render_widget(resume, chunks[0]);
        }

        let mut items: Vec<ListItem> = Vec::new();
        let mut row_index = 0;
        for group in &view.groups {
            items.push(
                ListItem::new(group.block.display_name.clone())
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            );
            for block in &group.children {
                let is_selected = row_index == selected;
                let is_highlighted = view.highlighted.as_ref() == Some(&block.id);
                let style = if is_selected {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else if is_highlighted {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                let prefix = if is_selected { "▸ " } else { "  " };
                let kind = if block.block_type == BlockType::Video { "▶" } else { " " };
                items.push(ListItem::new(format!("{prefix}{kind} {}", block.display_name)).style(style));
                row_index += 1;
            }
        }

        let title = match &view.title {
            Some(title) if view.refreshing => format!(" {title} (refreshing) "),
            Some(title) => format!(" {title} "),
            None => " Outline ".to_string(),
        };
        let list = List::new(items).block(Pane::default().borders(Borders::ALL).title(title));
        f.render_widget(list, chunks[1]);

        let footer = load_state_line(&view.load_state).unwrap_or_else(|| {
            Line::from("Enter open · d download · r refresh · l resume · g downloads · Esc back")
                .style(Style::default().fg(Color::DarkGray))
        });
        f.render_widget(Paragraph::new(footer).alignment(Alignment::Center), chunks[2]);

        if let Some(message) = &view.overlay_message {
            let width = (message.chars().count() as u16 + 4).min(area.width);
            let popup = Rect {
                x: area.x + area.width.saturating_sub(width) / 2,
                y: area.y + area.height / 2,
                width,
                height: 3.min(area.height),
            };
            f.render_widget(Clear, popup);
            f.render_widget(
                Paragraph::new(message.as_str())
                    .alignment(Alignment::Center)
                    .block(Pane::default().borders(Borders::ALL))
                    .style(Style::default().fg(Color::White).bg(Color::Red)),
                popup,
            );
        }
    }

    /// Handle a key; returns a status message when there is something to say.
    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) -> Option<String> {
        let view = self.controller.view();
        if view.overlay_message.is_some() {
            self.controller.dismiss_overlay();
            return None;
        }

        let rows = rows(&view);
        self.selected = self.selected.min(rows.len().saturating_sub(1));

        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < rows.len() {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Enter => {
                let row = rows.get(self.selected)?;
                self.controller.choose_block(&row.block, &row.parent_id);
                None
            }
            KeyCode::Char('r') => {
                self.controller.refresh();
                Some("Refreshing outline...".to_string())
            }
            KeyCode::Char('R') if view.load_state.is_failed() => {
                self.controller.retry();
                Some("Retrying...".to_string())
            }
            KeyCode::Char('d') => {
                let row = rows.get(self.selected)?;
                Some(self.download(&row.block))
            }
            KeyCode::Char('g') => {
                self.controller.show_downloads();
                None
            }
            KeyCode::Char('l') => {
                let controller = Arc::clone(&self.controller);
                tokio::spawn(async move { controller.resume_last_accessed().await });
                None
            }
            _ => None,
        }
    }

    fn download(&self, block: &Block) -> String {
        if block.block_type == BlockType::Video {
            return match self.controller.download_video(block) {
                DownloadOutcome::Enqueued => format!("Queued {}", block.display_name),
                DownloadOutcome::Blocked => "Download blocked".to_string(),
            };
        }

        let controller = Arc::clone(&self.controller);
        let querier = Arc::clone(&self.querier);
        let owned = block.clone();
        tokio::spawn(async move {
            match querier.children_of(Some(&owned.id)).await {
                Ok(group) => {
                    let videos = group.videos();
                    if !videos.is_empty() {
                        controller.download_videos(&videos, &owned).await;
                    }
                }
                Err(e) => warn!(block_id = %owned.id, error = %e, "unable to list videos"),
            }
        });
        format!("Queueing videos in {}...", block.display_name)
    }
}
