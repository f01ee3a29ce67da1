//! "Downloads" screen: videos queued for download.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use courseware_core::QueuedDownloads;

pub(crate) struct DownloadsScreen {
    queue: Arc<QueuedDownloads>,
    selected: usize,
}

impl DownloadsScreen {
    pub(crate) fn new(queue: Arc<QueuedDownloads>) -> Self {
        Self { queue, selected: 0 }
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let queued = self.queue.queued();
        let area = area.inner(Margin::new(1, 1));

        if queued.is_empty() {
            let empty = Paragraph::new(
                "Nothing queued yet.\n\nPress 'd' on an outline row to download its videos.",
            )
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Downloads "));
            f.render_widget(empty, area);
            return;
        }

        let selected = self.selected.min(queued.len() - 1);
        let items: Vec<ListItem> = queued
            .iter()
            .enumerate()
            .map(|(i, video)| {
                let style = if i == selected {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                let prefix = if i == selected { "▸ " } else { "  " };
                let source = video.video_url.as_deref().unwrap_or("(resolved on download)");
                ListItem::new(format!("{prefix}{}  {source}", video.block_id)).style(style)
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Downloads ({}) ", queued.len())),
        );
        f.render_widget(list, area);
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) {
        let len = self.queue.queued().len();
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.min(len.saturating_sub(1)).saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < len {
                    self.selected += 1;
                }
            }
            _ => {}
        }
    }
}
