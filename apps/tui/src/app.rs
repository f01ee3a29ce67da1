//! Core TUI application state and event loop.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use url::Url;

use courseware_core::{
    CourseQuerier, JsonCourseQuerier, MemoryLastAccessedStore, OutlineEnvironment,
    QueuedDownloads, TracingAnalytics,
};
use courseware_search::{ExternalBrowser, HttpSurface, WebSearchHelper};
use courseware_shared::{AppConfig, BlockId, load_config};

use crate::router::{ChannelRouter, NavEvent};
use crate::screens::{DownloadsScreen, FindCoursesScreen, OutlineScreen, ScreenId};
use crate::widgets::status_bar;

/// There is no browser to hand links to from a terminal; they are logged.
struct LogBrowser;

impl ExternalBrowser for LogBrowser {
    fn open(&self, url: &Url) {
        info!(%url, "link left the search page");
    }
}

/// Application state.
pub(crate) struct App {
    /// Currently active screen tab.
    pub active_tab: usize,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether help overlay is visible.
    pub show_help: bool,
    env: OutlineEnvironment,
    /// Outline screens, innermost last.
    outlines: Vec<OutlineScreen>,
    downloads: DownloadsScreen,
    find_courses: FindCoursesScreen,
    navigation: UnboundedReceiver<NavEvent>,
}

impl App {
    pub(crate) fn new(course: &Path, root: Option<BlockId>, config: AppConfig) -> Result<Self> {
        let querier: Arc<dyn CourseQuerier> = Arc::new(JsonCourseQuerier::open(course)?);
        let queue = Arc::new(QueuedDownloads::new());
        let network = Arc::new(config.downloads.clone());
        let (router, navigation) = ChannelRouter::new();

        let env = OutlineEnvironment {
            querier,
            analytics: Arc::new(TracingAnalytics),
            router: Arc::new(router),
            downloads: queue.clone(),
            reachability: network.clone(),
            preferences: network,
            last_accessed: Arc::new(MemoryLastAccessedStore::new()),
        };
        let helper = WebSearchHelper::new(config, Arc::new(HttpSurface::new()?), Arc::new(LogBrowser));

        Ok(Self {
            active_tab: 0,
            should_quit: false,
            status: "Ready. Press ? for help".to_string(),
            show_help: false,
            outlines: vec![OutlineScreen::open(env.clone(), root)],
            env,
            downloads: DownloadsScreen::new(queue),
            find_courses: FindCoursesScreen::new(helper),
            navigation,
        })
    }

    fn current_screen(&self) -> ScreenId {
        ScreenId::ALL[self.active_tab]
    }

    fn is_editing(&self) -> bool {
        self.current_screen() == ScreenId::FindCourses && self.find_courses.is_editing()
    }

    fn outline(&self) -> Option<&OutlineScreen> {
        self.outlines.last()
    }

    fn select_tab(&mut self, idx: usize) {
        self.active_tab = idx;
        self.status = format!("{}", self.current_screen());
        if self.current_screen() == ScreenId::Outline {
            if let Some(outline) = self.outline() {
                outline.appear();
            }
        }
    }

    /// Apply navigation requested by the outline controllers.
    fn drain_navigation(&mut self) {
        while let Ok(event) = self.navigation.try_recv() {
            match event {
                NavEvent::Container {
                    block_id,
                    block_type,
                    ..
                } if block_type.is_container() => {
                    self.status = format!("Opened {block_id}");
                    self.outlines
                        .push(OutlineScreen::open(self.env.clone(), Some(block_id)));
                }
                NavEvent::Container {
                    block_id,
                    parent_id,
                    ..
                } => {
                    self.status = format!("Viewing {block_id}");
                    if let Some(outline) = self.outline() {
                        outline.controller().entered_block(block_id, parent_id);
                    }
                }
                NavEvent::Downloads => {
                    if let Some(idx) = ScreenId::ALL.iter().position(|s| *s == ScreenId::Downloads) {
                        self.select_tab(idx);
                    }
                }
            }
        }
    }

    /// Leave the innermost outline, if there is one to go back to.
    fn back(&mut self) {
        if self.outlines.len() > 1 {
            if let Some(outline) = self.outlines.pop() {
                outline.close();
            }
            if let Some(outline) = self.outline() {
                outline.appear();
            }
            self.status = "Back".to_string();
        }
    }

    fn shutdown(&self) {
        for outline in &self.outlines {
            outline.close();
        }
        self.find_courses.shutdown();
    }
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(course: &Path, root: Option<&str>) -> Result<()> {
    let config = load_config().unwrap_or_else(|e| {
        warn!(error = %e, "unable to load config, using defaults");
        AppConfig::default()
    });
    let mut app = App::new(course, root.map(BlockId::from), config)?;

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &mut app);
    app.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.drain_navigation();
        terminal.draw(|f| draw(f, app))?;

        // Poll for events with 100ms timeout; background loads land in between.
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                handle_key(app, key.code, key.modifiers);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    // Global keybindings (always active)
    match code {
        KeyCode::Char('q') | KeyCode::Char('c')
            if modifiers.contains(KeyModifiers::CONTROL) =>
        {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('q') if !app.is_editing() => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('?') if !app.is_editing() => {
            app.show_help = !app.show_help;
            return;
        }
        KeyCode::Esc if app.show_help => {
            app.show_help = false;
            return;
        }
        // Tab navigation with number keys
        KeyCode::Char(c @ '1'..='3') if !app.is_editing() => {
            app.select_tab((c as usize) - ('1' as usize));
            return;
        }
        KeyCode::Tab if !app.is_editing() => {
            app.select_tab((app.active_tab + 1) % ScreenId::ALL.len());
            return;
        }
        KeyCode::BackTab if !app.is_editing() => {
            let idx = if app.active_tab == 0 {
                ScreenId::ALL.len() - 1
            } else {
                app.active_tab - 1
            };
            app.select_tab(idx);
            return;
        }
        _ => {}
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return;
    }

    // Delegate to current screen
    let status = match app.current_screen() {
        ScreenId::Outline if code == KeyCode::Esc => {
            app.back();
            None
        }
        ScreenId::Outline => app
            .outlines
            .last_mut()
            .and_then(|outline| outline.handle_key(code, modifiers)),
        ScreenId::Downloads => {
            app.downloads.handle_key(code, modifiers);
            None
        }
        ScreenId::FindCourses => app.find_courses.handle_key(code, modifiers),
    };
    if let Some(status) = status {
        app.status = status;
    }
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    // Tab bar
    let tab_titles: Vec<Line> = ScreenId::ALL
        .iter()
        .map(|s| Line::from(format!("{s}")))
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Courseware "),
        )
        .select(app.active_tab)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" │ ");

    f.render_widget(tabs, chunks[0]);

    // Content area, delegated to the screen
    match app.current_screen() {
        ScreenId::Outline => {
            if let Some(outline) = app.outline() {
                outline.draw(f, chunks[1]);
            }
        }
        ScreenId::Downloads => app.downloads.draw(f, chunks[1]),
        ScreenId::FindCourses => app.find_courses.draw(f, chunks[1]),
    }

    // Status bar
    let bar = status_bar(&app.status);
    f.render_widget(bar, chunks[2]);

    // Help overlay
    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 70, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  1-3          Switch to screen"),
        Line::from("  Tab/S-Tab    Next/previous screen"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
        Line::from(""),
        Line::from("Outline:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  ↑/↓ j/k      Move selection"),
        Line::from("  Enter        Open section / view unit"),
        Line::from("  d            Download videos"),
        Line::from("  r / R        Refresh / retry after an error"),
        Line::from("  l            Resume last accessed"),
        Line::from("  g            Show downloads"),
        Line::from("  Esc          Back"),
        Line::from(""),
        Line::from("Find Courses:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  Enter or /   Edit / submit search"),
        Line::from("  R            Retry last search"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help (press any key to close) ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
