use std::io::Stdout;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use time::OffsetDateTime;

use crate::calendar;
use crate::config::{AppConfig, ConfigPaths};
use crate::feed::{load_feed, FeedError, FeedSource};
use crate::model::FeedEntry;
use crate::ui;

pub mod countdowns;
pub mod state;

pub use countdowns::{CountdownBoard, Surface};
pub use state::{AppState, DetailOverlay, FacetOverlay, OverlayState};

type FeedResult = Result<Vec<FeedEntry>, FeedError>;

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    OpenDetail,
    StartSearch,
    ToggleView,
    TogglePast,
    OpenFacets,
    ClearFilters,
    ExportIcs,
    GoogleCalendar,
    Reload,
}

pub struct App {
    pub config: Arc<AppConfig>,
    paths: ConfigPaths,
    feed_source: Result<FeedSource, String>,
    state: AppState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
    countdowns: CountdownBoard,
    feed_rx: Option<Receiver<FeedResult>>,
    /// Clock reading the current render list was computed against.
    pass_now: OffsetDateTime,
    rendered_generation: Option<u64>,
    rendered_detail: Option<Vec<usize>>,
}

impl App {
    pub fn new(
        config: Arc<AppConfig>,
        paths: ConfigPaths,
        feed_source: Result<FeedSource, FeedError>,
    ) -> Self {
        let state = AppState::new(&config.display);
        let tick_rate = config.tick_rate();
        Self {
            config,
            paths,
            feed_source: feed_source.map_err(|err| err.to_string()),
            state,
            list_state: ListState::default(),
            should_quit: false,
            tick_rate,
            countdowns: CountdownBoard::new(),
            feed_rx: None,
            pass_now: OffsetDateTime::now_utc(),
            rendered_generation: None,
            rendered_detail: None,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_feed_load();
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            self.sync_render_pass();

            let drawn = terminal.draw(|frame| {
                let items = self.state.render_list(self.pass_now);
                if items.is_empty() {
                    self.list_state.select(None);
                } else {
                    self.list_state.select(Some(self.state.selected));
                }
                let view = ui::ViewContext {
                    state: &self.state,
                    items: &items,
                    countdowns: &self.countdowns,
                };
                ui::draw_app(frame, &view, &mut self.list_state);
            });
            if let Err(err) = drawn {
                tracing::error!(?err, "render pass failed");
            }

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    /// Recompute the render list and restart row countdowns when state changed,
    /// and keep detail countdowns in step with the open overlay.
    fn sync_render_pass(&mut self) {
        let generation = self.state.generation();
        if self.rendered_generation != Some(generation) {
            self.pass_now = OffsetDateTime::now_utc();
            let items = self.state.render_list(self.pass_now);
            let len = items.len();
            let ids: Vec<usize> = items
                .iter()
                .flat_map(|item| item.records())
                .map(|record| record.id)
                .collect();
            drop(items);
            self.state.clamp_selection(len);
            let records = ids.iter().filter_map(|id| self.state.record(*id));
            self.countdowns.replace(Surface::Row, records, self.pass_now);
            self.rendered_generation = Some(generation);
        }

        let detail_ids = self.state.detail().map(|detail| detail.record_ids.clone());
        if detail_ids != self.rendered_detail {
            match &detail_ids {
                Some(ids) => {
                    let records = ids.iter().filter_map(|id| self.state.record(*id));
                    self.countdowns
                        .replace(Surface::Detail, records, OffsetDateTime::now_utc());
                }
                None => self.countdowns.clear(Surface::Detail),
            }
            self.rendered_detail = detail_ids;
        }
    }

    fn on_tick(&mut self) {
        self.poll_feed();
        self.countdowns.tick(OffsetDateTime::now_utc());
    }

    fn start_feed_load(&mut self) {
        if self.feed_rx.is_some() {
            return;
        }
        let source = match &self.feed_source {
            Ok(source) => source.clone(),
            Err(message) => {
                tracing::error!(%message, "no usable feed source");
                self.state.set_status_message(Some(format!("Feed unavailable: {message}")));
                return;
            }
        };
        let timeout = self.config.feed.timeout();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let spawned = thread::Builder::new()
            .name("feed-loader".into())
            .spawn(move || {
                let _ = tx.send(load_feed(&source, timeout));
            });
        match spawned {
            Ok(_) => {
                self.feed_rx = Some(rx);
                self.state.loading = true;
                self.state.set_status_message(Some("Loading deadlines..."));
            }
            Err(err) => {
                tracing::error!(?err, "failed to spawn feed loader");
                self.state
                    .set_status_message(Some("Could not start loading deadlines"));
            }
        }
    }

    fn poll_feed(&mut self) {
        let Some(rx) = self.feed_rx.as_ref() else {
            return;
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => {
                tracing::error!("feed loader exited without a result");
                self.feed_rx = None;
                self.state.loading = false;
                self.state.set_deadlines(Vec::new());
                self.state
                    .set_status_message(Some("Error loading data: loader stopped (r to retry)"));
                return;
            }
        };
        self.feed_rx = None;
        self.state.loading = false;
        match outcome {
            Ok(entries) => {
                let count = entries.len();
                self.state.set_deadlines(entries);
                self.state
                    .set_status_message(Some(format!("Loaded {count} deadlines")));
            }
            Err(err) => {
                tracing::error!(error = ?err, "error loading deadline data");
                self.state.set_deadlines(Vec::new());
                self.state
                    .set_status_message(Some(format!("Error loading data: {err} (r to retry)")));
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.search_active {
            match key.code {
                KeyCode::Esc => self.state.cancel_search(),
                KeyCode::Enter => self.state.finish_search(),
                KeyCode::Backspace => self.state.pop_search_char(),
                KeyCode::Char(ch)
                    if !key
                        .modifiers
                        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER) =>
                {
                    self.state.push_search_char(ch)
                }
                _ => {}
            }
            return;
        }

        if key
            .modifiers
            .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
        {
            return;
        }

        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Enter => Some(Action::OpenDetail),
            KeyCode::Char('/') => Some(Action::StartSearch),
            KeyCode::Char('v') => Some(Action::ToggleView),
            KeyCode::Char('p') => Some(Action::TogglePast),
            KeyCode::Char('f') => Some(Action::OpenFacets),
            KeyCode::Char('c') => Some(Action::ClearFilters),
            KeyCode::Char('i') => Some(Action::ExportIcs),
            KeyCode::Char('g') => Some(Action::GoogleCalendar),
            KeyCode::Char('r') => Some(Action::Reload),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::SelectNext => self.move_selection(1),
            Action::SelectPrevious => self.move_selection(-1),
            Action::OpenDetail => {
                let ids = self
                    .state
                    .render_list(self.pass_now)
                    .get(self.state.selected)
                    .map(state::item_record_ids);
                if let Some(ids) = ids {
                    self.state.open_detail(ids);
                }
            }
            Action::StartSearch => self.state.begin_search(),
            Action::ToggleView => {
                let mode = self.state.toggle_view();
                self.state.set_status_message(Some(format!("{mode} view")));
            }
            Action::TogglePast => {
                let shown = self.state.toggle_show_past();
                let message = if shown {
                    "Showing past deadlines"
                } else {
                    "Hiding past deadlines"
                };
                self.state.set_status_message(Some(message));
            }
            Action::OpenFacets => self.state.open_facets(),
            Action::ClearFilters => {
                self.state.clear_all_filters();
                self.state.set_status_message(Some("Filters cleared"));
            }
            Action::ExportIcs => self.export_ics(),
            Action::GoogleCalendar => self.show_google_link(),
            Action::Reload => self.start_feed_load(),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.state.render_list(self.pass_now).len();
        self.state.move_selection(delta, len);
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay {
            Some(OverlayState::Detail(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.state.close_overlay(),
                    KeyCode::Char('j') | KeyCode::Down => self.state.move_detail_stage(1),
                    KeyCode::Char('k') | KeyCode::Up => self.state.move_detail_stage(-1),
                    KeyCode::Char('i') => self.export_ics(),
                    KeyCode::Char('g') => self.show_google_link(),
                    _ => {}
                }
                true
            }
            Some(OverlayState::Facets(_)) => {
                match key.code {
                    KeyCode::Esc | KeyCode::Char('f') | KeyCode::Char('q') => {
                        self.state.close_overlay()
                    }
                    KeyCode::Char('h') | KeyCode::Left => self.state.cycle_facet_category(-1),
                    KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => {
                        self.state.cycle_facet_category(1)
                    }
                    KeyCode::Char('j') | KeyCode::Down => self.state.move_facet_cursor(1),
                    KeyCode::Char('k') | KeyCode::Up => self.state.move_facet_cursor(-1),
                    KeyCode::Char('m') => self.state.toggle_show_more(),
                    KeyCode::Char('c') => {
                        self.state.clear_all_filters();
                        self.state.set_status_message(Some("Filters cleared"));
                    }
                    KeyCode::Char(' ') | KeyCode::Enter => {
                        if let Some((value, selected)) = self.state.toggle_facet_under_cursor() {
                            let verb = if selected { "Added" } else { "Removed" };
                            self.state
                                .set_status_message(Some(format!("{verb} filter: {value}")));
                        }
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::CalendarLink { .. }) => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                    self.state.close_overlay();
                }
                true
            }
            None => false,
        }
    }

    /// Record the calendar actions apply to: the highlighted stage in the detail
    /// view, otherwise the first record of the selected item.
    fn target_record_id(&self) -> Option<usize> {
        if let Some(detail) = self.state.detail() {
            return detail.current_id();
        }
        self.state
            .render_list(self.pass_now)
            .get(self.state.selected)
            .and_then(|item| item.records().first().map(|record| record.id))
    }

    fn export_ics(&mut self) {
        let Some(record) = self.target_record_id().and_then(|id| self.state.record(id)) else {
            return;
        };
        match calendar::write_ics(record, &self.paths.export_dir) {
            Ok(Some(path)) => {
                let message = format!("Saved {}", path.display());
                self.state.set_status_message(Some(message));
            }
            Ok(None) => self
                .state
                .set_status_message(Some("No valid deadline date available for ICS export.")),
            Err(err) => {
                tracing::error!(?err, "ics export failed");
                self.state
                    .set_status_message(Some(format!("ICS export failed: {err}")));
            }
        }
    }

    fn show_google_link(&mut self) {
        let Some(record) = self.target_record_id().and_then(|id| self.state.record(id)) else {
            return;
        };
        match calendar::google_calendar_url(record) {
            Ok(Some(url)) => {
                tracing::info!(id = record.id, %url, "google calendar link");
                let title = record.name_display().to_string();
                self.state.overlay = Some(OverlayState::CalendarLink { title, url });
            }
            Ok(None) => self
                .state
                .set_status_message(Some("No valid deadline date available for Google Calendar.")),
            Err(err) => {
                tracing::error!(?err, "building google calendar link failed");
                self.state
                    .set_status_message(Some(format!("Google Calendar link failed: {err}")));
            }
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
