//! TUI module - Terminal host for the calendar timeline panel
//!
//! One terminal line per day row. Fetches run on the tokio runtime and come
//! back through an mpsc channel, then go through the controller's update cycle.

use std::io::{Stdout, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use crossterm::{
    ExecutableCommand,
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::calendar::{FetchRequest, WorkoutRef, WorkoutStatus, entry::ordinal_day, fetch_or_empty};
use crate::db::WorkoutStore;
use crate::sheet::DragOrigin;
use crate::timeline::{CalendarTimelineController, TimelineEvent, TimelineRow};

type Tui = Terminal<CrosstermBackend<Stdout>>;

const FRAME: Duration = Duration::from_millis(16);
/// Handle flick speed for J/K, in panel units per second
const FLICK_VELOCITY: f32 = 1500.0;

type FetchResult = (FetchRequest, Vec<WorkoutRef>);

/// App state for TUI
pub struct App {
    controller: CalendarTimelineController,
    source: WorkoutStore,
    results_tx: UnboundedSender<FetchResult>,
    results_rx: UnboundedReceiver<FetchResult>,
    cursor: NaiveDate,
    status: String,
    should_quit: bool,
}

impl App {
    pub fn new(controller: CalendarTimelineController, source: WorkoutStore) -> Self {
        let (results_tx, results_rx) = unbounded_channel();
        let cursor = controller.focus_date();
        Self {
            controller,
            source,
            results_tx,
            results_rx,
            cursor,
            status: String::from("Loading..."),
            should_quit: false,
        }
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> Result<()> {
        self.controller.start();
        let mut terminal = init_terminal()?;
        let result = self.event_loop(&mut terminal).await;
        restore_terminal()?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        let mut events = EventStream::new();
        let mut frames = interval(FRAME);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_frame = Instant::now();

        while !self.should_quit {
            self.dispatch_fetches();
            self.handle_timeline_events();
            terminal.draw(|frame| self.render(frame))?;

            tokio::select! {
                _ = frames.tick() => {
                    let now = Instant::now();
                    self.controller.tick((now - last_frame).as_secs_f32());
                    last_frame = now;
                }
                Some((request, workouts)) = self.results_rx.recv() => {
                    self.apply_result(&request, &workouts);
                }
                event = events.next() => match event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.handle_key(key).await?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => self.should_quit = true,
                },
            }
        }
        Ok(())
    }

    fn dispatch_fetches(&mut self) {
        for request in self.controller.take_fetch_requests() {
            debug!("Spawning {:?} fetch {}..{}", request.kind, request.start, request.end);
            let source = self.source.clone();
            let policy = self.controller.store().fetch_policy().clone();
            let tx = self.results_tx.clone();
            tokio::spawn(async move {
                let workouts = fetch_or_empty(&source, &policy, &request).await;
                // Closed channel means the screen is gone
                let _ = tx.send((request, workouts));
            });
        }
    }

    fn apply_result(&mut self, request: &FetchRequest, workouts: &[WorkoutRef]) {
        self.controller.apply_fetch(request, workouts);
        if !self.controller.is_loading() && self.status == "Loading..." {
            self.status.clear();
        }
    }

    fn handle_timeline_events(&mut self) {
        for event in self.controller.drain_events() {
            match event {
                TimelineEvent::DateSelected(date) => {
                    self.cursor = date;
                    self.status = format!("{} {}", date.format("%B"), ordinal_day(date.day()));
                }
                TimelineEvent::OpenWorkout { workout_id, date } => {
                    info!("Opening workout {} on {}", workout_id, date);
                    self.status = format!("Workout #{workout_id} on {date}: press c to complete");
                }
            }
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let metrics = *self.controller.metrics();
        let sheet = self.controller.sheet();

        let panel_lines = ((sheet.current_height() - metrics.top_inset - metrics.handle_height)
            / metrics.row_height)
            .round()
            .max(1.0) as u16;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(panel_lines + 2),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(3),
            ])
            .split(area);

        // Panel, titled with the active month overlay
        let title = self
            .controller
            .active_month()
            .map(|m| format!(" {} {} ", m.label, m.key.year))
            .unwrap_or_default();
        let loading = if self.controller.is_loading_more() {
            " loading history "
        } else {
            ""
        };
        let lines: Vec<Line> = self
            .controller
            .rows_in_view()
            .iter()
            .take(panel_lines as usize)
            .map(|row| self.render_row(row))
            .collect();
        let panel = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(Line::from(loading).right_aligned()),
        );
        frame.render_widget(panel, chunks[0]);

        // Handle
        let handle = if sheet.is_dragging() { "━━━━━━" } else { "──────" };
        frame.render_widget(
            Paragraph::new(handle)
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::DarkGray)),
            chunks[1],
        );

        if self.controller.show_terminator() {
            frame.render_widget(
                Paragraph::new("· end of timeline ·")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(Color::DarkGray)),
                chunks[2],
            );
        }

        let help = "q: quit | space: open/close | j/k: scroll | ↑/↓: move | enter: select | J/K: flick | c: complete | r: refresh";
        let footer = Paragraph::new(vec![
            Line::from(self.status.as_str()).style(Style::default().fg(Color::Cyan)),
            Line::from(help).style(Style::default().fg(Color::DarkGray)),
        ])
        .block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, chunks[3]);
    }

    fn render_row<'a>(&self, row: &TimelineRow<'a>) -> Line<'a> {
        let date = row.entry.date;
        let mut spans = vec![Span::raw(format!(
            "{} {:>4}  ",
            date.format("%a"),
            ordinal_day(date.day())
        ))];

        if let Some(workout) = &row.entry.workout {
            let color = match workout.status {
                WorkoutStatus::Completed => Color::Green,
                WorkoutStatus::Active => Color::Yellow,
                WorkoutStatus::Pending => Color::White,
            };
            let mark = if row.is_completed() { "✓ " } else { "" };
            spans.push(Span::styled(
                format!("{mark}{}", workout.name),
                Style::default().fg(color),
            ));
        }
        if row.entry.is_today {
            spans.push(Span::styled("  today", Style::default().fg(Color::Cyan)));
        }
        if let Some(label) = row.top_label.or(row.bottom_label) {
            spans.push(Span::styled(
                format!("  {label}"),
                Style::default().fg(Color::DarkGray),
            ));
        }

        let mut style = Style::default();
        if row.is_focus {
            style = style.bold();
        }
        if date == self.cursor {
            style = style.reversed();
        }
        Line::from(spans).style(style)
    }

    async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        let row_height = self.controller.metrics().row_height;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(' ') => {
                let next = if self.controller.sheet().is_collapsed() { 1 } else { 0 };
                self.controller.snap_to_index(next);
            }
            KeyCode::Char('j') => {
                self.controller.scroll_by(row_height);
            }
            KeyCode::Char('k') => {
                self.controller.scroll_by(-row_height);
            }
            KeyCode::PageUp => {
                self.controller.scroll_by(-7.0 * row_height);
            }
            KeyCode::PageDown => {
                self.controller.scroll_by(7.0 * row_height);
            }
            KeyCode::Down => self.move_cursor(1),
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Enter => self.controller.select_date(self.cursor),
            KeyCode::Char('J') => self.flick(FLICK_VELOCITY),
            KeyCode::Char('K') => self.flick(-FLICK_VELOCITY),
            KeyCode::Char('c') => self.complete_cursor_workout().await?,
            KeyCode::Char('r') => {
                self.controller.refresh();
                self.status = String::from("Refreshing...");
            }
            _ => {}
        }
        Ok(())
    }

    fn move_cursor(&mut self, step: i64) {
        let dates = self.controller.dates();
        let Some(index) = self.controller.store().index_of(self.cursor) else {
            if let Some(last) = dates.last() {
                self.cursor = last.date;
            }
            return;
        };
        let Some(next) = index
            .checked_add_signed(step as isize)
            .and_then(|i| dates.get(i))
            .map(|e| e.date)
        else {
            return;
        };
        self.cursor = next;

        if self.controller.sheet().is_collapsed() {
            self.controller.set_focus_date(next);
            return;
        }

        // Keep the cursor inside the open panel
        let metrics = *self.controller.metrics();
        let sheet = self.controller.sheet();
        let top = metrics.row_at(sheet.scroll_offset());
        let visible = metrics.visible_rows(sheet.current_height()).max(1);
        let next_index = (index as i64 + step) as usize;
        if next_index < top {
            self.controller.scroll_by(-metrics.row_height);
        } else if next_index >= top + visible {
            self.controller.scroll_by(metrics.row_height);
        }
    }

    fn flick(&mut self, velocity: f32) {
        if self.controller.begin_drag(DragOrigin::Handle) {
            let row_height = self.controller.metrics().row_height;
            self.controller.drag_to(velocity.signum() * row_height);
            self.controller.release_drag(velocity);
        }
    }

    async fn complete_cursor_workout(&mut self) -> Result<()> {
        let workout = self
            .controller
            .store()
            .index_of(self.cursor)
            .and_then(|i| self.controller.dates()[i].workout.clone());
        let Some(workout) = workout else {
            self.status = String::from("No workout on this day");
            return Ok(());
        };
        if workout.is_completed() {
            self.status = format!("{} is already completed", workout.name);
            return Ok(());
        }

        self.source
            .database()
            .lock()
            .await
            .set_status(workout.id, WorkoutStatus::Completed)?;
        info!("Completed workout {}", workout.id);
        self.status = format!("Completed {}", workout.name);
        self.controller.refresh();
        Ok(())
    }
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DateSequenceStore;
    use crate::config::CalendarConfig;
    use crate::db::{Database, NewWorkout};
    use crossterm::event::KeyModifiers;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn loaded_app() -> App {
        let today = date(2024, 3, 15);
        let db = Database::open_in_memory().unwrap();
        db.add_workout(&NewWorkout {
            user_id: "u1".into(),
            date: date(2024, 3, 14),
            name: "Push".into(),
            status: WorkoutStatus::Pending,
        })
        .unwrap();

        let config = CalendarConfig::default();
        let store = DateSequenceStore::new(Some("u1".into()), &config).with_today(today);
        let controller = CalendarTimelineController::new(store, &config, today);
        let mut app = App::new(controller, WorkoutStore::new(db));

        app.controller.start();
        app.dispatch_fetches();
        let (request, workouts) = app.results_rx.recv().await.unwrap();
        app.apply_result(&request, &workouts);
        app
    }

    fn settle(app: &mut App) {
        for _ in 0..600 {
            if !app.controller.is_animating() {
                break;
            }
            app.controller.tick(1.0 / 60.0);
        }
    }

    #[tokio::test]
    async fn test_load_result_clears_status() {
        let app = loaded_app().await;
        assert_eq!(app.controller.dates().len(), 92);
        assert!(app.status.is_empty());
    }

    #[tokio::test]
    async fn test_space_toggles_panel() {
        let mut app = loaded_app().await;
        app.handle_key(key(KeyCode::Char(' '))).await.unwrap();
        settle(&mut app);
        assert_eq!(app.controller.sheet().current_index(), 1);

        app.handle_key(key(KeyCode::Char(' '))).await.unwrap();
        settle(&mut app);
        assert!(app.controller.sheet().is_collapsed());
    }

    #[tokio::test]
    async fn test_select_and_complete_workout() {
        let mut app = loaded_app().await;
        app.handle_key(key(KeyCode::Up)).await.unwrap();
        assert_eq!(app.cursor, date(2024, 3, 14));

        app.handle_key(key(KeyCode::Enter)).await.unwrap();
        app.handle_timeline_events();
        assert!(app.status.starts_with("Workout #1"));

        app.handle_key(key(KeyCode::Char('c'))).await.unwrap();
        assert_eq!(app.status, "Completed Push");
        app.dispatch_fetches();
        let (request, workouts) = app.results_rx.recv().await.unwrap();
        app.apply_result(&request, &workouts);

        let index = app.controller.store().index_of(date(2024, 3, 14)).unwrap();
        let workout = app.controller.dates()[index].workout.as_ref().unwrap();
        assert!(workout.is_completed());
    }

    #[tokio::test]
    async fn test_quit_keys() {
        let mut app = loaded_app().await;
        app.handle_key(key(KeyCode::Char('q'))).await.unwrap();
        assert!(app.should_quit);
    }
}
