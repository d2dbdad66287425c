use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph};

use matchday_predict::api::ApiClient;
use matchday_predict::catalog::LoadStatus;
use matchday_predict::config::{self, AppConfig};
use matchday_predict::logging;
use matchday_predict::present::{PLACEHOLDER, ResultView};
use matchday_predict::provider;
use matchday_predict::selection::HistoryMode;
use matchday_predict::state::{AppState, Delta, FormField, ProviderCommand, apply_delta};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: mpsc::Sender<ProviderCommand>,
    api_url: String,
}

impl App {
    fn new(cfg: &AppConfig, cmd_tx: mpsc::Sender<ProviderCommand>) -> Self {
        Self {
            state: AppState::from_config(cfg),
            should_quit: false,
            cmd_tx,
            api_url: cfg.api_url.clone(),
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay {
            self.state.help_overlay = false;
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.state.push_log("[INFO] Reloading leagues and teams");
                self.state.request_root_load();
            }
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => {
                self.state.focus = self.state.focus.next()
            }
            KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => {
                self.state.focus = self.state.focus.prev()
            }
            KeyCode::Char('l') | KeyCode::Right => self.state.adjust_focused(true),
            KeyCode::Char('h') | KeyCode::Left => self.state.adjust_focused(false),
            KeyCode::Char(']') if self.state.focus == FormField::CutoffDate => {
                self.state.shift_cutoff(7)
            }
            KeyCode::Char('[') if self.state.focus == FormField::CutoffDate => {
                self.state.shift_cutoff(-7)
            }
            KeyCode::Char('t') if self.state.focus == FormField::CutoffDate => {
                self.state.set_cutoff(Some(Local::now().date_naive()))
            }
            KeyCode::Char('x') if self.state.focus == FormField::CutoffDate => {
                self.state.set_cutoff(None)
            }
            KeyCode::Char('p') => self.predict(),
            KeyCode::Enter if self.state.focus == FormField::Predict => self.predict(),
            _ => {}
        }
    }

    fn predict(&mut self) {
        if self.state.page_error().is_some() || self.state.catalog.root_status.is_loading() {
            return;
        }
        self.state.request_prediction();
    }

    fn flush_commands(&mut self) {
        for cmd in self.state.take_commands() {
            if self.cmd_tx.send(cmd).is_err() {
                self.state.push_log("[WARN] Provider unavailable");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    let cfg = AppConfig::from_env();
    let log_path = logging::init_file().ok();
    let api = ApiClient::from_config(&cfg)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let provider = provider::spawn_provider(api, tx, cmd_rx);

    let mut app = App::new(&cfg, cmd_tx);
    if let Some(path) = log_path {
        app.state
            .push_log(format!("[INFO] Logging to {}", path.display()));
    }
    app.state.check_health();
    app.state.request_root_load();
    let res = run_app(&mut terminal, &mut app, rx);

    app.state.teardown();
    drop(app);
    let _ = provider.join();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        app.flush_commands();
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }
        app.flush_commands();

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(app))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    render_body(frame, chunks[1], &app.state);

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(
        "j/k Move | h/l Change | [ ] ±7d | t Today | p Predict | r Reload | ? Help | q Quit",
    );
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(app: &App) -> String {
    let health = match app.state.api_healthy {
        Some(true) => "API ok",
        Some(false) => "API down",
        None => "API ?",
    };
    let root = match &app.state.catalog.root_status {
        LoadStatus::Idle => "idle",
        LoadStatus::Loading => "loading",
        LoadStatus::Ready => "ready",
        LoadStatus::Failed(_) => "failed",
    };
    format!(
        "MATCHDAY PREDICT | {} | {} | data: {}",
        app.api_url, health, root
    )
}

fn render_body(frame: &mut Frame, area: Rect, state: &AppState) {
    if state.catalog.root_status.is_loading() {
        let loading = Paragraph::new("Loading…").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(loading, area);
        return;
    }
    if let Some(message) = state.page_error() {
        let error = Paragraph::new(format!("Error: {message}\n\nPress r to retry."))
            .style(Style::default().fg(Color::Red));
        frame.render_widget(error, area);
        return;
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let form = Paragraph::new(form_lines(state))
        .block(Block::default().title("Predict match").borders(Borders::ALL));
    frame.render_widget(form, columns[0]);

    render_result(frame, columns[1], state);
}

fn form_lines(state: &AppState) -> Vec<Line<'static>> {
    let sel = &state.selection;
    let team_label = |value: &str| -> String {
        if value.is_empty() {
            return "— choose —".to_string();
        }
        state
            .catalog
            .teams(&sel.league)
            .iter()
            .find(|t| t.value == value)
            .map(|t| t.display_label().to_string())
            .unwrap_or_else(|| value.to_string())
    };
    let season = match (&sel.season, &state.catalog.seasons_status) {
        (Some(season), _) => season.clone(),
        (None, LoadStatus::Loading) => "loading…".to_string(),
        (None, _) => "— all —".to_string(),
    };
    let predict = if state.prediction.busy {
        "[ Computing… ]"
    } else {
        "[ Predict ]"
    };

    FormField::ALL
        .iter()
        .map(|field| {
            let (label, value) = match field {
                FormField::League => ("League", non_empty_or(&sel.league, "— none —")),
                FormField::Season => ("Season", season.clone()),
                FormField::HomeTeam => ("Home", team_label(&sel.home_team)),
                FormField::AwayTeam => ("Away", team_label(&sel.away_team)),
                FormField::CutoffDate => (
                    "Cutoff date",
                    sel.cutoff_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_else(|| "— choose —".to_string()),
                ),
                FormField::HistoryMode => ("History", history_mode_label(sel.history_mode)),
                FormField::HistoryValue => ("History value", sel.history_value.to_string()),
                FormField::Predict => ("", predict.to_string()),
            };
            let focused = *field == state.focus;
            let style = if focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            let marker = if focused { "›" } else { " " };
            Line::from(vec![
                Span::raw(format!("{marker} {label:<14}")),
                Span::styled(value, style),
            ])
        })
        .collect()
}

fn render_result(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Result").borders(Borders::ALL);

    if let Some(error) = &state.prediction.error {
        let p = Paragraph::new(error.clone())
            .style(Style::default().fg(Color::Red))
            .block(block);
        frame.render_widget(p, area);
        return;
    }
    let Some(result) = &state.prediction.result else {
        let text = if state.prediction.busy {
            "Computing…"
        } else {
            "No prediction yet"
        };
        let p = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(p, area);
        return;
    };

    let inner = block.inner(area);
    frame.render_widget(block, area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(inner);

    let view = ResultView::from(result);
    let text = view
        .rows()
        .into_iter()
        .map(|(label, value)| format!("{label:<17}{value}"))
        .collect::<Vec<_>>()
        .join("\n");
    frame.render_widget(Paragraph::new(text), rows[0]);
    frame.render_widget(
        win_bar_chart(result.p_home, result.p_draw, result.p_away),
        rows[1],
    );
}

fn win_bar_chart(home: Option<f64>, draw: Option<f64>, away: Option<f64>) -> BarChart<'static> {
    let bar = |p: Option<f64>, color: Color| {
        Bar::default()
            .value((p.unwrap_or(0.0) * 100.0).round().max(0.0) as u64)
            .text_value(String::new())
            .style(Style::default().fg(color))
    };
    let bars = [
        bar(home, Color::Green),
        bar(draw, Color::Yellow),
        bar(away, Color::Red),
    ];
    BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .group_gap(0)
        .max(100)
}

fn history_mode_label(mode: HistoryMode) -> String {
    match mode {
        HistoryMode::LastN => "last N matches".to_string(),
        HistoryMode::LastDays => "last N days".to_string(),
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return PLACEHOLDER.to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Matchday Predict - Help",
        "",
        "Form:",
        "  j/k or ↑/↓   Move between fields",
        "  h/l or ←/→   Change value",
        "  [ / ]        Cutoff date -7 / +7 days",
        "  t / x        Cutoff today / clear",
        "  Enter        Predict (on the button)",
        "",
        "Global:",
        "  p            Predict",
        "  r            Reload leagues and teams",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
