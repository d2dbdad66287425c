use std::collections::VecDeque;

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::catalog::{Catalog, LoadStatus, RootBatch};
use crate::cancel::{CancelToken, Scope, ScopeTokens};
use crate::config::AppConfig;
use crate::predict::{self, PredictionRequest, PredictionResult};
use crate::selection::{Change, Field, HistoryMode, Selection};

const MAX_LOGS: usize = 200;

/// Form rows in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    League,
    Season,
    HomeTeam,
    AwayTeam,
    CutoffDate,
    HistoryMode,
    HistoryValue,
    Predict,
}

impl FormField {
    pub const ALL: [FormField; 8] = [
        FormField::League,
        FormField::Season,
        FormField::HomeTeam,
        FormField::AwayTeam,
        FormField::CutoffDate,
        FormField::HistoryMode,
        FormField::HistoryValue,
        FormField::Predict,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictionState {
    pub busy: bool,
    pub result: Option<PredictionResult>,
    pub error: Option<String>,
}

impl PredictionState {
    fn clear(&mut self) {
        self.busy = false;
        self.result = None;
        self.error = None;
    }
}

/// Work for the provider. Each command carries the token of the scope it belongs to.
#[derive(Debug, Clone)]
pub enum ProviderCommand {
    LoadRoot {
        token: CancelToken,
    },
    LoadSeasons {
        league: String,
        token: CancelToken,
    },
    Predict {
        request: PredictionRequest,
        token: CancelToken,
    },
    CheckHealth {
        token: CancelToken,
    },
}

/// Results from the provider, tagged with the id of the token they were issued under.
#[derive(Debug, Clone)]
pub enum Delta {
    RootLoaded {
        token: u64,
        batch: RootBatch,
    },
    RootFailed {
        token: u64,
        message: String,
    },
    SeasonsLoaded {
        token: u64,
        league: String,
        seasons: Vec<String>,
    },
    SeasonsFailed {
        token: u64,
        league: String,
        message: String,
    },
    PredictionFinished {
        token: u64,
        result: Result<PredictionResult, String>,
    },
    Health {
        token: u64,
        result: Result<bool, String>,
    },
    Log(String),
}

#[derive(Debug)]
pub struct AppState {
    pub selection: Selection,
    pub catalog: Catalog,
    pub prediction: PredictionState,
    pub focus: FormField,
    pub api_healthy: Option<bool>,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    tokens: ScopeTokens,
    outbox: Vec<ProviderCommand>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let defaults = AppConfig::default();
        Self::with_selection(Selection::new(
            Local::now().date_naive(),
            defaults.history_mode,
            defaults.history_value,
        ))
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::with_selection(Selection::new(
            Local::now().date_naive(),
            cfg.history_mode,
            cfg.history_value,
        ))
    }

    pub fn with_selection(selection: Selection) -> Self {
        Self {
            selection,
            catalog: Catalog::new(),
            prediction: PredictionState::default(),
            focus: FormField::League,
            api_healthy: None,
            logs: VecDeque::new(),
            help_overlay: false,
            tokens: ScopeTokens::new(),
            outbox: Vec::new(),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    /// Commands queued since the last call, in issue order.
    pub fn take_commands(&mut self) -> Vec<ProviderCommand> {
        std::mem::take(&mut self.outbox)
    }

    pub fn is_scope_live(&self, scope: Scope) -> bool {
        self.tokens.is_live(scope)
    }

    /// Page-level error: the root chain failed and nothing from it may be shown.
    pub fn page_error(&self) -> Option<&str> {
        match &self.catalog.root_status {
            LoadStatus::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn check_health(&mut self) {
        let token = self.tokens.begin(Scope::Health);
        self.outbox.push(ProviderCommand::CheckHealth { token });
    }

    /// (Re)starts the league/team chain, cancelling any root batch still in flight.
    pub fn request_root_load(&mut self) {
        let token = self.tokens.begin(Scope::Root);
        self.catalog.begin_root();
        self.outbox.push(ProviderCommand::LoadRoot { token });
    }

    fn request_seasons(&mut self) {
        if self.selection.league.is_empty() {
            self.tokens.cancel(Scope::Seasons);
            return;
        }
        let token = self.tokens.begin(Scope::Seasons);
        self.catalog.begin_seasons();
        self.outbox.push(ProviderCommand::LoadSeasons {
            league: self.selection.league.clone(),
            token,
        });
    }

    /// Applies a user edit through the cascade table.
    pub fn apply_change(&mut self, change: Change) {
        let league_changed = matches!(change, Change::League(_));
        let cleared = self.selection.apply(change);
        if cleared.is_empty() {
            return;
        }
        if cleared.contains(&Field::Result) {
            self.invalidate_result();
        }
        if league_changed {
            self.request_seasons();
        }
    }

    /// Drops the displayed result and any prediction still in flight for the old inputs.
    fn invalidate_result(&mut self) {
        self.tokens.cancel(Scope::Predict);
        self.prediction.clear();
    }

    pub fn select_league(&mut self, league: impl Into<String>) {
        self.apply_change(Change::League(league.into()));
    }

    /// Clears the previous outcome, validates and queues the request.
    pub fn request_prediction(&mut self) {
        self.invalidate_result();
        self.prediction.busy = true;
        match predict::build_request(&self.selection) {
            Ok(request) => {
                let token = self.tokens.begin(Scope::Predict);
                self.outbox.push(ProviderCommand::Predict { request, token });
            }
            Err(err) => {
                self.prediction.busy = false;
                self.prediction.error = Some(err.to_string());
            }
        }
    }

    /// Cancels everything this view started.
    pub fn teardown(&mut self) {
        self.tokens.cancel_all();
        self.catalog.settle_cancelled();
        self.prediction.busy = false;
    }

    pub fn cycle_league(&mut self, forward: bool) {
        let leagues = self.catalog.leagues().to_vec();
        if let Some(next) = cycle(&leagues, Some(&self.selection.league), forward, false) {
            self.select_league(next);
        }
    }

    pub fn cycle_season(&mut self, forward: bool) {
        let seasons = self.catalog.seasons(&self.selection.league).to_vec();
        let next = cycle(&seasons, self.selection.season.as_ref(), forward, true);
        self.apply_change(Change::Season(next));
    }

    pub fn cycle_team(&mut self, home: bool, forward: bool) {
        let values: Vec<String> = self
            .catalog
            .teams(&self.selection.league)
            .iter()
            .map(|t| t.value.clone())
            .collect();
        let current = if home {
            &self.selection.home_team
        } else {
            &self.selection.away_team
        };
        let current = (!current.is_empty()).then(|| current.clone());
        let next = cycle(&values, current.as_ref(), forward, true).unwrap_or_default();
        if home {
            self.apply_change(Change::HomeTeam(next));
        } else {
            self.apply_change(Change::AwayTeam(next));
        }
    }

    pub fn shift_cutoff(&mut self, days: i64) {
        let base = self
            .selection
            .cutoff_date
            .unwrap_or_else(|| Local::now().date_naive());
        let next = base
            .checked_add_signed(chrono::Duration::days(days))
            .unwrap_or(base);
        self.apply_change(Change::CutoffDate(Some(next)));
    }

    pub fn set_cutoff(&mut self, date: Option<NaiveDate>) {
        self.apply_change(Change::CutoffDate(date));
    }

    pub fn toggle_history_mode(&mut self) {
        let next = self.selection.history_mode.toggled();
        self.apply_change(Change::HistoryMode(next));
    }

    pub fn set_history_mode(&mut self, mode: HistoryMode) {
        self.apply_change(Change::HistoryMode(mode));
    }

    pub fn step_history_value(&mut self, delta: i64) {
        let next = (i64::from(self.selection.history_value) + delta).clamp(1, i64::from(u32::MAX));
        self.apply_change(Change::HistoryValue(next as u32));
    }

    /// Changes the focused field one step.
    pub fn adjust_focused(&mut self, forward: bool) {
        match self.focus {
            FormField::League => self.cycle_league(forward),
            FormField::Season => self.cycle_season(forward),
            FormField::HomeTeam => self.cycle_team(true, forward),
            FormField::AwayTeam => self.cycle_team(false, forward),
            FormField::CutoffDate => self.shift_cutoff(if forward { 1 } else { -1 }),
            FormField::HistoryMode => self.toggle_history_mode(),
            FormField::HistoryValue => self.step_history_value(if forward { 1 } else { -1 }),
            FormField::Predict => {}
        }
    }
}

/// Next/previous entry of `options`. With `allow_none`, an extra "unset" slot sits before
/// the first entry.
fn cycle(
    options: &[String],
    current: Option<&String>,
    forward: bool,
    allow_none: bool,
) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let slots = options.len() + usize::from(allow_none);
    let offset = usize::from(allow_none);
    let pos = match current.and_then(|c| options.iter().position(|o| o == c)) {
        Some(i) => i + offset,
        None if allow_none => 0,
        None => slots - 1,
    };
    let next = if forward {
        (pos + 1) % slots
    } else {
        (pos + slots - 1) % slots
    };
    if allow_none && next == 0 {
        None
    } else {
        options.get(next - offset).cloned()
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::RootLoaded { token, batch } => {
            if !state.tokens.is_current(Scope::Root, token) {
                debug!(token, "discarding stale root batch");
                return;
            }
            state.tokens.finish(Scope::Root, token);
            let leagues = batch.leagues.len();
            state.catalog.apply_root(batch);
            state.push_log(format!("[INFO] Loaded {leagues} leagues"));
            let sorted = state.catalog.leagues().to_vec();
            let selected = state.selection.league.clone();
            if !selected.is_empty() && !sorted.contains(&selected) {
                // The reload dropped the chosen league; reset it through the cascade.
                state.push_log(format!("[WARN] League {selected} is no longer available"));
                state.apply_change(Change::League(String::new()));
            }
            let adopted = state.selection.offer_default_league(&sorted);
            let kept_idle = !state.selection.league.is_empty()
                && !state.tokens.is_live(Scope::Seasons);
            if adopted || kept_idle {
                state.request_seasons();
            }
        }
        Delta::RootFailed { token, message } => {
            if !state.tokens.is_current(Scope::Root, token) {
                debug!(token, "discarding stale root failure");
                return;
            }
            state.tokens.finish(Scope::Root, token);
            state.push_log(format!("[WARN] Loading leagues failed: {message}"));
            state.catalog.fail_root(message);
        }
        Delta::SeasonsLoaded {
            token,
            league,
            seasons,
        } => {
            if !state.tokens.is_current(Scope::Seasons, token) {
                debug!(token, league = %league, "discarding stale seasons");
                return;
            }
            state.tokens.finish(Scope::Seasons, token);
            if state.selection.offer_default_season(&league, &seasons) {
                // An adopted default is an input change like any other.
                state.invalidate_result();
            }
            state.catalog.apply_seasons(league, seasons);
        }
        Delta::SeasonsFailed {
            token,
            league,
            message,
        } => {
            if !state.tokens.is_current(Scope::Seasons, token) {
                return;
            }
            state.tokens.finish(Scope::Seasons, token);
            debug!(league = %league, error = %message, "seasons unavailable");
            state.catalog.fail_seasons(&league, message);
        }
        Delta::PredictionFinished { token, result } => {
            if !state.tokens.is_current(Scope::Predict, token) {
                debug!(token, "discarding stale prediction");
                return;
            }
            state.tokens.finish(Scope::Predict, token);
            state.prediction.busy = false;
            match result {
                Ok(result) => {
                    state.prediction.error = None;
                    state.prediction.result = Some(result);
                }
                Err(message) => {
                    state.push_log(format!("[WARN] Prediction failed: {message}"));
                    state.prediction.result = None;
                    state.prediction.error = Some(message);
                }
            }
        }
        Delta::Health { token, result } => {
            if !state.tokens.is_current(Scope::Health, token) {
                return;
            }
            state.tokens.finish(Scope::Health, token);
            match result {
                Ok(healthy) => state.api_healthy = Some(healthy),
                Err(message) => {
                    state.api_healthy = Some(false);
                    state.push_log(format!("[WARN] Health check failed: {message}"));
                }
            }
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}
