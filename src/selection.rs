use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Shape of the "recent form" window sent with a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    /// Last N matches before the cutoff.
    LastN,
    /// Matches in the last N days before the cutoff.
    LastDays,
}

impl HistoryMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "last_n" | "n" | "matches" => Some(HistoryMode::LastN),
            "last_days" | "days" => Some(HistoryMode::LastDays),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HistoryMode::LastN => "last_n",
            HistoryMode::LastDays => "last_days",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            HistoryMode::LastN => HistoryMode::LastDays,
            HistoryMode::LastDays => HistoryMode::LastN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    League,
    Season,
    HomeTeam,
    AwayTeam,
    CutoffDate,
    HistoryMode,
    HistoryValue,
    /// The displayed prediction; not stored in [`Selection`] but invalidated with it.
    Result,
}

/// Upstream field -> everything it invalidates when it changes.
const CASCADE: &[(Field, &[Field])] = &[
    (
        Field::League,
        &[Field::Season, Field::HomeTeam, Field::AwayTeam, Field::Result],
    ),
    (Field::Season, &[Field::Result]),
    (Field::HomeTeam, &[Field::Result]),
    (Field::AwayTeam, &[Field::Result]),
    (Field::CutoffDate, &[Field::Result]),
    (Field::HistoryMode, &[Field::Result]),
    (Field::HistoryValue, &[Field::Result]),
];

pub fn dependents(field: Field) -> &'static [Field] {
    CASCADE
        .iter()
        .find(|(upstream, _)| *upstream == field)
        .map(|(_, downstream)| *downstream)
        .unwrap_or(&[])
}

/// One user edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    League(String),
    Season(Option<String>),
    HomeTeam(String),
    AwayTeam(String),
    CutoffDate(Option<NaiveDate>),
    HistoryMode(HistoryMode),
    HistoryValue(u32),
}

impl Change {
    pub fn field(&self) -> Field {
        match self {
            Change::League(_) => Field::League,
            Change::Season(_) => Field::Season,
            Change::HomeTeam(_) => Field::HomeTeam,
            Change::AwayTeam(_) => Field::AwayTeam,
            Change::CutoffDate(_) => Field::CutoffDate,
            Change::HistoryMode(_) => Field::HistoryMode,
            Change::HistoryValue(_) => Field::HistoryValue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub league: String,
    pub season: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub cutoff_date: Option<NaiveDate>,
    pub history_mode: HistoryMode,
    pub history_value: u32,
}

impl Selection {
    pub fn new(today: NaiveDate, history_mode: HistoryMode, history_value: u32) -> Self {
        Self {
            league: String::new(),
            season: None,
            home_team: String::new(),
            away_team: String::new(),
            cutoff_date: Some(today),
            history_mode,
            history_value: history_value.max(1),
        }
    }

    /// Applies `change` and clears its dependents. Returns the cleared fields, empty when
    /// the value did not actually change.
    pub fn apply(&mut self, change: Change) -> Vec<Field> {
        let field = change.field();
        let changed = match change {
            Change::League(v) => replace(&mut self.league, v),
            Change::Season(v) => replace(&mut self.season, v.filter(|s| !s.trim().is_empty())),
            Change::HomeTeam(v) => replace(&mut self.home_team, v),
            Change::AwayTeam(v) => replace(&mut self.away_team, v),
            Change::CutoffDate(v) => replace(&mut self.cutoff_date, v),
            Change::HistoryMode(v) => replace(&mut self.history_mode, v),
            Change::HistoryValue(v) => replace(&mut self.history_value, v.max(1)),
        };
        if !changed {
            return Vec::new();
        }
        let cleared = dependents(field);
        for dependent in cleared {
            self.clear(*dependent);
        }
        cleared.to_vec()
    }

    fn clear(&mut self, field: Field) {
        match field {
            Field::League => self.league.clear(),
            Field::Season => self.season = None,
            Field::HomeTeam => self.home_team.clear(),
            Field::AwayTeam => self.away_team.clear(),
            Field::CutoffDate => self.cutoff_date = None,
            // Mode, value and result have no empty state here.
            Field::HistoryMode | Field::HistoryValue | Field::Result => {}
        }
    }

    /// Adopts the first league of `sorted` unless the user already picked one.
    pub fn offer_default_league(&mut self, sorted: &[String]) -> bool {
        if !self.league.is_empty() {
            return false;
        }
        match sorted.first() {
            Some(first) => {
                self.league = first.clone();
                true
            }
            None => false,
        }
    }

    /// Adopts the most recent (last) season of `league` unless one is already chosen or
    /// the seasons belong to a league that is no longer selected.
    pub fn offer_default_season(&mut self, league: &str, seasons: &[String]) -> bool {
        if self.league != league || self.season.is_some() {
            return false;
        }
        match seasons.last() {
            Some(last) => {
                self.season = Some(last.clone());
                true
            }
            None => false,
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
