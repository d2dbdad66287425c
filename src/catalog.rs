//! League -> teams/seasons dependency chain.
//!
//! The fetch half (`load_root_batch`, `load_seasons`) runs on worker threads and only
//! returns values. The store half ([`Catalog`]) is owned by `AppState` and is written
//! exclusively through its `begin_*`/`apply_*`/`fail_*` methods.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::env;

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::cancel::CancelToken;

pub const LEAGUES_PATH: &str = "/leagues";
pub const TEAMS_PATH: &str = "/teams";
pub const SEASONS_PATH: &str = "/seasons";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TeamRepr")]
pub struct Team {
    pub value: String,
    pub label: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TeamRepr {
    Name(String),
    Record {
        value: String,
        #[serde(default)]
        label: Option<String>,
    },
}

impl From<TeamRepr> for Team {
    fn from(repr: TeamRepr) -> Self {
        match repr {
            TeamRepr::Name(name) => Team {
                value: name.clone(),
                label: Some(name),
            },
            TeamRepr::Record { value, label } => Team { value, label },
        }
    }
}

impl Team {
    pub fn display_label(&self) -> &str {
        match self.label.as_deref() {
            Some(label) if !label.trim().is_empty() => label,
            _ => &self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

impl LoadStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadStatus::Loading)
    }
}

/// Leagues plus every league's teams, produced by one root load.
#[derive(Debug, Clone, Default)]
pub struct RootBatch {
    pub leagues: Vec<String>,
    pub teams_by_league: Vec<(String, Vec<Team>)>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    leagues: Vec<String>,
    teams_by_league: HashMap<String, Vec<Team>>,
    seasons_by_league: HashMap<String, Vec<String>>,
    pub root_status: LoadStatus,
    pub seasons_status: LoadStatus,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leagues in display order.
    pub fn leagues(&self) -> &[String] {
        &self.leagues
    }

    /// Teams of `league` in display order.
    pub fn teams(&self, league: &str) -> &[Team] {
        self.teams_by_league
            .get(league)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn seasons(&self, league: &str) -> &[String] {
        self.seasons_by_league
            .get(league)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn begin_root(&mut self) {
        self.root_status = LoadStatus::Loading;
    }

    /// Replaces leagues and teams in one step.
    pub fn apply_root(&mut self, batch: RootBatch) {
        self.leagues = sort_leagues(batch.leagues);
        self.teams_by_league = batch
            .teams_by_league
            .into_iter()
            .map(|(league, mut teams)| {
                sort_teams(&mut teams);
                (league, teams)
            })
            .collect();
        self.root_status = LoadStatus::Ready;
    }

    pub fn fail_root(&mut self, message: String) {
        self.root_status = LoadStatus::Failed(message);
    }

    pub fn begin_seasons(&mut self) {
        self.seasons_status = LoadStatus::Loading;
    }

    pub fn apply_seasons(&mut self, league: String, seasons: Vec<String>) {
        self.seasons_by_league.insert(league, seasons);
        self.seasons_status = LoadStatus::Ready;
    }

    pub fn fail_seasons(&mut self, league: &str, message: String) {
        self.seasons_by_league.remove(league);
        self.seasons_status = LoadStatus::Failed(message);
    }

    /// Scopes that were loading fall back to idle after their requests were cancelled.
    pub fn settle_cancelled(&mut self) {
        if self.root_status.is_loading() {
            self.root_status = LoadStatus::Idle;
        }
        if self.seasons_status.is_loading() {
            self.seasons_status = LoadStatus::Idle;
        }
    }
}

fn collation_key(s: &str) -> String {
    s.trim().to_lowercase()
}

pub fn compare_labels(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

pub fn sort_leagues(mut leagues: Vec<String>) -> Vec<String> {
    leagues.retain(|l| !l.trim().is_empty());
    leagues.sort_by(|a, b| compare_labels(a, b));
    leagues.dedup();
    leagues
}

pub fn sort_teams(teams: &mut [Team]) {
    teams.sort_by(|a, b| {
        compare_labels(a.display_label(), b.display_label()).then_with(|| a.value.cmp(&b.value))
    });
}

/// Fetches the league list, then every league's teams concurrently.
///
/// Children run under a batch token derived from `token`: the first failing child
/// cancels its siblings, and cancelling `token` cancels all of them.
pub fn load_root_batch(api: &ApiClient, token: &CancelToken) -> Result<RootBatch, ApiError> {
    let leagues: Vec<String> = read_collection(api, LEAGUES_PATH, &[], token)?;
    let batch = token.child();

    let results: Vec<Result<(String, Vec<Team>), ApiError>> = with_fetch_pool(|| {
        leagues
            .par_iter()
            .map(|league| {
                let fetched = fetch_teams(api, league, &batch);
                if let Err(err) = &fetched
                    && !err.is_cancelled()
                {
                    batch.cancel();
                }
                fetched.map(|teams| (league.clone(), teams))
            })
            .collect()
    });

    if token.is_cancelled() {
        return Err(ApiError::Cancelled);
    }

    let mut teams_by_league = Vec::with_capacity(results.len());
    let mut sibling_cancelled = false;
    for result in results {
        match result {
            Ok(pair) => teams_by_league.push(pair),
            Err(ApiError::Cancelled) => sibling_cancelled = true,
            Err(err) => {
                warn!(error = %err, "team batch failed");
                return Err(err);
            }
        }
    }
    if sibling_cancelled {
        return Err(ApiError::Cancelled);
    }

    info!(leagues = leagues.len(), "root batch loaded");
    Ok(RootBatch {
        leagues,
        teams_by_league,
    })
}

pub fn fetch_teams(
    api: &ApiClient,
    league: &str,
    token: &CancelToken,
) -> Result<Vec<Team>, ApiError> {
    let mut teams: Vec<Team> =
        read_collection(api, TEAMS_PATH, &[("league", league), ("pretty", "1")], token)?;
    sort_teams(&mut teams);
    Ok(teams)
}

/// Seasons in server order; the caller treats every non-cancel error as "no seasons".
/// Numeric entries (`2023`) are kept in their string form.
pub fn load_seasons(
    api: &ApiClient,
    league: &str,
    token: &CancelToken,
) -> Result<Vec<String>, ApiError> {
    let items = api.fetch_collection(SEASONS_PATH, &[("league", league)], token)?;
    Ok(items.iter().filter_map(season_label).collect())
}

/// Strings and numbers become labels; null, booleans and nested values are skipped.
pub fn season_label(item: &Value) -> Option<String> {
    let label = match item {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!label.is_empty()).then_some(label)
}

/// Malformed JSON on a read endpoint degrades to an empty collection.
fn read_collection<T: DeserializeOwned>(
    api: &ApiClient,
    path: &str,
    query: &[(&str, &str)],
    token: &CancelToken,
) -> Result<Vec<T>, ApiError> {
    match api.fetch_records(path, query, token) {
        Err(ApiError::Parse { path, source }) => {
            warn!(path = %path, error = %source, "malformed collection, using empty");
            Ok(Vec::new())
        }
        other => other,
    }
}

fn fetch_pool() -> Option<&'static rayon::ThreadPool> {
    static POOL: OnceCell<Option<rayon::ThreadPool>> = OnceCell::new();
    POOL.get_or_init(|| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(fetch_parallelism())
            .thread_name(|i| format!("fetch-{i}"))
            .build()
            .ok()
    })
    .as_ref()
}

fn with_fetch_pool<T>(action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match fetch_pool() {
        Some(pool) => pool.install(action),
        None => action(),
    }
}

fn fetch_parallelism() -> usize {
    env::var("FETCH_PARALLELISM")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(6)
        .clamp(2, 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn team(value: &str, label: &str) -> Team {
        Team {
            value: value.to_string(),
            label: Some(label.to_string()),
        }
    }

    #[test]
    fn season_labels_accept_numbers_and_strings() {
        let items = [
            json!(2022),
            json!("2023/24"),
            json!(" "),
            json!(null),
            json!(true),
            json!({"season": 2021}),
            json!([2020]),
        ];
        let labels: Vec<String> = items.iter().filter_map(season_label).collect();
        assert_eq!(labels, ["2022", "2023/24"]);
    }

    #[test]
    fn team_accepts_record_or_bare_string() {
        let teams: Vec<Team> = serde_json::from_value(json!([
            {"value": "ars", "label": "Arsenal"},
            {"value": "che"},
            "Everton"
        ]))
        .unwrap();
        assert_eq!(teams[0], team("ars", "Arsenal"));
        assert_eq!(teams[1].display_label(), "che");
        assert_eq!(teams[2], team("Everton", "Everton"));
    }

    #[test]
    fn teams_sort_by_label_case_insensitively() {
        let mut teams = vec![
            team("whu", "west ham"),
            team("ars", "Arsenal"),
            team("bri", "Brighton"),
        ];
        sort_teams(&mut teams);
        let labels: Vec<&str> = teams.iter().map(Team::display_label).collect();
        assert_eq!(labels, vec!["Arsenal", "Brighton", "west ham"]);
    }

    #[test]
    fn leagues_sort_and_dedup() {
        let sorted = sort_leagues(vec![
            "serie A".to_string(),
            "Bundesliga".to_string(),
            "".to_string(),
            "Bundesliga".to_string(),
        ]);
        assert_eq!(sorted, vec!["Bundesliga".to_string(), "serie A".to_string()]);
    }

    #[test]
    fn apply_root_replaces_store_wholesale() {
        let mut catalog = Catalog::new();
        catalog.begin_root();
        catalog.apply_root(RootBatch {
            leagues: vec!["PremierLeague".to_string(), "Bundesliga".to_string()],
            teams_by_league: vec![(
                "PremierLeague".to_string(),
                vec![team("che", "Chelsea"), team("ars", "Arsenal")],
            )],
        });
        assert_eq!(catalog.root_status, LoadStatus::Ready);
        assert_eq!(catalog.leagues()[0], "Bundesliga");
        assert_eq!(catalog.teams("PremierLeague")[0].value, "ars");
        assert!(catalog.teams("Bundesliga").is_empty());

        catalog.apply_root(RootBatch::default());
        assert!(catalog.leagues().is_empty());
        assert!(catalog.teams("PremierLeague").is_empty());
    }

    #[test]
    fn cancelled_loads_settle_to_idle() {
        let mut catalog = Catalog::new();
        catalog.begin_root();
        catalog.apply_seasons("PremierLeague".to_string(), vec!["2024".to_string()]);
        catalog.begin_seasons();
        catalog.settle_cancelled();
        assert_eq!(catalog.root_status, LoadStatus::Idle);
        assert_eq!(catalog.seasons_status, LoadStatus::Idle);
        assert_eq!(catalog.seasons("PremierLeague"), ["2024".to_string()]);
    }
}
