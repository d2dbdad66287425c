mod common;

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use matchday_predict::api::ApiError;
use matchday_predict::cancel::CancelToken;
use matchday_predict::catalog::{self, LEAGUES_PATH, SEASONS_PATH, TEAMS_PATH};
use matchday_predict::provider::run_command;
use matchday_predict::selection::{HistoryMode, Selection};
use matchday_predict::state::{AppState, Delta, ProviderCommand, apply_delta};
use serde_json::json;

use common::{Recorded, StubResponse, StubServer};

fn football(req: &Recorded) -> StubResponse {
    match req.path.as_str() {
        LEAGUES_PATH => StubResponse::json(json!({"items": ["PremierLeague", "Bundesliga"]})),
        TEAMS_PATH => match req.query_param("league").as_deref() {
            Some("PremierLeague") => StubResponse::json(json!([
                {"value": "che", "label": "Chelsea"},
                {"value": "ars", "label": "Arsenal"}
            ])),
            Some("Bundesliga") => StubResponse::json(json!({"teams": ["Bayern", "Dortmund"]})),
            _ => StubResponse::raw(404, "unknown league"),
        },
        SEASONS_PATH => StubResponse::json(json!(["2022/23", "2023/24"])),
        "/health" => StubResponse::json(json!({"status": "ok"})),
        _ => StubResponse::raw(404, "not found"),
    }
}

fn state() -> AppState {
    let today = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");
    AppState::with_selection(Selection::new(today, HistoryMode::LastN, 5))
}

/// Runs every queued command synchronously and applies what comes back.
fn pump(state: &mut AppState, api: &matchday_predict::api::ApiClient) -> usize {
    let (tx, rx) = mpsc::channel();
    let mut applied = 0;
    loop {
        let commands = state.take_commands();
        if commands.is_empty() {
            return applied;
        }
        for cmd in commands {
            run_command(api, cmd, &tx);
        }
        while let Ok(delta) = rx.try_recv() {
            apply_delta(state, delta);
            applied += 1;
        }
    }
}

#[test]
fn root_batch_loads_leagues_and_sorted_teams() {
    let server = StubServer::start(football);
    let api = server.client();

    let batch = catalog::load_root_batch(&api, &CancelToken::new(1)).expect("batch loads");
    assert_eq!(batch.leagues, vec!["PremierLeague", "Bundesliga"]);

    let premier = batch
        .teams_by_league
        .iter()
        .find(|(league, _)| league == "PremierLeague")
        .map(|(_, teams)| teams)
        .expect("premier league teams");
    let values: Vec<&str> = premier.iter().map(|t| t.value.as_str()).collect();
    assert_eq!(values, ["ars", "che"]);

    let team_requests = server.requests_to(TEAMS_PATH);
    assert_eq!(team_requests.len(), 2);
    for req in &team_requests {
        assert_eq!(req.query_param("pretty").as_deref(), Some("1"));
    }
    let mut leagues: Vec<String> = team_requests
        .iter()
        .filter_map(|r| r.query_param("league"))
        .collect();
    leagues.sort();
    assert_eq!(leagues, ["Bundesliga", "PremierLeague"]);
}

#[test]
fn full_chain_fills_state() {
    let server = StubServer::start(football);
    let api = server.client();
    let mut state = state();

    state.request_root_load();
    pump(&mut state, &api);

    assert_eq!(state.catalog.leagues(), ["Bundesliga", "PremierLeague"]);
    assert_eq!(state.selection.league, "Bundesliga");
    let labels: Vec<&str> = state
        .catalog
        .teams("Bundesliga")
        .iter()
        .map(|t| t.display_label())
        .collect();
    assert_eq!(labels, ["Bayern", "Dortmund"]);
    assert_eq!(state.catalog.seasons("Bundesliga"), ["2022/23", "2023/24"]);
    assert_eq!(state.selection.season.as_deref(), Some("2023/24"));
    assert_eq!(server.requests_to(SEASONS_PATH).len(), 1);
}

#[test]
fn one_failing_league_fails_the_whole_batch() {
    let server = StubServer::start(|req| {
        if req.path == TEAMS_PATH && req.query_param("league").as_deref() == Some("Bundesliga") {
            return StubResponse::raw(500, "boom");
        }
        football(req)
    });
    let api = server.client();

    let err = catalog::load_root_batch(&api, &CancelToken::new(1)).expect_err("batch fails");
    assert!(matches!(err, ApiError::HttpStatus { status: 500, .. }));

    let mut state = state();
    state.request_root_load();
    pump(&mut state, &api);
    assert!(state.page_error().is_some());
    assert!(state.catalog.leagues().is_empty());
    assert!(state.selection.league.is_empty());
}

#[test]
fn cancelled_root_token_makes_no_requests() {
    let server = StubServer::start(football);
    let api = server.client();
    let token = CancelToken::new(1);
    token.cancel();

    let err = catalog::load_root_batch(&api, &token).expect_err("cancelled");
    assert!(err.is_cancelled());
    assert!(server.requests().is_empty());
}

#[test]
fn malformed_league_list_is_an_empty_batch() {
    let server = StubServer::start(|req| match req.path.as_str() {
        LEAGUES_PATH => StubResponse::raw(200, "[\"PremierLeague\","),
        _ => football(req),
    });
    let api = server.client();

    let batch = catalog::load_root_batch(&api, &CancelToken::new(1)).expect("degrades to empty");
    assert!(batch.leagues.is_empty());
    assert!(batch.teams_by_league.is_empty());
    assert!(server.requests_to(TEAMS_PATH).is_empty());
}

#[test]
fn missing_seasons_are_not_a_page_error() {
    let server = StubServer::start(|req| match req.path.as_str() {
        SEASONS_PATH => StubResponse::raw(404, "no seasons"),
        _ => football(req),
    });
    let api = server.client();
    let mut state = state();

    state.request_root_load();
    pump(&mut state, &api);

    assert_eq!(state.selection.league, "Bundesliga");
    assert_eq!(state.page_error(), None);
    assert!(state.catalog.seasons("Bundesliga").is_empty());
    assert_eq!(state.selection.season, None);
}

#[test]
fn root_load_cancelled_mid_flight_reports_nothing() {
    let server = StubServer::start(|req| match req.path.as_str() {
        LEAGUES_PATH => StubResponse::json(json!(["PremierLeague"])).delayed(Duration::from_millis(300)),
        _ => football(req),
    });
    let api = server.client();
    let token = CancelToken::new(7);
    let (tx, rx) = mpsc::channel::<Delta>();

    let worker = {
        let token = token.clone();
        thread::spawn(move || run_command(&api, ProviderCommand::LoadRoot { token }, &tx))
    };
    thread::sleep(Duration::from_millis(50));
    token.cancel();
    worker.join().expect("worker thread");

    assert!(rx.try_recv().is_err());
    assert!(server.requests_to(TEAMS_PATH).is_empty());
}

#[test]
fn health_reports_ok_status() {
    let server = StubServer::start(football);
    let api = server.client();
    assert!(api.health(&CancelToken::new(0)).expect("health"));

    let down = StubServer::start(|_| StubResponse::json(json!({"status": "degraded"})));
    assert!(!down.client().health(&CancelToken::new(0)).expect("health"));

    let mut state = state();
    state.check_health();
    pump(&mut state, &api);
    assert_eq!(state.api_healthy, Some(true));
}

#[test]
fn numeric_seasons_load_as_labels() {
    let server = StubServer::start(|req| match req.path.as_str() {
        SEASONS_PATH => StubResponse::json(json!([2022, 2023])),
        _ => football(req),
    });
    let api = server.client();

    let seasons = catalog::load_seasons(&api, "Eredivisie", &CancelToken::new(1))
        .expect("seasons load");
    assert_eq!(seasons, ["2022", "2023"]);

    let mut state = state();
    state.request_root_load();
    pump(&mut state, &api);
    assert_eq!(state.catalog.seasons("Bundesliga"), ["2022", "2023"]);
    assert_eq!(state.selection.season.as_deref(), Some("2023"));
}
