use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::api::{ApiClient, ApiError};
use crate::cancel::CancelToken;
use crate::selection::{HistoryMode, Selection};

pub const PREDICT_PATH: &str = "/predict";

/// Local precondition failures, checked in this order before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Choose a league")]
    MissingLeague,
    #[error("Choose both teams")]
    MissingTeams,
    #[error("Teams must be different")]
    SameTeams,
    #[error("Choose a cutoff date")]
    MissingCutoffDate,
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl PredictError {
    pub fn user_message(&self) -> String {
        match self {
            PredictError::Validation(err) => err.to_string(),
            PredictError::Api(err) => err.user_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionRequest {
    pub league: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    pub home_team: String,
    pub away_team: String,
    /// `YYYY-MM-DD`
    pub match_date: String,
    pub history_mode: HistoryMode,
    pub history_value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScoreProbability {
    pub home_goals: Option<u32>,
    pub away_goals: Option<u32>,
    pub p: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HistoryEcho {
    pub mode: HistoryMode,
    pub value: u32,
}

/// Server response of `/predict`. Missing fields stay `None` and render as placeholders.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionResult {
    #[serde(default)]
    pub lambda_home: Option<f64>,
    #[serde(default)]
    pub lambda_away: Option<f64>,
    #[serde(default)]
    pub most_likely_score: Option<ScoreProbability>,
    #[serde(default)]
    pub p_home: Option<f64>,
    #[serde(default)]
    pub p_draw: Option<f64>,
    #[serde(default)]
    pub p_away: Option<f64>,
    #[serde(default)]
    pub cutoff_match_date: Option<String>,
    #[serde(default)]
    pub history: Option<HistoryEcho>,
    #[serde(default)]
    pub training_matches_used: Option<u32>,
}

pub fn validate(selection: &Selection) -> Result<(), ValidationError> {
    if selection.league.trim().is_empty() {
        return Err(ValidationError::MissingLeague);
    }
    if selection.home_team.is_empty() || selection.away_team.is_empty() {
        return Err(ValidationError::MissingTeams);
    }
    if selection.home_team == selection.away_team {
        return Err(ValidationError::SameTeams);
    }
    if selection.cutoff_date.is_none() {
        return Err(ValidationError::MissingCutoffDate);
    }
    Ok(())
}

pub fn build_request(selection: &Selection) -> Result<PredictionRequest, ValidationError> {
    validate(selection)?;
    let match_date = selection
        .cutoff_date
        .ok_or(ValidationError::MissingCutoffDate)?
        .format("%Y-%m-%d")
        .to_string();
    Ok(PredictionRequest {
        league: selection.league.clone(),
        season: selection
            .season
            .clone()
            .filter(|s| !s.trim().is_empty()),
        home_team: selection.home_team.clone(),
        away_team: selection.away_team.clone(),
        match_date,
        history_mode: selection.history_mode,
        history_value: selection.history_value.max(1),
    })
}

pub fn submit(
    api: &ApiClient,
    request: &PredictionRequest,
    token: &CancelToken,
) -> Result<PredictionResult, ApiError> {
    let result: PredictionResult = api.post_json(PREDICT_PATH, request, token)?;
    info!(
        league = %request.league,
        home = %request.home_team,
        away = %request.away_team,
        "prediction received"
    );
    Ok(result)
}

pub fn build_and_submit(
    api: &ApiClient,
    selection: &Selection,
    token: &CancelToken,
) -> Result<PredictionResult, PredictError> {
    let request = build_request(selection)?;
    Ok(submit(api, &request, token)?)
}
