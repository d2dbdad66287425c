use crate::predict::PredictionResult;

pub const PLACEHOLDER: &str = "n/a";

/// Probability in 0..=1 as a one-decimal percentage.
pub fn pct(p: Option<f64>) -> String {
    match p {
        Some(p) if p.is_finite() => format!("{:.1}%", p * 100.0),
        _ => PLACEHOLDER.to_string(),
    }
}

/// Poisson rate with two decimals.
pub fn rate(lambda: Option<f64>) -> String {
    match lambda {
        Some(l) if l.is_finite() => format!("{l:.2}"),
        _ => PLACEHOLDER.to_string(),
    }
}

fn count<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub lambda_home: String,
    pub lambda_away: String,
    pub most_likely: String,
    pub home: String,
    pub draw: String,
    pub away: String,
    pub cutoff_match_date: String,
    pub history: String,
    pub training_matches: String,
}

impl From<&PredictionResult> for ResultView {
    fn from(result: &PredictionResult) -> Self {
        let most_likely = match result.most_likely_score {
            Some(score) => format!(
                "{}:{} ({})",
                count(score.home_goals),
                count(score.away_goals),
                pct(score.p)
            ),
            None => PLACEHOLDER.to_string(),
        };
        let history = match result.history {
            Some(echo) => format!("{} {}", echo.mode.as_str(), echo.value),
            None => PLACEHOLDER.to_string(),
        };
        Self {
            lambda_home: rate(result.lambda_home),
            lambda_away: rate(result.lambda_away),
            most_likely,
            home: pct(result.p_home),
            draw: pct(result.p_draw),
            away: pct(result.p_away),
            cutoff_match_date: result
                .cutoff_match_date
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            history,
            training_matches: count(result.training_matches_used),
        }
    }
}

impl ResultView {
    /// Label/value pairs in display order.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("λ Home", self.lambda_home.as_str()),
            ("λ Away", self.lambda_away.as_str()),
            ("Most likely", self.most_likely.as_str()),
            ("1", self.home.as_str()),
            ("X", self.draw.as_str()),
            ("2", self.away.as_str()),
            ("Cutoff match", self.cutoff_match_date.as_str()),
            ("History", self.history.as_str()),
            ("Training matches", self.training_matches.as_str()),
        ]
    }
}
