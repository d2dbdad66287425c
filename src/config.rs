use std::env;
use std::time::Duration;

use crate::selection::HistoryMode;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HISTORY_VALUE: u32 = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_url: String,
    pub request_timeout: Duration,
    pub history_mode: HistoryMode,
    pub history_value: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            history_mode: HistoryMode::LastN,
            history_value: DEFAULT_HISTORY_VALUE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let api_url = env::var("API_URL")
            .ok()
            .map(|s| normalize_base_url(&s))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let history_mode = env::var("HISTORY_MODE")
            .ok()
            .and_then(|v| HistoryMode::parse(&v))
            .unwrap_or(HistoryMode::LastN);
        let history_value = env::var("HISTORY_VALUE")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_HISTORY_VALUE)
            .max(1);

        Self {
            api_url,
            request_timeout: request_timeout_from_env(),
            history_mode,
            history_value,
        }
    }
}

pub fn request_timeout_from_env() -> Duration {
    let secs = env::var("API_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_SECS)
        .clamp(1, 120);
    Duration::from_secs(secs)
}

pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// Loads `.env.local` then `.env`; variables already set in the process win.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}
