use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

use crate::config;

const USER_AGENT: &str = concat!("matchday_predict/", env!("CARGO_PKG_VERSION"));

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Process-wide client; the timeout comes from `API_TIMEOUT_SECS` on first use.
pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| build_http_client(config::request_timeout_from_env()))
}

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build http client")
}
