use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::cancel::CancelToken;
use crate::catalog;
use crate::predict;
use crate::state::{Delta, ProviderCommand};

/// Dispatcher thread: every command runs on its own worker so a slow request never
/// holds up the ones behind it. Exits when the command channel closes.
pub fn spawn_provider(
    api: ApiClient,
    tx: Sender<Delta>,
    cmd_rx: Receiver<ProviderCommand>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            let api = api.clone();
            let tx = tx.clone();
            let spawned = thread::Builder::new()
                .name("provider-worker".to_string())
                .spawn(move || run_command(&api, cmd, &tx));
            if let Err(err) = spawned {
                warn!(error = %err, "failed to spawn provider worker");
            }
        }
        debug!("provider channel closed");
    })
}

/// Runs one command to completion and reports through `tx`. Cancelled work reports
/// nothing.
pub fn run_command(api: &ApiClient, cmd: ProviderCommand, tx: &Sender<Delta>) {
    match cmd {
        ProviderCommand::LoadRoot { token } => {
            match catalog::load_root_batch(api, &token) {
                Ok(batch) => send(tx, &token, Delta::RootLoaded {
                    token: token.id(),
                    batch,
                }),
                Err(ApiError::Cancelled) => debug!(token = token.id(), "root load cancelled"),
                Err(err) => send(tx, &token, Delta::RootFailed {
                    token: token.id(),
                    message: err.to_string(),
                }),
            }
        }
        ProviderCommand::LoadSeasons { league, token } => {
            match catalog::load_seasons(api, &league, &token) {
                Ok(seasons) => send(tx, &token, Delta::SeasonsLoaded {
                    token: token.id(),
                    league,
                    seasons,
                }),
                Err(ApiError::Cancelled) => debug!(token = token.id(), "seasons load cancelled"),
                Err(err) => send(tx, &token, Delta::SeasonsFailed {
                    token: token.id(),
                    league,
                    message: err.to_string(),
                }),
            }
        }
        ProviderCommand::Predict { request, token } => {
            match predict::submit(api, &request, &token) {
                Ok(result) => send(tx, &token, Delta::PredictionFinished {
                    token: token.id(),
                    result: Ok(result),
                }),
                Err(ApiError::Cancelled) => debug!(token = token.id(), "prediction cancelled"),
                Err(err) => send(tx, &token, Delta::PredictionFinished {
                    token: token.id(),
                    result: Err(err.user_message()),
                }),
            }
        }
        ProviderCommand::CheckHealth { token } => {
            let result = match api.health(&token) {
                Ok(healthy) => Ok(healthy),
                Err(ApiError::Cancelled) => {
                    debug!(token = token.id(), "health check cancelled");
                    return;
                }
                Err(err) => Err(err.to_string()),
            };
            send(tx, &token, Delta::Health {
                token: token.id(),
                result,
            });
        }
    }
}

/// Last check before handing a result to the UI thread; `apply_delta` checks again.
fn send(tx: &Sender<Delta>, token: &CancelToken, delta: Delta) {
    if token.is_cancelled() {
        debug!(token = token.id(), "dropping result of cancelled request");
        return;
    }
    let _ = tx.send(delta);
}
