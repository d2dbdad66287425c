pub mod api;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod http_client;
pub mod logging;
pub mod predict;
pub mod present;
pub mod provider;
pub mod selection;
pub mod state;
