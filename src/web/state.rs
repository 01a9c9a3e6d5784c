//! Application state shared across handlers

use crate::config::Settings;
use crate::network::HttpClient;
use crate::search::Search;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Search executor
    pub search: Arc<Search>,
}

impl AppState {
    /// Create new application state
    pub fn new(settings: Settings, client: HttpClient) -> anyhow::Result<Self> {
        let max_timeout = Duration::try_from_secs_f64(settings.outgoing.max_request_timeout)?;
        let search = Search::new(client, settings.providers.clone()).with_max_timeout(max_timeout);

        Ok(Self {
            settings: Arc::new(settings),
            search: Arc::new(search),
        })
    }

    /// Get instance name
    pub fn instance_name(&self) -> &str {
        &self.settings.general.instance_name
    }
}
