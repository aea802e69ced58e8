pub mod ai;
pub mod api;
pub mod config;
pub mod db;
pub mod permissions;
pub mod presence;
pub mod scheduling;

pub use db::DbPool;

use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::ai::TextGenerator;
use crate::permissions::PermissionRegistry;
use crate::presence::PresenceRegistry;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub permissions: PermissionRegistry,
    pub presence: Arc<PresenceRegistry>,
    pub text_generator: Option<Arc<dyn TextGenerator>>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        permissions: PermissionRegistry,
        presence: Arc<PresenceRegistry>,
    ) -> Self {
        Self {
            config,
            db,
            permissions,
            presence,
            text_generator: None,
            metrics_handle: None,
        }
    }

    /// Set the text-generation backend for the AI helpers
    pub fn with_text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.text_generator = Some(generator);
        self
    }

    /// Set the Prometheus metrics handle
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
