//! Wiring of the shared components for one process.

use std::sync::Arc;

use pomgmt_core::query::QueryParameters;
use pomgmt_core::error::CoreError;

use crate::auth::SessionController;
use crate::config::ClientConfig;
use crate::data_view::DataView;
use crate::events::SessionEvents;
use crate::http::ApiClient;
use crate::session_store::SessionStore;
use crate::storage::FileStorage;
use crate::upload::UploadCoordinator;

/// Every component shares the same session, event bus and HTTP adapter.
#[derive(Clone)]
pub struct Client {
    pub config: ClientConfig,
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionStore>,
    pub events: Arc<SessionEvents>,
    pub auth: Arc<SessionController>,
}

impl Client {
    /// Build a client whose session is persisted at `config.session_file`.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let session = Arc::new(SessionStore::new(FileStorage::new(&config.session_file)));
        let events = Arc::new(SessionEvents::default());
        let api = Arc::new(ApiClient::new(&config, session.clone(), events.clone())?);
        let auth = Arc::new(SessionController::new(
            api.clone(),
            session.clone(),
            events.clone(),
        ));

        tracing::debug!(base_url = %api.base_url(), session_file = %config.session_file.display(), "Client configured");

        Ok(Self {
            config,
            api,
            session,
            events,
            auth,
        })
    }

    /// Fresh query parameters; `page_size` falls back to the configured one.
    pub fn query_parameters(&self, page_size: Option<u32>) -> Result<QueryParameters, CoreError> {
        QueryParameters::new(page_size.unwrap_or(self.config.page_size))
    }

    pub fn data_view(&self, params: QueryParameters) -> DataView {
        DataView::new(self.api.clone(), params)
    }

    pub fn uploads(&self) -> UploadCoordinator {
        UploadCoordinator::new(self.api.clone())
    }
}
