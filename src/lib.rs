pub mod api;
pub mod config;
pub mod error;
pub mod net;
pub mod notice;
pub mod session;
pub mod storage;
pub mod workspace;

use crate::api::ApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::notice::Notifier;
use crate::session::SessionManager;
use crate::storage::KeyValueStore;
use crate::workspace::WorkspaceSelector;

use std::sync::Arc;
use tokio::task::JoinHandle;

/// Everything a front end needs, wired together.
///
/// The session manager and workspace selector share one store, one API client
/// and one notice stream.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn KeyValueStore>,
    pub api: Arc<ApiClient>,
    pub notifier: Notifier,
    pub session: SessionManager,
    pub workspace: WorkspaceSelector,
}

impl AppContext {
    /// Build with the storage backend selected in `config`.
    pub fn new(config: Config) -> Result<Self> {
        let store = storage::from_config(&config.storage);
        Self::with_store(config, store)
    }

    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let api = Arc::new(ApiClient::new(&config.api, store.clone())?);
        let notifier = Notifier::new();
        let session = SessionManager::new(
            api.clone(),
            store.clone(),
            notifier.clone(),
            &config.session,
        );
        let workspace = WorkspaceSelector::new(api.clone(), store.clone(), notifier.clone());
        Ok(Self {
            config: Arc::new(config),
            store,
            api,
            notifier,
            session,
            workspace,
        })
    }

    /// Restore the session, load the workspace for it, then keep both in
    /// sync in the background.
    pub async fn start(&self) -> Background {
        self.session.hydrate().await;
        self.workspace.load(self.session.user().as_ref()).await;

        Background {
            handles: vec![
                self.session
                    .listen_for_unauthorized(self.api.subscribe_unauthorized()),
                self.workspace.follow(&self.session),
            ],
        }
    }
}

/// Background tasks started by [`AppContext::start`]. Aborted on drop.
#[derive(Debug)]
pub struct Background {
    handles: Vec<JoinHandle<()>>,
}

impl Drop for Background {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
