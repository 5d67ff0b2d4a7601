//! Workspace selector.
//!
//! Tracks which space (personal, company, organization) the signed-in user is
//! acting in, what they have access to, and the scope that resource calls
//! should carry. The choice is remembered across restarts and re-checked
//! against fresh access data on every load.

mod types;

pub use types::{Organization, Scope, Space};

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::WorkspaceBackend;
use crate::error::{Result, SwitchRejection};
use crate::notice::{Notice, Notifier};
use crate::session::{SessionManager, User};
use crate::storage::{KeyValueStore, keys};

const LOAD_FAILED: &str = "Failed to load workspace data";

/// Observable workspace state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceState {
    pub current_space: Space,
    /// Set only while `current_space` is [`Space::Organization`].
    pub current_organization: Option<Organization>,
    pub available_organizations: Vec<Organization>,
    pub company_id: Option<String>,
    pub user_id: Option<String>,
    pub is_loading: bool,
}

impl WorkspaceState {
    pub fn has_company_access(&self) -> bool {
        self.company_id.is_some()
    }

    pub fn has_organization_access(&self) -> bool {
        !self.available_organizations.is_empty()
    }

    /// Check a switch against current access. On success returns the
    /// organization to select (always `None` outside the organization space).
    ///
    /// Without an explicit id the first available organization is chosen.
    pub fn resolve(
        &self,
        space: Space,
        organization_id: Option<&str>,
    ) -> std::result::Result<Option<Organization>, SwitchRejection> {
        match space {
            Space::Personal => Ok(None),
            Space::Company if self.has_company_access() => Ok(None),
            Space::Company => Err(SwitchRejection::NoCompanyAccess),
            Space::Organization => {
                let first = self
                    .available_organizations
                    .first()
                    .ok_or(SwitchRejection::NoOrganizations)?;
                match organization_id {
                    None => Ok(Some(first.clone())),
                    Some(id) => self
                        .available_organizations
                        .iter()
                        .find(|org| org.id == id)
                        .cloned()
                        .map(Some)
                        .ok_or_else(|| SwitchRejection::UnknownOrganization(id.to_string())),
                }
            }
        }
    }

    /// Owner filter for resource calls. `None` until the user is known.
    pub fn scope(&self) -> Option<Scope> {
        match self.current_space {
            Space::Personal => self.user_id.clone().map(Scope::User),
            Space::Company => self.company_id.clone().map(Scope::Company),
            Space::Organization => self
                .current_organization
                .as_ref()
                .map(|org| Scope::Organization(org.id.clone())),
        }
    }

    /// Short name of the current space.
    pub fn space_label(&self) -> &str {
        match (self.current_space, &self.current_organization) {
            (Space::Personal, _) => "Personal",
            (Space::Company, _) => "Company",
            (Space::Organization, Some(org)) => &org.name,
            (Space::Organization, None) => "Organization",
        }
    }

    pub fn welcome_message(&self) -> String {
        match (self.current_space, &self.current_organization) {
            (Space::Personal, _) => "Welcome to your personal workspace".to_string(),
            (Space::Company, _) => "Welcome to your company workspace".to_string(),
            (Space::Organization, Some(org)) => format!("Welcome to {}", org.name),
            (Space::Organization, None) => "Welcome to your organization workspace".to_string(),
        }
    }
}

struct Inner {
    backend: Arc<dyn WorkspaceBackend>,
    store: Arc<dyn KeyValueStore>,
    notifier: Notifier,
    state: Mutex<WorkspaceState>,
    generation: AtomicU64,
    tx: watch::Sender<WorkspaceState>,
}

/// Shared handle to the workspace selection.
#[derive(Clone)]
pub struct WorkspaceSelector {
    inner: Arc<Inner>,
}

impl WorkspaceSelector {
    pub fn new(backend: Arc<dyn WorkspaceBackend>, store: Arc<dyn KeyValueStore>, notifier: Notifier) -> Self {
        let (tx, _) = watch::channel(WorkspaceState::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                notifier,
                state: Mutex::new(WorkspaceState::default()),
                generation: AtomicU64::new(0),
                tx,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkspaceState> {
        self.inner.tx.subscribe()
    }

    pub fn state(&self) -> WorkspaceState {
        self.inner.tx.borrow().clone()
    }

    pub fn scope(&self) -> Option<Scope> {
        self.inner.tx.borrow().scope()
    }

    pub fn welcome_message(&self) -> String {
        self.inner.tx.borrow().welcome_message()
    }

    /// Fetch access data for `user` and restore the saved preference.
    ///
    /// Without a user the state resets to personal with no access. If either
    /// fetch fails the user gets personal-only access and a warning.
    pub async fn load(&self, user: Option<&User>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(user) = user else {
            let mut state = self.inner.state.lock().await;
            *state = WorkspaceState::default();
            self.publish(&state);
            debug!("Workspace reset");
            return;
        };

        {
            let mut state = self.inner.state.lock().await;
            if state.user_id.as_deref() != Some(user.id.as_str()) {
                // Another user's access must not leak into this one.
                *state = WorkspaceState {
                    user_id: Some(user.id.clone()),
                    ..WorkspaceState::default()
                };
            }
            state.is_loading = true;
            self.publish(&state);
        }

        let (company, organizations) = futures::join!(
            self.inner.backend.company_id(),
            self.inner.backend.organizations()
        );

        let mut state = self.inner.state.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!(user_id = %user.id, "Discarding workspace load for previous user");
            return;
        }

        let mut next = WorkspaceState {
            user_id: Some(user.id.clone()),
            ..WorkspaceState::default()
        };
        match (company, organizations) {
            (Ok(company_id), Ok(organizations)) => {
                next.company_id = company_id;
                next.available_organizations = organizations;
                self.restore_preference(&mut next);
            }
            (company, organizations) => {
                if let Err(e) = company {
                    warn!(error = %e, "Failed to load user metadata");
                }
                if let Err(e) = organizations {
                    warn!(error = %e, "Failed to load organizations");
                }
                self.inner.notifier.publish(Notice::warning(LOAD_FAILED));
            }
        }

        *state = next;
        self.publish(&state);
        info!(
            user_id = %user.id,
            space = %state.current_space,
            organizations = state.available_organizations.len(),
            company = state.has_company_access(),
            "Workspace loaded"
        );
    }

    /// Change the active space. A refused switch leaves state untouched.
    pub async fn switch_space(&self, space: Space, organization_id: Option<&str>) -> Result<WorkspaceState> {
        let mut state = self.inner.state.lock().await;
        let organization = match state.resolve(space, organization_id) {
            Ok(organization) => organization,
            Err(rejection) => {
                drop(state);
                warn!(%space, reason = %rejection, "Workspace switch refused");
                self.inner.notifier.publish(Notice::error(rejection.to_string()));
                return Err(rejection.into());
            }
        };

        state.current_space = space;
        state.current_organization = organization;
        self.persist_preference(&state);
        self.publish(&state);
        let snapshot = state.clone();
        drop(state);

        info!(%space, organization = ?snapshot.current_organization.as_ref().map(|o| &o.id), "Switched workspace");
        self.inner.notifier.publish(Notice::success(format!(
            "Switched to {} space",
            snapshot.space_label()
        )));
        Ok(snapshot)
    }

    /// Resolve once the state belongs to `user_id` and no load is running.
    pub async fn wait_for_user(&self, user_id: Option<&str>) -> WorkspaceState {
        let mut rx = self.inner.tx.subscribe();
        match rx
            .wait_for(|state| !state.is_loading && state.user_id.as_deref() == user_id)
            .await
        {
            Ok(state) => state.clone(),
            // The sender lives in `inner`, which `self` keeps alive.
            Err(_) => self.state(),
        }
    }

    /// Reload whenever the signed-in user changes.
    pub fn follow(&self, session: &SessionManager) -> JoinHandle<()> {
        let mut snapshots = session.subscribe();
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let snapshot = snapshots.borrow_and_update().clone();
                if !snapshot.is_loading {
                    let Some(inner) = weak.upgrade() else { break };
                    let selector = WorkspaceSelector { inner };
                    let authenticated = snapshot.is_authenticated;
                    let user = snapshot.user.filter(|_| authenticated);
                    let known = selector.state().user_id;
                    if user.as_ref().map(|u| &u.id) != known.as_ref() {
                        selector.load(user.as_ref()).await;
                    }
                }
                if snapshots.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    fn publish(&self, state: &WorkspaceState) {
        self.inner.tx.send_replace(state.clone());
    }

    fn read_preference(&self, key: &str) -> Option<String> {
        match self.inner.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read workspace preference");
                None
            }
        }
    }

    fn restore_preference(&self, state: &mut WorkspaceState) {
        let space = self
            .read_preference(keys::PREFERRED_SPACE)
            .and_then(|raw| raw.parse::<Space>().ok())
            .unwrap_or_default();
        let organization_id = self.read_preference(keys::PREFERRED_ORGANIZATION_ID);

        match state.resolve(space, organization_id.as_deref()) {
            Ok(organization) => {
                state.current_space = space;
                state.current_organization = organization;
            }
            Err(reason) => {
                debug!(%space, %reason, "Saved workspace no longer available");
                state.current_space = Space::Personal;
                state.current_organization = None;
            }
        }
    }

    fn persist_preference(&self, state: &WorkspaceState) {
        if let Err(e) = self
            .inner
            .store
            .set(keys::PREFERRED_SPACE, state.current_space.as_str())
        {
            warn!(error = %e, "Failed to save preferred space");
        }
        if let Some(org) = &state.current_organization {
            if let Err(e) = self.inner.store.set(keys::PREFERRED_ORGANIZATION_ID, &org.id) {
                warn!(error = %e, "Failed to save preferred organization");
            }
        }
    }
}
