//! Session manager.
//!
//! Owns the authenticated session for the whole client: restores it from
//! storage on startup, exchanges credentials for it, refreshes it ahead of
//! expiry, and clears it on sign-out or when the backend stops accepting it.
//!
//! # State
//!
//! All mutable state sits behind one async mutex that is never held across a
//! network call. Every change to the session bumps an epoch counter; a
//! refresh or user lookup that started under an older epoch drops its result
//! instead of overwriting a newer session (or resurrecting a cleared one).
//!
//! Observers read [`SessionSnapshot`]s from a `watch` channel and
//! user-facing messages from the shared [`Notifier`].

mod timer;
mod types;
mod validate;

pub use types::{Session, User, UserMetadata};
pub use validate::{MIN_PASSWORD_LEN, SignUpForm, validate_sign_up};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use self::timer::RefreshTimer;
use crate::api::{GoogleCredential, IdentityBackend, UnauthorizedEvent, credential_error};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::notice::{Notice, Notifier};
use crate::storage::{KeyValueStore, keys};

const SIGNED_IN: &str = "Successfully signed in!";
const SIGNED_OUT: &str = "Successfully signed out";
const GOOGLE_ACCOUNT_CREATED: &str = "Welcome to promptdesk! Your account has been created.";
const ACCOUNT_CREATED: &str = "Account created successfully!";
const VERIFY_EMAIL: &str = "Account created! Please check your email to verify.";
const SIGN_IN_FAILED: &str = "Failed to sign in";
const GOOGLE_SIGN_IN_FAILED: &str = "Failed to sign in with Google";
const SIGN_UP_FAILED: &str = "Failed to create account";

/// Where the UI should send the user next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    SignIn,
}

/// Observable view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

impl SessionSnapshot {
    /// `None` while loading.
    pub fn route(&self) -> Option<Route> {
        if self.is_loading {
            None
        } else if self.is_authenticated {
            Some(Route::Home)
        } else {
            Some(Route::SignIn)
        }
    }
}

/// Result of a sign-up that the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// Session issued immediately.
    Authenticated(User),
    /// Account created, email verification pending; no session.
    VerificationPending { message: String },
}

impl SignUpOutcome {
    pub fn route(&self) -> Route {
        match self {
            Self::Authenticated(_) => Route::Home,
            Self::VerificationPending { .. } => Route::SignIn,
        }
    }
}

/// Result of a Google sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleSignIn {
    pub user: User,
    pub is_new_user: bool,
}

/// What a refresh attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New session adopted.
    Refreshed,
    /// Session changed while the request was in flight; result dropped.
    Stale,
    /// Refresh failed and the session was cleared.
    SignedOut,
}

#[derive(Debug)]
struct State {
    session: Option<Session>,
    user: Option<User>,
    loading: bool,
    epoch: u64,
    timer: RefreshTimer,
}

impl State {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user.clone(),
            is_authenticated: self.session.is_some() && self.user.is_some(),
            is_loading: self.loading,
        }
    }
}

struct Inner {
    backend: Arc<dyn IdentityBackend>,
    store: Arc<dyn KeyValueStore>,
    notifier: Notifier,
    refresh_lead: Duration,
    state: Mutex<State>,
    snapshot: watch::Sender<SessionSnapshot>,
}

/// Shared handle to the session. Cloning is cheap; all clones see one state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn IdentityBackend>,
        store: Arc<dyn KeyValueStore>,
        notifier: Notifier,
        config: &SessionConfig,
    ) -> Self {
        let state = State {
            session: None,
            user: None,
            loading: true,
            epoch: 0,
            timer: RefreshTimer::default(),
        };
        let (snapshot, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                notifier,
                refresh_lead: config.refresh_lead(),
                state: Mutex::new(state),
                snapshot,
            }),
        }
    }

    // ── Observation ──────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.snapshot.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.snapshot.borrow().is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.inner.snapshot.borrow().is_loading
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner.state.lock().await.session.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .await
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// True while a proactive refresh is scheduled.
    pub async fn has_pending_refresh(&self) -> bool {
        self.inner.state.lock().await.timer.is_armed()
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Restore the persisted session, if any.
    ///
    /// A live session is adopted and its user fetched; an expired one is
    /// refreshed first. A session that cannot be validated is cleared.
    pub async fn hydrate(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.loading = true;
            self.publish(&state);
        }

        if let Some(stored) = self.read_stored_session() {
            if stored.is_expired() {
                info!("Stored session expired, refreshing");
                let _ = self.refresh().await;
            } else {
                let mut state = self.inner.state.lock().await;
                self.adopt_locked(&mut state, stored, None, false);
                self.publish(&state);
            }
            self.load_user().await;
        } else {
            debug!("No stored session");
        }

        let mut state = self.inner.state.lock().await;
        state.loading = false;
        self.publish(&state);
        info!(authenticated = state.snapshot().is_authenticated, "Session hydrated");
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        let payload = match self.inner.backend.sign_in(email, password).await {
            Ok(payload) => payload,
            Err(e) => return Err(self.report(credential_error(e, SIGN_IN_FAILED))),
        };
        let user = self.establish(payload.session, payload.user).await?;
        info!(user_id = %user.id, "Signed in");
        self.inner.notifier.publish(Notice::success(SIGNED_IN));
        Ok(user)
    }

    pub async fn sign_in_with_google(&self, credential: &GoogleCredential) -> Result<GoogleSignIn> {
        let payload = match self.inner.backend.sign_in_with_google(credential).await {
            Ok(payload) => payload,
            Err(e) => return Err(self.report(credential_error(e, GOOGLE_SIGN_IN_FAILED))),
        };
        let user = self.establish(payload.session, payload.user).await?;
        info!(user_id = %user.id, new_user = payload.is_new_user, "Signed in with Google");
        let message = if payload.is_new_user {
            GOOGLE_ACCOUNT_CREATED
        } else {
            SIGNED_IN
        };
        self.inner.notifier.publish(Notice::success(message));
        Ok(GoogleSignIn {
            user,
            is_new_user: payload.is_new_user,
        })
    }

    /// Create an account. Inputs are validated before any request is made.
    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<SignUpOutcome> {
        if let Err(e) = validate_sign_up(email, password, name) {
            return Err(self.report(e.into()));
        }
        self.sign_up_validated(email, password, name).await
    }

    /// Validate a full form (including the confirmation field), then sign up.
    pub async fn submit_sign_up(&self, form: &SignUpForm) -> Result<SignUpOutcome> {
        if let Err(e) = form.validate() {
            return Err(self.report(e.into()));
        }
        self.sign_up_validated(&form.email, &form.password, &form.name)
            .await
    }

    async fn sign_up_validated(&self, email: &str, password: &str, name: &str) -> Result<SignUpOutcome> {
        let payload = match self.inner.backend.sign_up(email, password, name).await {
            Ok(payload) => payload,
            Err(e) => return Err(self.report(credential_error(e, SIGN_UP_FAILED))),
        };

        match (payload.session, payload.user) {
            (Some(session), Some(user)) => {
                let user = self.establish(session, user).await?;
                info!(user_id = %user.id, "Account created and signed in");
                self.inner.notifier.publish(Notice::success(ACCOUNT_CREATED));
                Ok(SignUpOutcome::Authenticated(user))
            }
            _ => {
                let message = payload
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| VERIFY_EMAIL.to_string());
                info!("Account created, awaiting email verification");
                self.inner.notifier.publish(Notice::success(message.clone()));
                Ok(SignUpOutcome::VerificationPending { message })
            }
        }
    }

    /// Clear the session everywhere. Safe to call when already signed out.
    pub async fn sign_out(&self) {
        let mut state = self.inner.state.lock().await;
        let had_session = self.clear_locked(&mut state);
        state.loading = false;
        self.publish(&state);
        drop(state);

        if had_session {
            info!("Signed out");
            self.inner.notifier.publish(Notice::success(SIGNED_OUT));
        }
    }

    /// Exchange the stored refresh token for a new session.
    ///
    /// Any failure signs out. A result that arrives after the session was
    /// replaced or cleared is dropped.
    pub async fn refresh(&self) -> RefreshOutcome {
        let epoch = self.inner.state.lock().await.epoch;

        let Some(stored) = self.read_stored_session() else {
            warn!("No stored session to refresh");
            self.force_sign_out(Some(epoch), "no stored session").await;
            return RefreshOutcome::SignedOut;
        };

        match self.inner.backend.refresh_token(&stored.refresh_token).await {
            Ok(session) => {
                let mut state = self.inner.state.lock().await;
                if state.epoch != epoch {
                    debug!("Session changed during refresh, discarding result");
                    return RefreshOutcome::Stale;
                }
                self.adopt_locked(&mut state, session, None, true);
                self.publish(&state);
                info!("Session refreshed");
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                if self.force_sign_out(Some(epoch), "refresh failed").await {
                    RefreshOutcome::SignedOut
                } else {
                    RefreshOutcome::Stale
                }
            }
        }
    }

    /// React to the backend rejecting the bearer token.
    pub async fn handle_unauthorized(&self) {
        let _ = self.force_sign_out(None, "unauthorized").await;
    }

    /// Clear the session whenever the API client reports a 401.
    pub fn listen_for_unauthorized(
        &self,
        mut events: broadcast::Receiver<UnauthorizedEvent>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        debug!(path = %event.path, "Unauthorized response");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Unauthorized events lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
                let Some(inner) = weak.upgrade() else { break };
                SessionManager { inner }.handle_unauthorized().await;
            }
        })
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn publish(&self, state: &State) {
        self.inner.snapshot.send_replace(state.snapshot());
    }

    fn report(&self, err: Error) -> Error {
        self.inner.notifier.publish(Notice::error(err.to_string()));
        err
    }

    async fn establish(&self, session: Session, user: User) -> Result<User> {
        if session.is_expired() {
            return Err(self.report(Error::UnexpectedResponse(
                "backend issued an already expired session".to_string(),
            )));
        }
        let mut state = self.inner.state.lock().await;
        self.adopt_locked(&mut state, session, Some(user.clone()), true);
        state.loading = false;
        self.publish(&state);
        Ok(user)
    }

    /// Install `session` and re-arm the refresh timer.
    fn adopt_locked(&self, state: &mut State, session: Session, user: Option<User>, persist: bool) {
        if persist {
            self.persist(&session);
        }
        state.epoch += 1;
        self.arm_timer(state, &session);
        state.session = Some(session);
        if let Some(user) = user {
            state.user = Some(user);
        }
    }

    fn arm_timer(&self, state: &mut State, session: &Session) {
        match session.refresh_delay(self.inner.refresh_lead) {
            Some(delay) => {
                let weak = Arc::downgrade(&self.inner);
                state.timer.arm(delay, move |generation| async move {
                    if let Some(inner) = weak.upgrade() {
                        SessionManager { inner }.on_timer_fired(generation).await;
                    }
                });
            }
            None => {
                state.timer.cancel();
                debug!("Session inside refresh window, no timer armed");
            }
        }
    }

    async fn on_timer_fired(&self, generation: u64) {
        if !self.inner.state.lock().await.timer.take_fired(generation) {
            debug!(generation, "Stale refresh timer");
            return;
        }
        info!("Refreshing session ahead of expiry");
        let _ = self.refresh().await;
    }

    /// Returns true if there was anything to clear.
    fn clear_locked(&self, state: &mut State) -> bool {
        let had_session = state.session.is_some() || state.user.is_some();
        state.timer.cancel();
        state.session = None;
        state.user = None;
        state.epoch += 1;
        self.remove_persisted();
        had_session
    }

    /// Sign out without a notice. With `expected_epoch`, only if the session
    /// has not changed since.
    ///
    /// Returns false if the session changed and was left alone.
    async fn force_sign_out(&self, expected_epoch: Option<u64>, reason: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        if expected_epoch.is_some_and(|epoch| epoch != state.epoch) {
            debug!(reason, "Session changed meanwhile, not clearing");
            return false;
        }
        if self.clear_locked(&mut state) {
            info!(reason, "Session cleared");
        }
        self.publish(&state);
        true
    }

    /// Fetch the user for the current session if it is not known yet.
    async fn load_user(&self) {
        let (token, epoch) = {
            let state = self.inner.state.lock().await;
            match &state.session {
                Some(session) if state.user.is_none() => (session.access_token.clone(), state.epoch),
                _ => return,
            }
        };

        match self.inner.backend.me(&token).await {
            Ok(user) => {
                let mut state = self.inner.state.lock().await;
                if state.epoch == epoch {
                    debug!(user_id = %user.id, "User loaded");
                    state.user = Some(user);
                    self.publish(&state);
                }
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected");
                let _ = self.force_sign_out(Some(epoch), "user lookup failed").await;
            }
        }
    }

    fn read_stored_session(&self) -> Option<Session> {
        match self.inner.store.get(keys::SESSION) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable stored session");
                    self.remove_persisted();
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                None
            }
        }
    }

    fn persist(&self, session: &Session) {
        let result = serde_json::to_string(session)
            .map_err(Error::from)
            .and_then(|json| self.inner.store.set(keys::SESSION, &json))
            .and_then(|()| {
                self.inner
                    .store
                    .set(keys::AUTH_TOKEN, &session.access_token)
            });
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist session");
        }
    }

    fn remove_persisted(&self) {
        for key in [keys::SESSION, keys::AUTH_TOKEN] {
            if let Err(e) = self.inner.store.remove(key) {
                warn!(key, error = %e, "Failed to remove persisted value");
            }
        }
    }
}
