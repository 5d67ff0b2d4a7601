//! Identity endpoints: sign-in, sign-up, refresh, current user.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::google::GoogleCredential;
use super::{ApiClient, Auth};
use crate::error::Result;
use crate::session::{Session, User};

/// User plus session, as returned by a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthPayload {
    pub user: User,
    pub session: Session,
}

/// Google sign-in answer; `is_new_user` is set when the account was just created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleAuthPayload {
    pub user: User,
    pub session: Session,
    #[serde(default)]
    pub is_new_user: bool,
}

/// Sign-up answer. Without a session the account awaits email verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SignUpPayload {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
struct SignInBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    session: Session,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MeResponse {
    Wrapped { user: User },
    Bare(User),
}

/// The identity backend as seen by the session manager.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthPayload>;

    async fn sign_in_with_google(&self, credential: &GoogleCredential) -> Result<GoogleAuthPayload>;

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<SignUpPayload>;

    /// Exchange a refresh token for a new session.
    async fn refresh_token(&self, refresh_token: &str) -> Result<Session>;

    /// Fetch the user owning `access_token`.
    async fn me(&self, access_token: &str) -> Result<User>;
}

#[async_trait]
impl IdentityBackend for ApiClient {
    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthPayload> {
        let path = "/auth/sign_in";
        let req = self
            .request(Method::POST, path)
            .json(&SignInBody { email, password });
        self.send_json(path, req, Auth::None).await
    }

    #[instrument(skip_all)]
    async fn sign_in_with_google(&self, credential: &GoogleCredential) -> Result<GoogleAuthPayload> {
        let path = "/auth/sign_in_with_google";
        let req = self.request(Method::POST, path).json(credential);
        self.send_json(path, req, Auth::None).await
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<SignUpPayload> {
        let path = "/auth/sign_up";
        let req = self
            .request(Method::POST, path)
            .json(&SignUpBody { email, password, name });
        self.send_json(path, req, Auth::None).await
    }

    #[instrument(skip_all)]
    async fn refresh_token(&self, refresh_token: &str) -> Result<Session> {
        let path = "/auth/refresh_token";
        let req = self
            .request(Method::POST, path)
            .json(&RefreshBody { refresh_token });
        let resp: RefreshResponse = self.send_json(path, req, Auth::None).await?;
        Ok(resp.session)
    }

    #[instrument(skip_all)]
    async fn me(&self, access_token: &str) -> Result<User> {
        let path = "/auth/me";
        let req = self.request(Method::GET, path);
        let resp: MeResponse = self.send_json(path, req, Auth::Token(access_token)).await?;
        Ok(match resp {
            MeResponse::Wrapped { user } | MeResponse::Bare(user) => user,
        })
    }
}
