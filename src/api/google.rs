//! Google sign-in credential helper.
//!
//! A browser-side Google flow yields an OAuth access token. The backend wants
//! an identity token, so the profile is fetched from Google's userinfo endpoint
//! and its claims are packed into a base64 JSON token that travels alongside
//! the original access token.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::net::HttpClient;

/// Google's OAuth2 userinfo endpoint.
pub const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Profile returned by the userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub verified_email: bool,
}

/// Body of `POST /auth/sign_in_with_google`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoogleCredential {
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl GoogleCredential {
    /// Credential from an identity token obtained directly.
    pub fn from_id_token(id_token: impl Into<String>) -> Self {
        Self {
            id_token: id_token.into(),
            access_token: None,
        }
    }

    /// Credential derived from a fetched profile.
    pub fn from_profile(profile: &GoogleProfile, access_token: impl Into<String>) -> Self {
        Self {
            id_token: encode_id_token(profile),
            access_token: Some(access_token.into()),
        }
    }
}

#[derive(Serialize)]
struct IdTokenClaims<'a> {
    sub: &'a str,
    email: &'a str,
    name: Option<&'a str>,
    picture: Option<&'a str>,
    email_verified: bool,
}

/// Base64 (standard alphabet, padded) of the profile claims as JSON.
pub fn encode_id_token(profile: &GoogleProfile) -> String {
    let claims = IdTokenClaims {
        sub: &profile.id,
        email: &profile.email,
        name: profile.name.as_deref(),
        picture: profile.picture.as_deref(),
        email_verified: profile.verified_email,
    };
    // Serializing a struct of strings and a bool cannot fail.
    let json = serde_json::to_vec(&claims).unwrap_or_default();
    STANDARD.encode(json)
}

/// Fetch the Google profile for `access_token` from `userinfo_url`.
#[instrument(skip(http, access_token))]
pub async fn fetch_profile(http: &HttpClient, userinfo_url: &str, access_token: &str) -> Result<GoogleProfile> {
    let resp = http
        .inner()
        .get(userinfo_url)
        .query(&[("access_token", access_token)])
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::InvalidCredentials(
            "Failed to get user info from Google".to_string(),
        ));
    }
    resp.json().await.map_err(Error::from)
}

/// Fetch the profile and build the sign-in credential in one step.
pub async fn credential_from_access_token(
    http: &HttpClient,
    userinfo_url: &str,
    access_token: &str,
) -> Result<GoogleCredential> {
    let profile = fetch_profile(http, userinfo_url, access_token).await?;
    Ok(GoogleCredential::from_profile(&profile, access_token))
}
