//! OAuth provider definitions and token/identity exchange.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::config::Config;

/// A configured OAuth provider. A provider missing its client id/secret in
/// the environment is disabled and never listed on the login page.
#[derive(Debug, Clone)]
pub struct Provider {
    pub name: &'static str,
    pub authorize_url: &'static str,
    token_url: &'static str,
    user_url: &'static str,
    pub scope: &'static str,
    pub client_id: String,
    client_secret: String,
}

impl Provider {
    pub fn from_config(config: &Config, name: &str) -> Option<Self> {
        match name {
            "github" => {
                let client_id = config.github_client_id.clone()?;
                let client_secret = config.github_client_secret.clone()?;
                Some(Provider {
                    name: "github",
                    authorize_url: "https://github.com/login/oauth/authorize",
                    token_url: "https://github.com/login/oauth/access_token",
                    user_url: "https://api.github.com/user",
                    scope: "read:user",
                    client_id,
                    client_secret,
                })
            }
            "gitlab" => {
                let client_id = config.gitlab_client_id.clone()?;
                let client_secret = config.gitlab_client_secret.clone()?;
                Some(Provider {
                    name: "gitlab",
                    authorize_url: "https://gitlab.com/oauth/authorize",
                    token_url: "https://gitlab.com/oauth/token",
                    user_url: "https://gitlab.com/api/v4/user",
                    scope: "read_user",
                    client_id,
                    client_secret,
                })
            }
            _ => None,
        }
    }

    /// Names of all providers enabled by the current configuration.
    pub fn enabled(config: &Config) -> Vec<&'static str> {
        ["github", "gitlab"]
            .into_iter()
            .filter(|name| Provider::from_config(config, name).is_some())
            .collect()
    }

    /// Build the URL the browser is sent to for authorization.
    pub fn authorize_redirect(&self, state: &str, redirect_uri: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(self.scope),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: Option<String>,
            error_description: Option<String>,
        }

        let response = http
            .post(self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .context("token exchange request failed")?
            .error_for_status()
            .context("token endpoint returned an error status")?;

        let token: TokenResponse = response
            .json()
            .await
            .context("failed to parse token response")?;

        match token.access_token {
            Some(access_token) => Ok(access_token),
            None => bail!(
                "no access token in response: {}",
                token.error_description.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    /// Fetch the provider-side account name for the authorized user.
    pub async fn fetch_username(&self, http: &reqwest::Client, token: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct UserResponse {
            // GitHub calls it `login`, GitLab `username`; only one is set.
            login: Option<String>,
            username: Option<String>,
        }

        let user: UserResponse = http
            .get(self.user_url)
            .bearer_auth(token)
            .send()
            .await
            .context("user info request failed")?
            .error_for_status()
            .context("user endpoint returned an error status")?
            .json()
            .await
            .context("failed to parse user response")?;

        user.login
            .or(user.username)
            .context("user response missing account name")
    }
}
