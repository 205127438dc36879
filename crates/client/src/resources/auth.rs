use apexkit_shared::{api_path, AuthResponse, Credentials, User};

use crate::api_client::ApiClient;
use crate::error::ApiError;
use crate::request::RequestOptions;

/// Account endpoints. `login` and `register` keep the returned session on
/// the client; `logout` forgets it.
pub struct Auth<'a> {
    pub(crate) client: &'a ApiClient,
}

impl Auth<'_> {
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.authenticate("/auth/login", email, password).await
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.authenticate("/auth/register", email, password).await
    }

    async fn authenticate(&self, path: &str, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let res: AuthResponse = self
            .client
            .request_json(path, RequestOptions::post().json_body(&credentials)?)
            .await?;
        tracing::info!("Authenticated as {}", res.user.display_name());
        self.client.store_session(res.token.clone(), res.user.clone());
        Ok(res)
    }

    pub async fn get_me(&self) -> Result<User, ApiError> {
        self.client.get_json("/auth/me").await
    }

    pub fn logout(&self) {
        self.client.clear_session();
    }

    /// URL that starts the GitHub OAuth flow for this client's context.
    ///
    /// The endpoint answers with a redirect, so the URL is built here and
    /// handed to whatever opens it (a browser, a webview).
    pub fn github_login_url(&self, redirect_to: Option<&str>) -> Result<String, ApiError> {
        let raw = format!("{}{}", self.client.base_url(), api_path("/auth/github", false));
        let mut url = url::Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{raw}: {e}")))?;
        if let Some(redirect_to) = redirect_to {
            url.query_pairs_mut().append_pair("redirect_to", redirect_to);
        }
        Ok(url.to_string())
    }
}
