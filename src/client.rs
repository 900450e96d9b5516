pub use crate::modules::auth::service::token::TokenPair;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Mutex;

#[derive(Debug)]
pub enum Error {
    Transport(String),
    RefreshRejected(StatusCode),
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    fn error_code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }
}

/// HTTP client that makes access-token expiry invisible to callers: when a
/// request bounces with an expired-token rejection, the stored refresh
/// token is exchanged for a new access token and the request is replayed,
/// at most once per original request.
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: Mutex<Option<TokenPair>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            tokens: Mutex::new(None),
        }
    }

    pub async fn store_tokens(&self, pair: TokenPair) {
        *self.tokens.lock().await = Some(pair);
    }

    pub async fn tokens(&self) -> Option<TokenPair> {
        self.tokens.lock().await.clone()
    }

    /// Tokens are stateless server-side, so logging out is simply
    /// discarding them.
    pub async fn logout(&self) {
        *self.tokens.lock().await = None;
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, Error> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, Error> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// The retry flag is flipped before the refresh attempt, so even a
    /// refresh endpoint that keeps handing back expired tokens cannot
    /// produce a refresh loop. Only `TOKEN_EXPIRED` rejections trigger a
    /// refresh; an invalid-signature rejection means tampering or
    /// misconfiguration and is returned as-is.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, Error> {
        let mut retried = false;

        loop {
            let response = self.dispatch(&method, path, body.as_ref()).await?;

            let expired = response.status == StatusCode::UNAUTHORIZED
                && response.error_code() == Some("TOKEN_EXPIRED");
            if !expired || retried {
                return Ok(response);
            }

            retried = true;

            let refresh_token = match self.tokens().await {
                Some(pair) => pair.refresh_token,
                None => {
                    self.logout().await;
                    return Ok(response);
                }
            };

            match self.refresh(&refresh_token).await {
                Ok(access_token) => {
                    let mut guard = self.tokens.lock().await;
                    if let Some(pair) = guard.as_mut() {
                        pair.access_token = access_token;
                    }
                }
                Err(err) => {
                    tracing::warn!("Token refresh failed ({:?}), logging out", err);
                    self.logout().await;
                    return Ok(response);
                }
            }
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, Error> {
        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path));

        if let Some(pair) = self.tokens.lock().await.as_ref() {
            request = request.bearer_auth(&pair.access_token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;

        let status = response.status();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        Ok(ApiResponse { status, body })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, Error> {
        let response = self
            .dispatch(
                &Method::POST,
                "/api/auth/refresh",
                Some(&json!({ "refresh_token": refresh_token })),
            )
            .await?;

        if response.status != StatusCode::OK {
            return Err(Error::RefreshRejected(response.status));
        }

        response
            .body
            .get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Transport("refresh response missing access_token".to_string()))
    }
}
