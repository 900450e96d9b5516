use super::service;
use crate::modules::account::{self, repository::Account};
use crate::types::Context;
use axum::extract::{Extension, FromRequestParts};
use axum::http::{self, request::Parts, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{async_trait, Json, RequestPartsExt};
use serde_json::json;
use std::sync::Arc;

enum Rejection {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    UnknownAccount,
}

impl Rejection {
    /// The `code` field is machine-readable: the client interceptor only
    /// attempts a silent refresh on `TOKEN_EXPIRED`, never on a malformed
    /// or tampered token.
    fn into_response(self) -> Response {
        let (message, code) = match self {
            Self::MissingToken => ("Authentication required", "AUTH_REQUIRED"),
            Self::InvalidToken => ("Invalid token", "INVALID_TOKEN"),
            Self::ExpiredToken => ("Token expired", "TOKEN_EXPIRED"),
            Self::UnknownAccount => ("Invalid token", "INVALID_TOKEN"),
        };

        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "message": message,
                "code": code,
            })),
        )
            .into_response()
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn account_from_header(ctx: Arc<Context>, header: &str) -> Result<Account, Rejection> {
    let token = bearer_token(header).ok_or(Rejection::MissingToken)?;

    let account_id =
        service::token::verify_access_token(&ctx.token, token).map_err(|err| match err {
            service::token::Error::Expired => Rejection::ExpiredToken,
            _ => Rejection::InvalidToken,
        })?;

    let account = account::repository::find_by_id(&ctx.db_conn.pool, account_id)
        .await
        .map_err(|_| Rejection::UnknownAccount)?
        .ok_or(Rejection::UnknownAccount)?;

    if !account.is_active {
        return Err(Rejection::UnknownAccount);
    }

    Ok(account)
}

/// Extractor gating protected routes; resolves the bearer token to a live
/// account and hands it to the handler.
#[derive(Clone)]
pub struct Auth {
    pub account: Account,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Extension(ctx) = parts.extract::<Extension<Arc<Context>>>().await.unwrap();
        let headers = parts.extract::<HeaderMap>().await.unwrap();

        let auth_header = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| Rejection::MissingToken.into_response())?;

        account_from_header(ctx, auth_header)
            .await
            .map(|account| Self { account })
            .map_err(|rejection| rejection.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_token_after_the_bearer_scheme() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_headers_without_a_bearer_scheme() {
        assert_eq!(bearer_token("abc.def.ghi"), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token(""), None);
    }
}
