use crate::types::TokenContext;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// The account id is the only application claim; everything else about the
/// session lives in the token itself. There is no server-side session
/// record and no revocation list, so a token stays valid until its
/// embedded expiry (or a secret rotation).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    Expired,
    Invalid,
    Issuance,
}

type Result<T> = std::result::Result<T, Error>;

fn issue(secret: &str, account_id: &str, ttl_seconds: i64) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: account_id.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::seconds(ttl_seconds)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| {
        tracing::error!("Failed to encode token: {}", err);
        Error::Issuance
    })
}

fn verify(secret: &str, token: &str) -> Result<String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.sub)
    .map_err(|err| match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::Expired,
        _ => Error::Invalid,
    })
}

pub fn issue_access_token(token: &TokenContext, account_id: &str) -> Result<String> {
    issue(
        &token.access_secret,
        account_id,
        token.access_ttl_minutes * 60,
    )
}

pub fn issue_refresh_token(token: &TokenContext, account_id: &str) -> Result<String> {
    issue(
        &token.refresh_secret,
        account_id,
        token.refresh_ttl_days * 24 * 60 * 60,
    )
}

pub fn issue_pair(token: &TokenContext, account_id: &str) -> Result<TokenPair> {
    Ok(TokenPair {
        access_token: issue_access_token(token, account_id)?,
        refresh_token: issue_refresh_token(token, account_id)?,
    })
}

pub fn verify_access_token(token: &TokenContext, value: &str) -> Result<String> {
    verify(&token.access_secret, value)
}

pub fn verify_refresh_token(token: &TokenContext, value: &str) -> Result<String> {
    verify(&token.refresh_secret, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_context() -> TokenContext {
        TokenContext {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
        }
    }

    #[test]
    fn access_token_round_trips() {
        let ctx = token_context();
        let token = issue_access_token(&ctx, "account-1").unwrap();
        assert_eq!(verify_access_token(&ctx, &token).unwrap(), "account-1");
    }

    #[test]
    fn refresh_token_round_trips() {
        let ctx = token_context();
        let token = issue_refresh_token(&ctx, "account-1").unwrap();
        assert_eq!(verify_refresh_token(&ctx, &token).unwrap(), "account-1");
    }

    #[test]
    fn access_token_is_rejected_as_a_refresh_token() {
        let ctx = token_context();
        let token = issue_access_token(&ctx, "account-1").unwrap();
        assert_eq!(verify_refresh_token(&ctx, &token), Err(Error::Invalid));
    }

    #[test]
    fn garbage_is_invalid_not_expired() {
        let ctx = token_context();
        assert_eq!(
            verify_access_token(&ctx, "not-a-token"),
            Err(Error::Invalid)
        );
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let ctx = token_context();
        let other = TokenContext {
            access_secret: "different-secret".to_string(),
            ..token_context()
        };
        let token = issue_access_token(&ctx, "account-1").unwrap();
        assert_eq!(verify_access_token(&other, &token), Err(Error::Invalid));
    }

    #[test]
    fn expired_token_is_reported_distinctly() {
        let ctx = TokenContext {
            access_ttl_minutes: -5,
            ..token_context()
        };
        let token = issue_access_token(&ctx, "account-1").unwrap();
        assert_eq!(verify_access_token(&ctx, &token), Err(Error::Expired));
    }

    #[test]
    fn pair_carries_both_tokens() {
        let ctx = token_context();
        let pair = issue_pair(&ctx, "account-1").unwrap();
        assert_eq!(verify_access_token(&ctx, &pair.access_token).unwrap(), "account-1");
        assert_eq!(
            verify_refresh_token(&ctx, &pair.refresh_token).unwrap(),
            "account-1"
        );
        assert_ne!(pair.access_token, pair.refresh_token);
    }

    #[test]
    fn expiries_match_the_configured_windows() {
        let ctx = token_context();
        let now = Utc::now().timestamp();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let access = issue_access_token(&ctx, "account-1").unwrap();
        let claims = decode::<Claims>(
            &access,
            &DecodingKey::from_secret(ctx.access_secret.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims;
        let lifetime = claims.exp - now;
        assert!(lifetime > 14 * 60 && lifetime <= 15 * 60 + 5);

        let refresh = issue_refresh_token(&ctx, "account-1").unwrap();
        let claims = decode::<Claims>(
            &refresh,
            &DecodingKey::from_secret(ctx.refresh_secret.as_bytes()),
            &validation,
        )
        .unwrap()
        .claims;
        let lifetime = claims.exp - now;
        assert!(lifetime > 6 * 24 * 3600 && lifetime <= 7 * 24 * 3600 + 5);
    }
}
