use chrono::NaiveDateTime;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgExecutor;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Standard,
    Owner,
    Guarantor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Owner => "owner",
            Self::Guarantor => "guarantor",
            Self::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub full_name: String,
    pub role: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub is_active: bool,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

/// The shape returned to clients after verification and from the profile
/// endpoint. Internal bookkeeping columns stay out of it.
pub fn summary(account: &Account) -> serde_json::Value {
    json!({
        "id": account.id,
        "email": account.email,
        "phone_number": account.phone_number,
        "full_name": account.full_name,
        "role": account.role,
        "email_verified": account.email_verified,
        "phone_verified": account.phone_verified,
        "referral_code": account.referral_code,
    })
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

pub struct CreateAccountPayload {
    pub email: String,
    pub phone_number: String,
    pub full_name: String,
    pub referred_by: Option<String>,
}

fn generate_referral_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}

pub async fn create<'e, E: PgExecutor<'e>>(
    e: E,
    payload: CreateAccountPayload,
) -> Result<Account, Error> {
    sqlx::query_as::<_, Account>(
        "
        INSERT INTO accounts (id, email, phone_number, full_name, role, referral_code, referred_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.email)
    .bind(payload.phone_number)
    .bind(payload.full_name)
    .bind(Role::Standard.as_str())
    .bind(generate_referral_code())
    .bind(payload.referred_by)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating account: {}", err);
        Error::UnexpectedError
    })
}

pub async fn find_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Account>, Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id.clone())
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred while fetching account {}: {}", id, err);
            Error::UnexpectedError
        })
}

pub async fn find_by_email<'e, E: PgExecutor<'e>>(
    e: E,
    email: String,
) -> Result<Option<Account>, Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
        .bind(email)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred in find_by_email: {}", err);
            Error::UnexpectedError
        })
}

pub async fn find_by_phone_number<'e, E: PgExecutor<'e>>(
    e: E,
    phone_number: String,
) -> Result<Option<Account>, Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE phone_number = $1")
        .bind(phone_number)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred in find_by_phone_number: {}", err);
            Error::UnexpectedError
        })
}

pub async fn find_by_referral_code<'e, E: PgExecutor<'e>>(
    e: E,
    referral_code: String,
) -> Result<Option<Account>, Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE referral_code = $1")
        .bind(referral_code)
        .fetch_optional(e)
        .await
        .map_err(|err| {
            tracing::error!("Error occurred in find_by_referral_code: {}", err);
            Error::UnexpectedError
        })
}

pub async fn mark_email_verified<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Account, Error> {
    sqlx::query_as::<_, Account>(
        "UPDATE accounts SET email_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id.clone())
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Failed to mark email verified for account {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn mark_phone_verified<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Account, Error> {
    sqlx::query_as::<_, Account>(
        "UPDATE accounts SET phone_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id.clone())
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Failed to mark phone verified for account {}: {}", id, err);
        Error::UnexpectedError
    })
}

/// Accounts are never hard-deleted by this subsystem, only deactivated.
pub async fn deactivate_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<(), Error> {
    sqlx::query("UPDATE accounts SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
        .bind(id.clone())
        .execute(e)
        .await
        .map(|_| ())
        .map_err(|err| {
            tracing::error!("Failed to deactivate account {}: {}", id, err);
            Error::UnexpectedError
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referral_codes_are_eight_uppercase_alphanumerics() {
        for _ in 0..20 {
            let code = generate_referral_code();
            assert_eq!(code.len(), 8);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }
}
