use chrono::NaiveDateTime;
use serde::Deserialize;
use sqlx::PgExecutor;
use ulid::Ulid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Register,
    Login,
    ResetPassword,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::ResetPassword => "reset_password",
        }
    }
}

/// A one-time code record. Each record moves through `valid -> used` at
/// most once; expiry is implicit via `expires_at`. New requests always
/// insert fresh records, they never revive old ones.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Otp {
    pub id: String,
    pub identifier: String,
    pub otp: String,
    pub channel: String,
    pub purpose: String,
    pub is_used: bool,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug)]
pub enum Error {
    UnexpectedError,
}

pub struct CreateOtpPayload {
    pub identifier: String,
    pub otp: String,
    pub channel: String,
    pub purpose: String,
    pub expires_at: NaiveDateTime,
}

pub async fn create<'e, E: PgExecutor<'e>>(e: E, payload: CreateOtpPayload) -> Result<Otp, Error> {
    sqlx::query_as::<_, Otp>(
        "
        INSERT INTO otps (id, identifier, otp, channel, purpose, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(Ulid::new().to_string())
    .bind(payload.identifier)
    .bind(payload.otp)
    .bind(payload.channel)
    .bind(payload.purpose)
    .bind(payload.expires_at)
    .fetch_one(e)
    .await
    .map_err(|err| {
        tracing::error!("Error occurred while creating otp: {}", err);
        Error::UnexpectedError
    })
}

/// All unconsumed records for an identifier, newest first. Verification
/// only ever honors the newest one; older records are left to the reaper.
pub async fn find_unused_by_identifier<'e, E: PgExecutor<'e>>(
    e: E,
    identifier: String,
) -> Result<Vec<Otp>, Error> {
    sqlx::query_as::<_, Otp>(
        "
        SELECT * FROM otps
        WHERE identifier = $1 AND is_used = FALSE
        ORDER BY created_at DESC, id DESC
        ",
    )
    .bind(identifier.clone())
    .fetch_all(e)
    .await
    .map_err(|err| {
        tracing::error!(
            "Error occurred while fetching otps for {}: {}",
            identifier,
            err
        );
        Error::UnexpectedError
    })
}

/// Marks a record used. The `is_used = FALSE` guard makes the
/// read-check-mark sequence a compare-and-swap: of two concurrent
/// verifications, only one gets the row back.
pub async fn consume_by_id<'e, E: PgExecutor<'e>>(e: E, id: String) -> Result<Option<Otp>, Error> {
    sqlx::query_as::<_, Otp>(
        "UPDATE otps SET is_used = TRUE WHERE id = $1 AND is_used = FALSE RETURNING *",
    )
    .bind(id.clone())
    .fetch_optional(e)
    .await
    .map_err(|err| {
        tracing::error!("Failed to consume otp {}: {}", id, err);
        Error::UnexpectedError
    })
}

pub async fn delete_expired<'e, E: PgExecutor<'e>>(e: E) -> Result<u64, Error> {
    sqlx::query("DELETE FROM otps WHERE expires_at < NOW()")
        .execute(e)
        .await
        .map(|res| res.rows_affected())
        .map_err(|err| {
            tracing::error!("Failed to delete expired otps: {}", err);
            Error::UnexpectedError
        })
}
