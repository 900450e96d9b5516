use super::{resolver, token};
use crate::modules::account::{self, repository::Account};
use crate::modules::auth::repository::{self, Otp, Purpose};
use crate::modules::notification;
use crate::types::{Context, DeliveryFailurePolicy};
use crate::utils;
use crate::utils::identifier::Identifier;
use chrono::{NaiveDateTime, Utc};
use std::sync::Arc;

#[derive(Debug)]
pub enum IssueError {
    DeliveryFailed(String),
    UnexpectedError,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VerifyError {
    /// Covers wrong code and unknown identifier alike; the two are
    /// indistinguishable to callers so valid identifiers cannot be probed.
    NotFound,
    Expired,
    Deactivated,
    UnexpectedError,
}

/// Generates a code, records it, and dispatches it over the identifier's
/// channel. The record is written before dispatch is attempted, so a
/// failed delivery never erases the code: under the lenient policy the
/// flow continues with the code in the logs, under the strict policy the
/// caller sees the failure but a resend can still mint a fresh code.
pub async fn issue(
    ctx: Arc<Context>,
    identifier: &Identifier,
    purpose: Purpose,
) -> Result<Otp, IssueError> {
    let generated = utils::otp::generate(
        Some(identifier.value()),
        ctx.otp.validity_minutes,
        &ctx.otp.test_identifiers,
    );

    let record = repository::create(
        &ctx.db_conn.pool,
        repository::CreateOtpPayload {
            identifier: identifier.value().to_string(),
            otp: generated.code.clone(),
            channel: identifier.channel().as_str().to_string(),
            purpose: purpose.as_str().to_string(),
            expires_at: generated.expires_at,
        },
    )
    .await
    .map_err(|_| IssueError::UnexpectedError)?;

    match notification::send_code(ctx.clone(), identifier, &generated.code).await {
        Ok(_) => Ok(record),
        Err(err) => match ctx.app.delivery_failure_policy {
            DeliveryFailurePolicy::Lenient => {
                tracing::warn!(
                    "{}; continuing, code for {} is {}",
                    err,
                    identifier.value(),
                    generated.code
                );
                Ok(record)
            }
            DeliveryFailurePolicy::Strict => Err(IssueError::DeliveryFailed(err.to_string())),
        },
    }
}

/// Picks the record a submitted code is checked against and decides its
/// fate. Only the newest unconsumed record counts: issuing a new code
/// makes older ones irrelevant without touching them. An expired match is
/// reported without consuming anything, so a later resend still works.
fn evaluate<'a>(
    candidates: &'a [Otp],
    submitted_code: &str,
    now: NaiveDateTime,
) -> Result<&'a Otp, VerifyError> {
    let latest = candidates
        .iter()
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
        .ok_or(VerifyError::NotFound)?;

    if latest.otp != submitted_code {
        return Err(VerifyError::NotFound);
    }
    if now > latest.expires_at {
        return Err(VerifyError::Expired);
    }

    Ok(latest)
}

/// Consumes a submitted code and returns the verified account together
/// with a fresh token pair. Consumption and the verified-flag flip commit
/// together; the compare-and-swap in the repository keeps concurrent
/// verifications of the same code from both succeeding.
pub async fn verify(
    ctx: Arc<Context>,
    identifier: &Identifier,
    submitted_code: &str,
) -> Result<(Account, token::TokenPair), VerifyError> {
    let mut tx = ctx.db_conn.pool.begin().await.map_err(|err| {
        tracing::error!("Failed to start database transaction: {}", err);
        VerifyError::UnexpectedError
    })?;

    let account = resolver::resolve(&mut *tx, identifier)
        .await
        .map_err(|err| match err {
            resolver::Error::NotFound => VerifyError::NotFound,
            resolver::Error::Deactivated => VerifyError::Deactivated,
            resolver::Error::UnexpectedError => VerifyError::UnexpectedError,
        })?;

    let candidates =
        repository::find_unused_by_identifier(&mut *tx, identifier.value().to_string())
            .await
            .map_err(|_| VerifyError::UnexpectedError)?;

    let selected = evaluate(&candidates, submitted_code, Utc::now().naive_utc())?;

    repository::consume_by_id(&mut *tx, selected.id.clone())
        .await
        .map_err(|_| VerifyError::UnexpectedError)?
        .ok_or(VerifyError::NotFound)?;

    let account = match identifier {
        Identifier::Email(_) => {
            account::repository::mark_email_verified(&mut *tx, account.id.clone()).await
        }
        Identifier::Phone(_) => {
            account::repository::mark_phone_verified(&mut *tx, account.id.clone()).await
        }
    }
    .map_err(|_| VerifyError::UnexpectedError)?;

    tx.commit().await.map_err(|err| {
        tracing::error!("Failed to commit database transaction: {}", err);
        VerifyError::UnexpectedError
    })?;

    let pair =
        token::issue_pair(&ctx.token, &account.id).map_err(|_| VerifyError::UnexpectedError)?;

    Ok((account, pair))
}

/// Housekeeping for the background reaper; verification checks expiry
/// itself, so correctness never depends on this running.
pub async fn reap_expired(ctx: Arc<Context>) {
    match repository::delete_expired(&ctx.db_conn.pool).await {
        Ok(0) => (),
        Ok(reaped) => tracing::debug!("Reaped {} expired otp records", reaped),
        Err(_) => tracing::error!("Expired otp reap failed, will retry on the next tick"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, code: &str, created_offset_secs: i64, expires_offset_secs: i64) -> Otp {
        let now = Utc::now().naive_utc();
        Otp {
            id: id.to_string(),
            identifier: "9876543210".to_string(),
            otp: code.to_string(),
            channel: "phone".to_string(),
            purpose: "login".to_string(),
            is_used: false,
            expires_at: now + Duration::seconds(expires_offset_secs),
            created_at: now + Duration::seconds(created_offset_secs),
        }
    }

    fn now() -> NaiveDateTime {
        Utc::now().naive_utc()
    }

    #[test]
    fn no_candidates_is_not_found() {
        assert_eq!(
            evaluate(&[], "123456", now()).unwrap_err(),
            VerifyError::NotFound
        );
    }

    #[test]
    fn wrong_code_is_not_found() {
        let records = vec![record("01A", "111111", -10, 600)];
        assert_eq!(
            evaluate(&records, "222222", now()).unwrap_err(),
            VerifyError::NotFound
        );
    }

    #[test]
    fn matching_valid_code_is_accepted() {
        let records = vec![record("01A", "111111", -10, 600)];
        assert_eq!(evaluate(&records, "111111", now()).unwrap().id, "01A");
    }

    #[test]
    fn newest_record_wins_and_older_codes_stop_verifying() {
        let records = vec![
            record("01B", "222222", -5, 600),
            record("01A", "111111", -60, 600),
        ];

        // Both are unexpired, but only the most recently issued code counts.
        assert_eq!(evaluate(&records, "222222", now()).unwrap().id, "01B");
        assert_eq!(
            evaluate(&records, "111111", now()).unwrap_err(),
            VerifyError::NotFound
        );
    }

    #[test]
    fn expired_code_is_reported_as_expired() {
        let records = vec![record("01A", "111111", -700, -60)];
        assert_eq!(
            evaluate(&records, "111111", now()).unwrap_err(),
            VerifyError::Expired
        );
    }

    #[test]
    fn resend_after_expiry_unblocks_verification() {
        // The expired record stays unconsumed; a fresh one supersedes it.
        let expired = record("01A", "111111", -700, -60);
        assert_eq!(
            evaluate(&[expired.clone()], "111111", now()).unwrap_err(),
            VerifyError::Expired
        );
        assert!(!expired.is_used);

        let records = vec![expired, record("01B", "333333", -5, 600)];
        assert_eq!(evaluate(&records, "333333", now()).unwrap().id, "01B");
    }

    #[test]
    fn creation_time_ties_break_on_id() {
        let mut older = record("01A", "111111", 0, 600);
        let newer = record("01B", "222222", 0, 600);
        older.created_at = newer.created_at;

        let records = vec![older, newer];
        assert_eq!(evaluate(&records, "222222", now()).unwrap().id, "01B");
    }
}
