use crate::modules::account::{self, repository::Account};
use crate::utils::identifier::Identifier;
use sqlx::PgExecutor;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    NotFound,
    Deactivated,
    UnexpectedError,
}

/// Looks up the account a login-style identifier refers to. Never creates
/// anything; account creation belongs to the registration path alone.
pub async fn resolve<'e, E: PgExecutor<'e>>(e: E, identifier: &Identifier) -> Result<Account, Error> {
    let account = match identifier {
        Identifier::Email(email) => account::repository::find_by_email(e, email.clone()).await,
        Identifier::Phone(phone) => {
            account::repository::find_by_phone_number(e, phone.clone()).await
        }
    }
    .map_err(|_| Error::UnexpectedError)?
    .ok_or(Error::NotFound)?;

    if !account.is_active {
        return Err(Error::Deactivated);
    }

    Ok(account)
}
