pub mod email;
pub mod sms;

use crate::types::Context;
use crate::utils::identifier::Identifier;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the external channel.
    Sent,
    /// Designated test identifier; the real channel was never touched.
    Skipped { is_test: bool },
    /// Surfaced in the logs instead of a real channel.
    Logged,
}

#[derive(Debug)]
pub enum Error {
    NotSent(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSent(cause) => write!(f, "SMS sending failed: {}", cause),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point for code dispatch; routes on the identifier's channel.
pub async fn send_code(ctx: Arc<Context>, identifier: &Identifier, code: &str) -> Result<Outcome> {
    match identifier {
        Identifier::Phone(phone) => sms::send(ctx, phone, code).await,
        Identifier::Email(email) => email::send(ctx, email, code).await,
    }
}
