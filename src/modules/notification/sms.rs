use super::{Error, Outcome, Result};
use crate::types::Context;
use crate::utils;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub async fn send(ctx: Arc<Context>, phone_number: &str, code: &str) -> Result<Outcome> {
    if utils::otp::is_test_identifier(phone_number, &ctx.otp.test_identifiers) {
        tracing::debug!("Test number {}, skipping SMS dispatch", phone_number);
        return Ok(Outcome::Skipped { is_test: true });
    }

    let body = json!({
        "api_key": ctx.sms.api_key,
        "from": ctx.sms.sender_id,
        "to": phone_number,
        "type": "plain",
        "channel": "generic",
        "sms": format!(
            "Your DriveHub verification code is {}. It expires in {} minutes, do not share it with anyone.",
            code, ctx.otp.validity_minutes
        ),
    });

    let res = reqwest::Client::new()
        .post(ctx.sms.send_endpoint.clone())
        .timeout(Duration::from_secs(ctx.sms.request_timeout_secs))
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            tracing::error!("Failed to reach SMS provider: {}", err);
            Error::NotSent(err.to_string())
        })?;

    if !res.status().is_success() {
        let status = res.status();
        let detail = res.text().await.unwrap_or_default();
        tracing::error!("SMS provider rejected dispatch ({}): {}", status, detail);
        return Err(Error::NotSent(format!("provider returned {}", status)));
    }

    tracing::debug!("Dispatched verification code to {}", phone_number);
    Ok(Outcome::Sent)
}
