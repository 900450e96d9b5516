pub use crate::utils::database;
use async_trait::async_trait;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Production,
    Development,
}

impl AppEnvironment {
    pub fn from(raw_environment: String) -> Self {
        match raw_environment.as_ref() {
            "production" => Self::Production,
            _ => Self::Development,
        }
    }
}

/// What a failed code dispatch does to the surrounding flow. Injected as
/// configuration so the behavior is testable without mutating process
/// environment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailurePolicy {
    /// Delivery failure aborts the flow. The already-written OTP record is
    /// kept; a resend simply issues another code.
    Strict,
    /// Delivery failure is logged (including the undelivered code) and the
    /// flow carries on.
    Lenient,
}

impl DeliveryFailurePolicy {
    pub fn resolve(raw: Option<String>, environment: AppEnvironment) -> Self {
        match raw.as_deref() {
            Some("strict") => Self::Strict,
            Some("lenient") => Self::Lenient,
            _ => match environment {
                AppEnvironment::Production => Self::Strict,
                AppEnvironment::Development => Self::Lenient,
            },
        }
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub host: String,
    pub environment: AppEnvironment,
    pub port: u32,
    pub url: String,
    pub delivery_failure_policy: DeliveryFailurePolicy,
}

#[derive(Clone)]
pub struct TokenContext {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Clone)]
pub struct OtpContext {
    pub validity_minutes: i64,
    pub test_identifiers: Vec<String>,
}

#[derive(Clone)]
pub struct SmsContext {
    pub send_endpoint: String,
    pub api_key: String,
    pub sender_id: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone)]
pub struct Context {
    pub app: AppContext,
    pub db_conn: database::DatabaseConnection,
    pub token: TokenContext,
    pub otp: OtpContext,
    pub sms: SmsContext,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub environment: AppEnvironment,
    pub port: u32,
    pub url: String,
    pub delivery_failure_policy: DeliveryFailurePolicy,
}

#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Clone)]
pub struct OtpConfig {
    pub validity_minutes: i64,
    pub test_identifiers: Vec<String>,
}

#[derive(Clone)]
pub struct SmsConfig {
    pub send_endpoint: String,
    pub api_key: String,
    pub sender_id: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub app: AppConfig,
    pub token: TokenConfig,
    pub otp: OtpConfig,
    pub sms: SmsConfig,
}

impl Default for Config {
    fn default() -> Self {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL not set");
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let environment = AppEnvironment::from(env::var("APP_ENV").expect("APP_ENV not set"));
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse::<u32>()
            .expect("Invalid PORT number");
        let url = env::var("URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let delivery_failure_policy =
            DeliveryFailurePolicy::resolve(env::var("DELIVERY_FAILURE_POLICY").ok(), environment);

        let access_secret = env::var("ACCESS_TOKEN_SECRET").expect("ACCESS_TOKEN_SECRET not set");
        let refresh_secret =
            env::var("REFRESH_TOKEN_SECRET").expect("REFRESH_TOKEN_SECRET not set");
        let access_ttl_minutes = env::var("ACCESS_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse::<i64>()
            .expect("Invalid ACCESS_TOKEN_TTL_MINUTES");
        let refresh_ttl_days = env::var("REFRESH_TOKEN_TTL_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse::<i64>()
            .expect("Invalid REFRESH_TOKEN_TTL_DAYS");

        let otp_validity_minutes = env::var("OTP_VALIDITY_MINUTES")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<i64>()
            .expect("Invalid OTP_VALIDITY_MINUTES");
        let test_identifiers = env::var("TEST_IDENTIFIERS")
            .unwrap_or_else(|_| "9993911855".to_string())
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let sms_send_endpoint = env::var("SMS_SEND_ENDPOINT").expect("SMS_SEND_ENDPOINT not set");
        let sms_api_key = env::var("SMS_API_KEY").expect("SMS_API_KEY not set");
        let sms_sender_id = env::var("SMS_SENDER_ID").expect("SMS_SENDER_ID not set");
        let sms_request_timeout_secs = env::var("SMS_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .expect("Invalid SMS_TIMEOUT_SECS");

        Self {
            database: DatabaseConfig { url: database_url },
            app: AppConfig {
                host,
                environment,
                port,
                url,
                delivery_failure_policy,
            },
            token: TokenConfig {
                access_secret,
                refresh_secret,
                access_ttl_minutes,
                refresh_ttl_days,
            },
            otp: OtpConfig {
                validity_minutes: otp_validity_minutes,
                test_identifiers,
            },
            sms: SmsConfig {
                send_endpoint: sms_send_endpoint,
                api_key: sms_api_key,
                sender_id: sms_sender_id,
                request_timeout_secs: sms_request_timeout_secs,
            },
        }
    }
}

#[async_trait]
pub trait ToContext {
    async fn to_context(self) -> Context;
}

#[async_trait]
impl ToContext for Config {
    async fn to_context(self) -> Context {
        let db_conn = database::connect(self.database.url.as_str()).await;
        database::migrate(db_conn.clone()).await;

        Context {
            app: AppContext {
                host: self.app.host,
                environment: self.app.environment,
                port: self.app.port,
                url: self.app.url,
                delivery_failure_policy: self.app.delivery_failure_policy,
            },
            db_conn,
            token: TokenContext {
                access_secret: self.token.access_secret,
                refresh_secret: self.token.refresh_secret,
                access_ttl_minutes: self.token.access_ttl_minutes,
                refresh_ttl_days: self.token.refresh_ttl_days,
            },
            otp: OtpContext {
                validity_minutes: self.otp.validity_minutes,
                test_identifiers: self.otp.test_identifiers,
            },
            sms: SmsContext {
                send_endpoint: self.sms.send_endpoint,
                api_key: self.sms.api_key,
                sender_id: self.sms.sender_id,
                request_timeout_secs: self.sms.request_timeout_secs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_policy_value_wins_over_the_environment() {
        let policy = DeliveryFailurePolicy::resolve(
            Some("lenient".to_string()),
            AppEnvironment::Production,
        );
        assert_eq!(policy, DeliveryFailurePolicy::Lenient);

        let policy = DeliveryFailurePolicy::resolve(
            Some("strict".to_string()),
            AppEnvironment::Development,
        );
        assert_eq!(policy, DeliveryFailurePolicy::Strict);
    }

    #[test]
    fn policy_defaults_from_the_environment() {
        assert_eq!(
            DeliveryFailurePolicy::resolve(None, AppEnvironment::Production),
            DeliveryFailurePolicy::Strict
        );
        assert_eq!(
            DeliveryFailurePolicy::resolve(None, AppEnvironment::Development),
            DeliveryFailurePolicy::Lenient
        );
    }

    #[test]
    fn unknown_policy_values_fall_back_to_the_environment_default() {
        assert_eq!(
            DeliveryFailurePolicy::resolve(Some("whatever".to_string()), AppEnvironment::Production),
            DeliveryFailurePolicy::Strict
        );
    }
}
