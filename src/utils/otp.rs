use chrono::{NaiveDateTime, Utc};
use rand::Rng;

/// Code handed out for designated test identifiers, so QA flows stay
/// deterministic and never touch the delivery gateway.
pub const TEST_IDENTIFIER_CODE: &str = "123456";

pub struct GeneratedOtp {
    pub code: String,
    pub expires_at: NaiveDateTime,
}

pub fn is_test_identifier(identifier: &str, test_identifiers: &[String]) -> bool {
    test_identifiers.iter().any(|t| t == identifier)
}

/// Produces a 6-digit numeric code and its absolute expiry timestamp.
pub fn generate(
    identifier: Option<&str>,
    validity_minutes: i64,
    test_identifiers: &[String],
) -> GeneratedOtp {
    let expires_at = Utc::now().naive_utc() + chrono::Duration::minutes(validity_minutes);

    let code = match identifier {
        Some(identifier) if is_test_identifier(identifier, test_identifiers) => {
            TEST_IDENTIFIER_CODE.to_string()
        }
        _ => rand::thread_rng().gen_range(100_000..=999_999).to_string(),
    };

    GeneratedOtp { code, expires_at }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identifiers() -> Vec<String> {
        vec!["9993911855".to_string()]
    }

    #[test]
    fn test_identifiers_always_get_the_fixed_code() {
        for _ in 0..10 {
            let generated = generate(Some("9993911855"), 10, &test_identifiers());
            assert_eq!(generated.code, TEST_IDENTIFIER_CODE);
        }
    }

    #[test]
    fn codes_are_six_digit_numbers() {
        for _ in 0..100 {
            let generated = generate(Some("8001234567"), 10, &test_identifiers());
            let value: u32 = generated.code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value), "got {}", value);
        }
    }

    #[test]
    fn generates_without_an_identifier() {
        let generated = generate(None, 10, &test_identifiers());
        assert_eq!(generated.code.len(), 6);
    }

    #[test]
    fn expiry_is_now_plus_the_validity_window() {
        let generated = generate(Some("8001234567"), 10, &test_identifiers());
        let expected = Utc::now().naive_utc() + chrono::Duration::minutes(10);
        let drift = (generated.expires_at - expected).num_seconds().abs();
        assert!(drift <= 2, "expiry drifted by {}s", drift);
    }
}
