#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Phone,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Unrecognized,
}

/// An email-or-phone login identifier, classified once at the boundary and
/// carried as a typed value from there on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(String),
    Phone(String),
}

impl Identifier {
    /// Anything containing `@` is treated as an email (lowercased);
    /// everything else is reduced to its digits and treated as a phone
    /// number.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();

        if trimmed.contains('@') {
            return Ok(Self::Email(trimmed.to_lowercase()));
        }

        let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(Error::Unrecognized);
        }

        Ok(Self::Phone(digits))
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Email(email) => email,
            Self::Phone(phone) => phone,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Self::Email(_) => Channel::Email,
            Self::Phone(_) => Channel::Phone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_emails() {
        let identifier = Identifier::parse("Rider@Example.COM").unwrap();
        assert_eq!(
            identifier,
            Identifier::Email("rider@example.com".to_string())
        );
        assert_eq!(identifier.channel(), Channel::Email);
    }

    #[test]
    fn classifies_phone_numbers_and_strips_formatting() {
        let identifier = Identifier::parse("+91 99939-11855").unwrap();
        assert_eq!(identifier, Identifier::Phone("919993911855".to_string()));
        assert_eq!(identifier.channel(), Channel::Phone);
    }

    #[test]
    fn at_sign_wins_over_digits() {
        let identifier = Identifier::parse("123@456").unwrap();
        assert!(matches!(identifier, Identifier::Email(_)));
    }

    #[test]
    fn rejects_input_with_no_usable_digits() {
        assert!(Identifier::parse("not a phone").is_err());
        assert!(Identifier::parse("   ").is_err());
    }
}
