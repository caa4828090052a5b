//! The identity message a peer sends once per connection.
//!
//! Its wire form is a single text payload, `"<userId>:<displayName>"`.
//! Anything after a second colon is ignored, so display names can't
//! contain `:`.

use std::fmt;
use std::str::FromStr;

use crate::{ProtocolError, UserId};

/// Upper bound, in bytes, on each identity field.
pub const MAX_FIELD_BYTES: usize = 61;

const SEPARATOR: char = ':';

/// A peer's directory identity, as announced to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
}

impl Identity {
    /// Builds an identity, enforcing the same rules as [`Identity::parse`].
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        let user_id = user_id.into();
        let display_name = display_name.into();
        validate(&user_id, &display_name)?;
        Ok(Self {
            user_id: UserId(user_id),
            display_name,
        })
    }

    /// Parses a `"<userId>:<displayName>"` payload.
    ///
    /// # Errors
    /// [`ProtocolError::MalformedIdentity`] when there are fewer than two
    /// fields, the user id is empty, or a field is longer than
    /// [`MAX_FIELD_BYTES`].
    pub fn parse(payload: &str) -> Result<Self, ProtocolError> {
        let mut fields = payload.split(SEPARATOR);
        let user_id = fields.next().unwrap_or_default();
        let display_name = fields.next().ok_or_else(|| {
            ProtocolError::MalformedIdentity(format!(
                "expected <userId>:<displayName>, got {payload:?}"
            ))
        })?;
        Self::new(user_id, display_name)
    }

    /// Renders the wire payload.
    pub fn to_payload(&self) -> String {
        format!("{}{SEPARATOR}{}", self.user_id, self.display_name)
    }
}

fn validate(user_id: &str, display_name: &str) -> Result<(), ProtocolError> {
    if user_id.is_empty() {
        return Err(ProtocolError::MalformedIdentity("empty user id".into()));
    }
    for (field, value) in [("user id", user_id), ("display name", display_name)] {
        if value.contains(SEPARATOR) {
            return Err(ProtocolError::MalformedIdentity(format!(
                "{field} must not contain ':'"
            )));
        }
        if value.len() > MAX_FIELD_BYTES {
            return Err(ProtocolError::MalformedIdentity(format!(
                "{field} is {} bytes, limit is {MAX_FIELD_BYTES}",
                value.len()
            )));
        }
    }
    Ok(())
}

impl FromStr for Identity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_fields() {
        let id = Identity::parse("user-1:Alice").expect("valid");
        assert_eq!(id.user_id, UserId::new("user-1"));
        assert_eq!(id.display_name, "Alice");
    }

    #[test]
    fn test_parse_single_field_is_malformed() {
        let result = Identity::parse("onlyonefield");
        assert!(matches!(result, Err(ProtocolError::MalformedIdentity(_))));
    }

    #[test]
    fn test_parse_empty_payload_is_malformed() {
        assert!(Identity::parse("").is_err());
    }

    #[test]
    fn test_parse_ignores_extra_fields() {
        let id = Identity::parse("u:Bob:extra:stuff").expect("valid");
        assert_eq!(id.display_name, "Bob");
    }

    #[test]
    fn test_parse_empty_display_name_is_allowed() {
        let id = Identity::parse("u:").expect("valid");
        assert_eq!(id.display_name, "");
    }

    #[test]
    fn test_parse_empty_user_id_is_malformed() {
        assert!(Identity::parse(":Nameless").is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_display_name() {
        let payload = format!("u:{}", "x".repeat(MAX_FIELD_BYTES + 1));
        assert!(Identity::parse(&payload).is_err());

        let payload = format!("u:{}", "x".repeat(MAX_FIELD_BYTES));
        assert!(Identity::parse(&payload).is_ok());
    }

    #[test]
    fn test_to_payload_parses_back() {
        let id = Identity::new("abc", "Carol").expect("valid");
        assert_eq!(id.to_payload(), "abc:Carol");
        assert_eq!(id.to_payload().parse::<Identity>().expect("parse"), id);
    }

    #[test]
    fn test_new_rejects_colon_in_either_field() {
        assert!(Identity::new("a:b", "x").is_err());
        assert!(Identity::new("a", "x:y").is_err());
    }
}
