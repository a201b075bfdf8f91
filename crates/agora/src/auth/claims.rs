//! JWT claims.

use serde::{Deserialize, Serialize};

/// JWT claims structure.
///
/// Issued by the external auth service; this service only validates and
/// reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,

    /// Issued at (as Unix timestamp).
    #[serde(default)]
    pub iat: Option<i64>,

    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,

    /// User's preferred username.
    #[serde(default)]
    pub preferred_username: Option<String>,

    /// User's display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl Claims {
    /// Best available username for display and message attribution.
    pub fn username(&self) -> &str {
        self.preferred_username
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(&self.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            sub: "user-123".to_string(),
            exp: 0,
            iat: None,
            iss: None,
            preferred_username: Some("alice".to_string()),
            name: Some("Alice Doe".to_string()),
        }
    }

    #[test]
    fn test_username_prefers_preferred_username() {
        assert_eq!(claims().username(), "alice");
    }

    #[test]
    fn test_username_falls_back_to_name_then_sub() {
        let no_preferred = Claims {
            preferred_username: None,
            ..claims()
        };
        assert_eq!(no_preferred.username(), "Alice Doe");

        let only_sub = Claims {
            preferred_username: None,
            name: None,
            ..claims()
        };
        assert_eq!(only_sub.username(), "user-123");
    }
}
