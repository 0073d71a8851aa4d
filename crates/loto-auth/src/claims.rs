//! Token claims and capability checks.

use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Administrative capabilities asserted by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Open/close rounds and publish their results.
    ManageRounds,
    WriteResults,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageRounds => "manage:rounds",
            Capability::WriteResults => "write:results",
        }
    }
}

/// A claim the provider may send either as one string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: OneOrMany,
    #[serde(default)]
    pub exp: Option<u64>,
    /// OAuth scopes; a string is space-separated.
    #[serde(default)]
    pub scope: OneOrMany,
    /// RBAC permissions.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Claims {
    /// Scopes and permissions merged.
    pub fn capabilities(&self) -> Vec<&str> {
        let mut out: Vec<&str> = match &self.scope {
            OneOrMany::One(s) => s.split_whitespace().collect(),
            OneOrMany::Many(v) => v.iter().map(String::as_str).collect(),
        };
        out.extend(self.permissions.iter().map(String::as_str));
        out
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities().contains(&cap.as_str())
    }

    pub fn require(&self, cap: Capability) -> Result<(), AuthError> {
        if self.has(cap) {
            Ok(())
        } else {
            Err(AuthError::InsufficientScope {
                required: cap.as_str(),
            })
        }
    }

    /// Audiences with trailing slashes stripped.
    pub fn audiences(&self) -> Vec<String> {
        let raw: Vec<&String> = match &self.aud {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v.iter().collect(),
        };
        raw.into_iter()
            .map(|a| a.trim_end_matches('/').to_string())
            .collect()
    }

    pub fn audience_matches(&self, expected: &str) -> bool {
        let expected = expected.trim_end_matches('/');
        self.audiences().iter().any(|a| a == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn space_separated_scope_and_permissions_both_count() {
        let c: Claims = serde_json::from_value(json!({
            "sub": "auth0|admin",
            "scope": "openid profile manage:rounds",
            "permissions": ["write:results"]
        }))
        .unwrap();
        assert!(c.has(Capability::ManageRounds));
        assert!(c.has(Capability::WriteResults));
        assert!(c.require(Capability::ManageRounds).is_ok());
    }

    #[test]
    fn list_scope_is_accepted() {
        let c: Claims = serde_json::from_value(json!({ "scope": ["manage:rounds"] })).unwrap();
        assert!(c.has(Capability::ManageRounds));
        assert!(!c.has(Capability::WriteResults));
    }

    #[test]
    fn missing_capability_is_insufficient_scope() {
        let c: Claims = serde_json::from_value(json!({ "sub": "auth0|bettor" })).unwrap();
        let err = c.require(Capability::ManageRounds).unwrap_err();
        assert!(matches!(
            err,
            AuthError::InsufficientScope {
                required: "manage:rounds"
            }
        ));
    }

    #[test]
    fn audience_comparison_ignores_trailing_slash() {
        let c: Claims =
            serde_json::from_value(json!({ "aud": ["https://loto-api/", "https://x/userinfo"] }))
                .unwrap();
        assert!(c.audience_matches("https://loto-api"));
        assert!(c.audience_matches("https://loto-api/"));
        assert!(!c.audience_matches("https://other-api"));

        let single: Claims = serde_json::from_value(json!({ "aud": "https://loto-api" })).unwrap();
        assert!(single.audience_matches("https://loto-api/"));
    }
}
