use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Client,
}

/// Caller identity as handed over by the auth collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub role: Role,
    pub client_id: Option<String>,
}

impl Identity {
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            client_id: None,
        }
    }
    pub fn user() -> Self {
        Self {
            role: Role::User,
            client_id: None,
        }
    }
    pub fn client(client_id: impl Into<String>) -> Self {
        Self {
            role: Role::Client,
            client_id: Some(client_id.into()),
        }
    }

    /// admin satisfies user; client is a separate capability
    pub fn has_role(&self, required: Role) -> bool {
        match required {
            Role::Admin => self.role == Role::Admin,
            Role::User => matches!(self.role, Role::Admin | Role::User),
            Role::Client => self.role == Role::Client,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.has_role(Role::User)
    }

    pub fn is_client_of(&self, client_id: Option<&str>) -> bool {
        match (self.role, self.client_id.as_deref(), client_id) {
            (Role::Client, Some(own), Some(other)) => own == other,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_has_role() {
        assert!(Identity::admin().has_role(Role::Admin));
        assert!(Identity::admin().has_role(Role::User));
        assert!(!Identity::admin().has_role(Role::Client));
        assert!(!Identity::user().has_role(Role::Admin));
        assert!(Identity::user().has_role(Role::User));
        assert!(!Identity::client("acme").has_role(Role::User));
        assert!(Identity::client("acme").has_role(Role::Client));
    }

    #[test]
    fn test_is_client_of() {
        let c = Identity::client("acme");
        assert!(c.is_client_of(Some("acme")));
        assert!(!c.is_client_of(Some("other")));
        assert!(!c.is_client_of(None));
        // internal users are never "the client", even with a client id attached
        let u = Identity {
            role: Role::User,
            client_id: Some("acme".to_string()),
        };
        assert!(!u.is_client_of(Some("acme")));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::Client.to_string(), "client");
        let id: Identity = serde_json::from_str(r#"{"role":"client","clientId":"c1"}"#).unwrap();
        assert_eq!(id, Identity::client("c1"));
    }
}
