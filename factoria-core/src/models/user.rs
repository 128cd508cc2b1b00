use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Role claim values that can be assigned through the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(rename = "proveedor")]
    Supplier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Supplier => "proveedor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "proveedor" => Ok(Role::Supplier),
            other => Err(format!("role must be 'admin' or 'proveedor', got '{}'", other)),
        }
    }
}

/// An identity known to the identity provider.
///
/// Maps to the `users` table, which mirrors the provider's user list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Role assignment request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRoleRequest {
    pub uid: Option<String>,
    pub role: Option<String>,
}
