use serde::{Deserialize, Serialize};

/// Role names the server assigns to accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Medical representative, the field role.
    Mr,
    Manager,
    Admin,
    Other(String),
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "mr" => Role::Mr,
            "manager" => Role::Manager,
            "admin" => Role::Admin,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Role::Mr => "Medical Representative",
            Role::Manager => "Manager",
            Role::Admin => "Administrator",
            Role::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

impl User {
    pub fn role(&self) -> Role {
        Role::parse(self.role.as_deref().unwrap_or_default())
    }

    /// "First Last", falling back to the email when no name is set.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    pub fn is_mr(&self) -> bool {
        self.role() == Role::Mr
    }

    pub fn is_manager(&self) -> bool {
        self.role() == Role::Manager
    }

    /// Staff, superuser, or the admin role.
    pub fn is_admin(&self) -> bool {
        self.is_staff || self.is_superuser || self.role() == Role::Admin
    }
}
