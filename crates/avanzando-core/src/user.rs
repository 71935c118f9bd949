//! User accounts and roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

string_enum! {
    /// Role attached to every account; drives the access gates.
    pub enum Role: "rol" {
        Administrator => "administrador",
        ProjectManager => "pm",
        Client => "cliente",
        Resource => "recurso",
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Resource
    }
}

impl Role {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Administrator)
    }

    /// `administrador` or `pm`.
    #[must_use]
    pub fn is_pm_or_above(&self) -> bool {
        matches!(self, Role::Administrator | Role::ProjectManager)
    }
}

/// A stored account. The password hash never leaves the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(rename = "rol")]
    pub role: Role,
    pub cliente_id: Option<i64>,
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub cliente_id: Option<i64>,
}

/// Partial update applied by administrators. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "rol")]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "crate::patch::nullable")]
    pub cliente_id: Option<Option<i64>>,
    #[serde(rename = "activo")]
    pub active: Option<bool>,
}

impl UserChanges {
    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(cliente_id) = self.cliente_id {
            user.cliente_id = cliente_id;
        }
        if let Some(active) = self.active {
            user.active = active;
        }
    }
}

/// Email given to accounts created without one: `Ana Pérez` becomes
/// `ana.pérez@cliente.com`.
#[must_use]
pub fn default_email_for(name: &str) -> String {
    format!("{}@cliente.com", name.to_lowercase().replace(' ', "."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_gates() {
        assert!(Role::Administrator.is_admin());
        assert!(Role::Administrator.is_pm_or_above());
        assert!(Role::ProjectManager.is_pm_or_above());
        assert!(!Role::ProjectManager.is_admin());
        assert!(!Role::Client.is_pm_or_above());
        assert!(!Role::Resource.is_pm_or_above());
        assert_eq!(Role::default(), Role::Resource);
    }

    #[test]
    fn role_parses_wire_names() {
        assert_eq!("pm".parse::<Role>().unwrap(), Role::ProjectManager);
        assert_eq!(Role::Client.to_string(), "cliente");
        let err = "superuser".parse::<Role>().unwrap_err();
        assert!(err.to_string().contains("superuser"));
    }

    #[test]
    fn default_email_lowercases_and_dots_spaces() {
        assert_eq!(default_email_for("Juan Carlos Ruiz"), "juan.carlos.ruiz@cliente.com");
    }

    #[test]
    fn changes_distinguish_null_from_absent() {
        let now = Utc::now();
        let mut user = User {
            id: 1,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            role: Role::Client,
            cliente_id: Some(4),
            active: true,
            created_at: now,
            updated_at: now,
        };
        let keep: UserChanges = serde_json::from_str(r#"{"nombre": "Ana María"}"#).unwrap();
        keep.apply(&mut user);
        assert_eq!(user.name, "Ana María");
        assert_eq!(user.cliente_id, Some(4));

        let clear: UserChanges = serde_json::from_str(r#"{"cliente_id": null, "rol": "pm"}"#).unwrap();
        clear.apply(&mut user);
        assert_eq!(user.cliente_id, None);
        assert_eq!(user.role, Role::ProjectManager);
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: 7,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::ProjectManager,
            cliente_id: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["rol"], "pm");
        assert_eq!(json["nombre"], "Ana");
        assert_eq!(json["activo"], true);
    }
}
