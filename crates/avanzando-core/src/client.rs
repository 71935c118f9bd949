//! Client organisations (tenants).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    pub sector: Option<String>,
    pub logo: Option<String>,
    #[serde(rename = "activo")]
    pub active: bool,
    #[serde(rename = "fecha_creacion")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "fecha_actualizacion")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClient {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientChanges {
    #[serde(rename = "nombre")]
    pub name: Option<String>,
    pub sector: Option<String>,
    pub logo: Option<String>,
    #[serde(rename = "activo")]
    pub active: Option<bool>,
}

impl ClientChanges {
    pub fn apply(self, client: &mut Client) {
        if let Some(name) = self.name {
            client.name = name;
        }
        if let Some(sector) = self.sector {
            client.sector = Some(sector);
        }
        if let Some(logo) = self.logo {
            client.logo = Some(logo);
        }
        if let Some(active) = self.active {
            client.active = active;
        }
    }
}
