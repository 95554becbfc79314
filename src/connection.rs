use serde::Deserialize;

use crate::db::DatabaseType;

pub const DEFAULT_DATABASE: &str = "alojamientos";
pub const DEFAULT_USER: &str = "postgres";

/// Where the lookup and establishment tables live.
///
/// Only the fields relevant to `type` are read: postgres and mysql use
/// user/host/port/password/database, sqlite uses `path`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Connection {
    pub r#type: DatabaseType,
    pub name: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u64>,
    pub path: Option<std::path::PathBuf>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            r#type: DatabaseType::Postgres,
            name: None,
            user: Some(DEFAULT_USER.to_string()),
            host: None,
            port: None,
            path: None,
            password: None,
            database: Some(DEFAULT_DATABASE.to_string()),
        }
    }
}

impl Connection {
    /// Short human label for logs and status lines; never includes the password.
    pub fn label(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        match self.r#type {
            DatabaseType::Sqlite => format!(
                "sqlite:{}",
                self.path
                    .as_ref()
                    .map_or("?".to_string(), |p| p.display().to_string())
            ),
            DatabaseType::Postgres | DatabaseType::MySql => format!(
                "{}:{}@{}/{}",
                self.r#type.as_str(),
                self.user.as_deref().unwrap_or("?"),
                self.host.as_deref().unwrap_or("localhost"),
                self.database.as_deref().unwrap_or("?"),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_local_postgres_database() {
        let conn = Connection::default();
        assert_eq!(conn.r#type, DatabaseType::Postgres);
        assert_eq!(conn.user.as_deref(), Some("postgres"));
        assert_eq!(conn.database.as_deref(), Some("alojamientos"));
        assert_eq!(conn.password, None);
    }

    #[test]
    fn label_hides_password() {
        let conn = Connection {
            password: Some("secret".to_string()),
            host: Some("db.local".to_string()),
            ..Connection::default()
        };
        let label = conn.label();
        assert_eq!(label, "postgres:postgres@db.local/alojamientos");
        assert!(!label.contains("secret"));
    }
}
