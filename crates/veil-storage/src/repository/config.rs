//! Configuration repository.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::ConfigEntry;

/// Repository for key-value configuration.
pub struct ConfigRepo;

impl ConfigRepo {
    /// Get a configuration value.
    pub fn get(conn: &Connection, key: &str) -> Result<Option<ConfigEntry>> {
        let mut stmt = conn.prepare("SELECT key, value FROM config WHERE key = ?1")?;

        let entry = stmt
            .query_row([key], |row| {
                let value_str: String = row.get(1)?;
                Ok(ConfigEntry {
                    key: row.get(0)?,
                    value: serde_json::from_str(&value_str).unwrap_or(serde_json::Value::Null),
                })
            })
            .optional()?;

        Ok(entry)
    }

    /// Set a configuration value (insert or update).
    pub fn set(conn: &Connection, key: &str, value: &serde_json::Value) -> Result<()> {
        let value_json = serde_json::to_string(value)?;

        conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value_json],
        )?;

        Ok(())
    }

    /// Delete a configuration value.
    pub fn delete(conn: &Connection, key: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM config WHERE key = ?1", [key])?;
        Ok(deleted > 0)
    }

    /// Get all configuration values.
    pub fn get_all(conn: &Connection) -> Result<Vec<ConfigEntry>> {
        let mut stmt = conn.prepare("SELECT key, value FROM config ORDER BY key")?;

        let entries = stmt
            .query_map([], |row| {
                let value_str: String = row.get(1)?;
                Ok(ConfigEntry {
                    key: row.get(0)?,
                    value: serde_json::from_str(&value_str).unwrap_or(serde_json::Value::Null),
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;
    use serde_json::json;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn set_and_get() {
        let conn = setup_db();

        ConfigRepo::set(&conn, "filterConfig", &json!({"textFilter": {"isEnabled": true}}))
            .unwrap();
        let entry = ConfigRepo::get(&conn, "filterConfig").unwrap().unwrap();

        assert_eq!(entry.key, "filterConfig");
        assert_eq!(entry.value["textFilter"]["isEnabled"], true);
    }

    #[test]
    fn update_existing() {
        let conn = setup_db();

        ConfigRepo::set(&conn, "key", &json!(1)).unwrap();
        ConfigRepo::set(&conn, "key", &json!(2)).unwrap();

        let entry = ConfigRepo::get(&conn, "key").unwrap().unwrap();
        assert_eq!(entry.value, json!(2));
    }

    #[test]
    fn get_nonexistent() {
        let conn = setup_db();
        assert!(ConfigRepo::get(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn delete_removes() {
        let conn = setup_db();

        ConfigRepo::set(&conn, "gone", &json!("value")).unwrap();
        assert!(ConfigRepo::delete(&conn, "gone").unwrap());
        assert!(!ConfigRepo::delete(&conn, "gone").unwrap());
        assert!(ConfigRepo::get(&conn, "gone").unwrap().is_none());
    }

    #[test]
    fn get_all_is_ordered() {
        let conn = setup_db();

        ConfigRepo::set(&conn, "b", &json!(2)).unwrap();
        ConfigRepo::set(&conn, "a", &json!(1)).unwrap();

        let entries = ConfigRepo::get_all(&conn).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "a");
    }
}
