mod mysql;
mod postgres;
mod sqlite;

use crate::{connection::Connection, lookup::LookupKind, record::EstablishmentRecord};
use anyhow::Result;
use clap::ValueEnum;
use serde::Deserialize;
use std::collections::HashMap;

pub use self::mysql::Mysql;
pub use self::postgres::Postgres;
pub use self::sqlite::Sqlite;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseType {
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "postgres")]
    Postgres,
    #[serde(rename = "sqlite")]
    Sqlite,
}

impl DatabaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseType::MySql => "mysql",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Sqlite => "sqlite",
        }
    }
}

/// What happens to the batch when one establishment insert fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    /// Roll back the whole batch; nothing is committed.
    #[default]
    Abort,
    /// Roll back only the failing row and keep going.
    Skip,
}

pub const INSERT_ESTABLISHMENT_COLUMNS: &str = "nro_registro, id_categoria, nombre, n_habitaciones, n_plazas, \
     domicilio, id_barrio, telefono, mail, longitud, latitud";

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub nro_registro: i64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertSummary {
    pub inserted: usize,
    pub skipped: Vec<SkippedRow>,
}

impl InsertSummary {
    fn record(&mut self, nro_registro: i64, result: Result<()>) {
        match result {
            Ok(()) => self.inserted += 1,
            Err(e) => self.skipped.push(SkippedRow {
                nro_registro,
                reason: format!("{:#}", e),
            }),
        }
    }
}

/// A relational store holding `categoria`, `barrio` and `establecimiento`.
///
/// One value wraps one open connection; every method reuses it.
pub trait Store {
    /// `nombre -> id` for every row of the lookup table.
    fn lookup_ids(&mut self, kind: LookupKind) -> Result<HashMap<String, i64>>;

    /// Id of the row whose `nombre` equals `name` exactly.
    fn find_id(&mut self, kind: LookupKind, name: &str) -> Result<Option<i64>>;

    /// Insert every name into the lookup table in one transaction.
    fn bulk_load(&mut self, kind: LookupKind, names: &[String]) -> Result<u64>;

    /// Insert all records in one transaction committed once at the end.
    fn insert_establishments(
        &mut self,
        records: &[EstablishmentRecord],
        on_error: OnError,
    ) -> Result<InsertSummary>;
}

pub struct DB;

impl DB {
    pub fn connect(conn: &Connection) -> Result<Box<dyn Store>> {
        match conn.r#type {
            DatabaseType::MySql => Ok(Box::new(Mysql::connect(conn)?)),
            DatabaseType::Postgres => Ok(Box::new(Postgres::connect(conn)?)),
            DatabaseType::Sqlite => Ok(Box::new(Sqlite::connect(conn)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_ok_and_failed_rows() {
        let mut summary = InsertSummary::default();
        summary.record(1, Ok(()));
        summary.record(2, Err(anyhow::anyhow!("duplicate key")));
        summary.record(3, Ok(()));

        assert_eq!(summary.inserted, 2);
        assert_eq!(
            summary.skipped,
            vec![SkippedRow {
                nro_registro: 2,
                reason: "duplicate key".to_string()
            }]
        );
    }

    #[test]
    fn on_error_reads_from_yaml() {
        let v: OnError = serde_yaml::from_str("skip").unwrap();
        assert_eq!(v, OnError::Skip);
        assert_eq!(OnError::default(), OnError::Abort);
    }
}
