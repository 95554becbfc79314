use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, OpenFlags, OptionalExtension};

use crate::connection::Connection;
use crate::db::{InsertSummary, OnError, Store, INSERT_ESTABLISHMENT_COLUMNS};
use crate::logger::{debug, trace};
use crate::lookup::LookupKind;
use crate::record::EstablishmentRecord;

pub struct Sqlite {
    conn: rusqlite::Connection,
}

fn insert_sql() -> String {
    format!(
        "INSERT INTO establecimiento ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        INSERT_ESTABLISHMENT_COLUMNS
    )
}

fn insert_one(conn: &rusqlite::Connection, r: &EstablishmentRecord) -> Result<()> {
    conn.prepare_cached(&insert_sql())?.execute(params![
        r.nro_registro,
        r.id_categoria,
        r.nombre,
        r.n_habitaciones,
        r.n_plazas,
        r.domicilio,
        r.id_barrio,
        r.telefono,
        r.mail,
        r.longitud,
        r.latitud,
    ])?;
    Ok(())
}

impl Sqlite {
    pub fn database_path(conn: &Connection) -> Result<PathBuf> {
        conn.path.as_ref().map_or(
            Err(anyhow::anyhow!("type sqlite needs the path field")),
            |path| expand_path(path).ok_or_else(|| anyhow::anyhow!("cannot expand file path")),
        )
    }

    pub fn connect(conn: &Connection) -> Result<Self> {
        let path = Sqlite::database_path(conn)?;
        Sqlite::open(&path)
    }

    /// Open an existing database file; the tables must already exist.
    pub fn open(path: &Path) -> Result<Self> {
        debug(&format!("sqlite: opening {}", path.display()));
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("failed to open sqlite database {}", path.display()))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        debug("sqlite: opened");
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory_with_schema() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(tests::SCHEMA)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn establishments(&self) -> Result<Vec<EstablishmentRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM establecimiento ORDER BY nro_registro",
            INSERT_ESTABLISHMENT_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EstablishmentRecord {
                    nro_registro: row.get(0)?,
                    id_categoria: row.get(1)?,
                    nombre: row.get(2)?,
                    n_habitaciones: row.get(3)?,
                    n_plazas: row.get(4)?,
                    domicilio: row.get(5)?,
                    id_barrio: row.get(6)?,
                    telefono: row.get(7)?,
                    mail: row.get(8)?,
                    longitud: row.get(9)?,
                    latitud: row.get(10)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

impl Store for Sqlite {
    fn lookup_ids(&mut self, kind: LookupKind) -> Result<HashMap<String, i64>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT nombre, id FROM {}", kind.table()))
            .with_context(|| format!("failed to read {}", kind.table()))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut ids = HashMap::new();
        for r in rows {
            if let (Some(name), id) = r? {
                ids.insert(name, id);
            }
        }
        Ok(ids)
    }

    fn find_id(&mut self, kind: LookupKind, name: &str) -> Result<Option<i64>> {
        trace(&format!("sqlite: {} lookup {:?}", kind.table(), name));
        let id = self
            .conn
            .query_row(
                &format!("SELECT id FROM {} WHERE nombre = ?1 LIMIT 1", kind.table()),
                params![name],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .with_context(|| format!("failed to look up {:?} in {}", name, kind.table()))?;
        Ok(id)
    }

    fn bulk_load(&mut self, kind: LookupKind, names: &[String]) -> Result<u64> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt =
                tx.prepare(&format!("INSERT INTO {} (nombre) VALUES (?1)", kind.table()))?;
            for name in names {
                stmt.execute(params![name])
                    .with_context(|| format!("failed to load {:?} into {}", name, kind.table()))?;
            }
        }
        tx.commit()?;
        Ok(names.len() as u64)
    }

    fn insert_establishments(
        &mut self,
        records: &[EstablishmentRecord],
        on_error: OnError,
    ) -> Result<InsertSummary> {
        let mut tx = self.conn.transaction()?;
        let mut summary = InsertSummary::default();

        for r in records {
            match on_error {
                OnError::Abort => {
                    insert_one(&tx, r).with_context(|| {
                        format!("failed to insert establishment {}", r.nro_registro)
                    })?;
                    summary.inserted += 1;
                }
                OnError::Skip => {
                    // an uncommitted savepoint rolls back when dropped
                    let savepoint = tx.savepoint()?;
                    let result = insert_one(&savepoint, r);
                    if result.is_ok() {
                        savepoint.commit()?;
                    }
                    summary.record(r.nro_registro, result);
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    }
}

fn expand_path(path: &Path) -> Option<PathBuf> {
    let mut expanded_path = PathBuf::new();
    let mut path_iter = path.iter();
    if path.starts_with("~") {
        path_iter.next()?;
        expanded_path = expanded_path.join(dirs_next::home_dir()?);
    }
    for path in path_iter {
        let path = path.to_str()?;
        expanded_path = if cfg!(unix) && path.starts_with('$') {
            expanded_path.join(std::env::var(path.strip_prefix('$')?).unwrap_or_default())
        } else if cfg!(windows) && path.starts_with('%') && path.ends_with('%') {
            expanded_path
                .join(std::env::var(path.strip_prefix('%')?.strip_suffix('%')?).unwrap_or_default())
        } else {
            expanded_path.join(path)
        }
    }
    Some(expanded_path)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{DatabaseType, SkippedRow};

    /// SQLite DDL for the three tables, shared with the `seed_sqlite` binary.
    pub const SCHEMA: &str = include_str!("schema.sql");

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn record(nro: i64, id_categoria: Option<i64>) -> EstablishmentRecord {
        EstablishmentRecord {
            nro_registro: nro,
            id_categoria,
            nombre: format!("Est {}", nro),
            n_habitaciones: Some(3),
            n_plazas: None,
            domicilio: "Calle".to_string(),
            id_barrio: None,
            telefono: String::new(),
            mail: String::new(),
            longitud: Some(-58.4),
            latitud: None,
        }
    }

    #[test]
    fn bulk_load_then_lookup() {
        let mut db = Sqlite::open_in_memory_with_schema().unwrap();
        assert_eq!(
            db.bulk_load(LookupKind::Category, &names(&["Hotel", "Hostel"]))
                .unwrap(),
            2
        );

        let ids = db.lookup_ids(LookupKind::Category).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(db.find_id(LookupKind::Category, "Hostel").unwrap(), ids.get("Hostel").copied());
        assert_eq!(db.find_id(LookupKind::Category, "hostel").unwrap(), None);
        assert!(db.lookup_ids(LookupKind::Neighborhood).unwrap().is_empty());
    }

    #[test]
    fn bulk_load_is_all_or_nothing() {
        let mut db = Sqlite::open_in_memory_with_schema().unwrap();
        assert!(db
            .bulk_load(LookupKind::Neighborhood, &names(&["Centro", "Centro"]))
            .is_err());
        assert!(db.lookup_ids(LookupKind::Neighborhood).unwrap().is_empty());
    }

    #[test]
    fn abort_policy_rolls_back_whole_batch() {
        let mut db = Sqlite::open_in_memory_with_schema().unwrap();
        let records = vec![record(1, None), record(2, None), record(1, None)];

        let err = db
            .insert_establishments(&records, OnError::Abort)
            .unwrap_err();
        assert!(err.to_string().contains("establishment 1"));
        assert!(db.establishments().unwrap().is_empty());
    }

    #[test]
    fn skip_policy_keeps_good_rows() {
        let mut db = Sqlite::open_in_memory_with_schema().unwrap();
        // id_categoria 99 violates the foreign key
        let records = vec![record(1, None), record(2, Some(99)), record(3, None)];

        let summary = db.insert_establishments(&records, OnError::Skip).unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert!(matches!(
            summary.skipped[0],
            SkippedRow { nro_registro: 2, .. }
        ));

        let stored = db.establishments().unwrap();
        assert_eq!(
            stored.iter().map(|r| r.nro_registro).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(stored[0], records[0]);
    }

    #[test]
    fn open_refuses_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Sqlite::open(&dir.path().join("missing.db")).is_err());
    }

    #[test]
    fn database_path_requires_path() {
        let conn = Connection {
            r#type: DatabaseType::Sqlite,
            ..Connection::default()
        };
        assert!(Sqlite::database_path(&conn).is_err());

        let conn = Connection {
            path: Some(PathBuf::from("dev/sqlite/alojamientos.db")),
            ..conn
        };
        assert_eq!(
            Sqlite::database_path(&conn).unwrap(),
            PathBuf::from("dev/sqlite/alojamientos.db")
        );
    }
}
