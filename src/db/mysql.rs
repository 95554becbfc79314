use anyhow::{Context, Result};
use mysql::prelude::Queryable;
use mysql::TxOpts;
use std::collections::HashMap;

use crate::connection::Connection;
use crate::db::{InsertSummary, OnError, Store, INSERT_ESTABLISHMENT_COLUMNS};
use crate::logger::{debug, trace};
use crate::lookup::LookupKind;
use crate::record::EstablishmentRecord;

const DEFAULT_PORT: u64 = 3306;
const ROW_SAVEPOINT: &str = "establecimiento_row";

/// Rows with a NULL `nombre` can never match a name and are dropped.
fn named_ids(rows: Vec<(Option<String>, i64)>) -> HashMap<String, i64> {
    rows.into_iter()
        .filter_map(|(name, id)| name.map(|name| (name, id)))
        .collect()
}

pub struct Mysql {
    conn: mysql::Conn,
}

impl Mysql {
    pub fn database_url(conn: &Connection) -> Result<String> {
        let user = conn
            .user
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("type mysql needs the user field"))?;
        let host = conn
            .host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("type mysql needs the host field"))?;
        let database = conn
            .database
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("type mysql needs the database field"))?;
        let port = conn.port.unwrap_or(DEFAULT_PORT);
        let password = conn
            .password
            .as_ref()
            .map_or(String::new(), |p| p.to_string());

        Ok(format!(
            "mysql://{user}:{password}@{host}:{port}/{database}",
            user = user,
            password = password,
            host = host,
            port = port,
            database = database
        ))
    }

    pub fn connect(conn: &Connection) -> Result<Self> {
        debug("mysql: connecting");
        let url = Mysql::database_url(conn)?;
        let opts = mysql::Opts::from_url(&url)
            .with_context(|| format!("invalid mysql url for {}", conn.label()))?;
        let conn = mysql::Conn::new(opts)
            .with_context(|| format!("failed to connect to {}", conn.label()))?;
        debug("mysql: connected");
        Ok(Self { conn })
    }
}

impl Store for Mysql {
    fn lookup_ids(&mut self, kind: LookupKind) -> Result<HashMap<String, i64>> {
        let rows: Vec<(Option<String>, i64)> = self
            .conn
            .query(format!("SELECT nombre, id FROM {}", kind.table()))
            .with_context(|| format!("failed to read {}", kind.table()))?;
        Ok(named_ids(rows))
    }

    fn find_id(&mut self, kind: LookupKind, name: &str) -> Result<Option<i64>> {
        trace(&format!("mysql: {} lookup {:?}", kind.table(), name));
        let id = self
            .conn
            .exec_first::<i64, _, _>(
                format!("SELECT id FROM {} WHERE nombre = ? LIMIT 1", kind.table()),
                (name,),
            )
            .with_context(|| format!("failed to look up {:?} in {}", name, kind.table()))?;
        Ok(id)
    }

    fn bulk_load(&mut self, kind: LookupKind, names: &[String]) -> Result<u64> {
        let mut tx = self.conn.start_transaction(TxOpts::default())?;
        tx.exec_batch(
            format!("INSERT INTO {} (nombre) VALUES (?)", kind.table()),
            names.iter().map(|n| (n.as_str(),)),
        )
        .with_context(|| format!("failed to load {}", kind.table()))?;
        tx.commit()?;
        Ok(names.len() as u64)
    }

    fn insert_establishments(
        &mut self,
        records: &[EstablishmentRecord],
        on_error: OnError,
    ) -> Result<InsertSummary> {
        let sql = format!(
            "INSERT INTO establecimiento ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            INSERT_ESTABLISHMENT_COLUMNS
        );

        let mut tx = self.conn.start_transaction(TxOpts::default())?;
        let stmt = tx.prep(&sql)?;
        let mut summary = InsertSummary::default();

        for r in records {
            let params = (
                r.nro_registro,
                r.id_categoria,
                r.nombre.as_str(),
                r.n_habitaciones,
                r.n_plazas,
                r.domicilio.as_str(),
                r.id_barrio,
                r.telefono.as_str(),
                r.mail.as_str(),
                r.longitud,
                r.latitud,
            );
            match on_error {
                OnError::Abort => {
                    tx.exec_drop(&stmt, params).with_context(|| {
                        format!("failed to insert establishment {}", r.nro_registro)
                    })?;
                    summary.inserted += 1;
                }
                OnError::Skip => {
                    tx.query_drop(format!("SAVEPOINT {}", ROW_SAVEPOINT))?;
                    let result = tx
                        .exec_drop(&stmt, params)
                        .map_err(anyhow::Error::from);
                    if result.is_ok() {
                        tx.query_drop(format!("RELEASE SAVEPOINT {}", ROW_SAVEPOINT))?;
                    } else {
                        tx.query_drop(format!("ROLLBACK TO SAVEPOINT {}", ROW_SAVEPOINT))?;
                    }
                    summary.record(r.nro_registro, result);
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    }
}
