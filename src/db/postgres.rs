use anyhow::{Context, Result};
use postgres::types::ToSql;
use std::collections::HashMap;
use std::io::Write;

use crate::connection::Connection;
use crate::db::{InsertSummary, OnError, Store, INSERT_ESTABLISHMENT_COLUMNS};
use crate::logger::{debug, trace};
use crate::lookup::LookupKind;
use crate::record::EstablishmentRecord;

pub struct Postgres {
    client: postgres::Client,
}

/// Quote a libpq `key=value` parameter when it needs it.
fn quote_param(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Escape one value for COPY text format.
fn copy_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

impl Postgres {
    /// libpq-style connection string. Keys that are not configured are left
    /// to the driver defaults, so `dbname=alojamientos user=postgres` relies on
    /// local trust authentication like a bare `psql` would.
    pub fn connection_string(conn: &Connection) -> Result<String> {
        let user = conn
            .user
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("type postgres needs the user field"))?;
        let database = conn
            .database
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("type postgres needs the database field"))?;

        let mut params = vec![
            format!("dbname={}", quote_param(database)),
            format!("user={}", quote_param(user)),
        ];
        if let Some(host) = &conn.host {
            params.push(format!("host={}", quote_param(host)));
        }
        if let Some(port) = conn.port {
            params.push(format!("port={}", port));
        }
        if let Some(password) = &conn.password {
            params.push(format!("password={}", quote_param(password)));
        }
        Ok(params.join(" "))
    }

    pub fn connect(conn: &Connection) -> Result<Self> {
        debug("postgres: connecting");
        let params = Postgres::connection_string(conn)?;
        let client = postgres::Client::connect(&params, postgres::NoTls)
            .with_context(|| format!("failed to connect to {}", conn.label()))?;
        debug("postgres: connected");
        Ok(Self { client })
    }
}

impl Store for Postgres {
    fn lookup_ids(&mut self, kind: LookupKind) -> Result<HashMap<String, i64>> {
        let rows = self
            .client
            .query(
                format!("SELECT nombre, id::bigint FROM {}", kind.table()).as_str(),
                &[],
            )
            .with_context(|| format!("failed to read {}", kind.table()))?;

        let mut ids = HashMap::with_capacity(rows.len());
        for row in rows {
            let name: Option<String> = row.get(0);
            if let Some(name) = name {
                ids.insert(name, row.get::<_, i64>(1));
            }
        }
        Ok(ids)
    }

    fn find_id(&mut self, kind: LookupKind, name: &str) -> Result<Option<i64>> {
        trace(&format!("postgres: {} lookup {:?}", kind.table(), name));
        let row = self
            .client
            .query_opt(
                format!(
                    "SELECT id::bigint FROM {} WHERE nombre = $1 LIMIT 1",
                    kind.table()
                )
                .as_str(),
                &[&name],
            )
            .with_context(|| format!("failed to look up {:?} in {}", name, kind.table()))?;
        Ok(row.map(|r| r.get::<_, i64>(0)))
    }

    fn bulk_load(&mut self, kind: LookupKind, names: &[String]) -> Result<u64> {
        let mut tx = self.client.transaction()?;
        let query = format!("COPY {}(nombre) FROM STDIN", kind.table());
        let mut writer = tx
            .copy_in(query.as_str())
            .with_context(|| format!("failed to start COPY into {}", kind.table()))?;
        for name in names {
            writer.write_all(copy_text(name).as_bytes())?;
            writer.write_all(b"\n")?;
        }
        let copied = writer
            .finish()
            .with_context(|| format!("COPY into {} failed", kind.table()))?;
        tx.commit()?;
        Ok(copied)
    }

    fn insert_establishments(
        &mut self,
        records: &[EstablishmentRecord],
        on_error: OnError,
    ) -> Result<InsertSummary> {
        let sql = format!(
            "INSERT INTO establecimiento ({}) VALUES \
             ($1::bigint, $2::bigint, $3::text, $4::bigint, $5::bigint, $6::text, \
             $7::bigint, $8::text, $9::text, $10::float8, $11::float8)",
            INSERT_ESTABLISHMENT_COLUMNS
        );

        let mut tx = self.client.transaction()?;
        let stmt = tx.prepare(&sql)?;
        let mut summary = InsertSummary::default();

        for r in records {
            let params: [&(dyn ToSql + Sync); 11] = [
                &r.nro_registro,
                &r.id_categoria,
                &r.nombre,
                &r.n_habitaciones,
                &r.n_plazas,
                &r.domicilio,
                &r.id_barrio,
                &r.telefono,
                &r.mail,
                &r.longitud,
                &r.latitud,
            ];
            match on_error {
                OnError::Abort => {
                    tx.execute(&stmt, &params).with_context(|| {
                        format!("failed to insert establishment {}", r.nro_registro)
                    })?;
                    summary.inserted += 1;
                }
                OnError::Skip => {
                    let mut savepoint = tx.transaction()?;
                    let result = savepoint
                        .execute(&stmt, &params)
                        .map(|_| ())
                        .map_err(anyhow::Error::from);
                    if result.is_ok() {
                        savepoint.commit()?;
                    } else {
                        savepoint.rollback()?;
                    }
                    summary.record(r.nro_registro, result);
                }
            }
        }

        tx.commit()?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_connection_string_matches_local_trust_setup() {
        let conn = Connection::default();
        assert_eq!(
            Postgres::connection_string(&conn).unwrap(),
            "dbname=alojamientos user=postgres"
        );
    }

    #[test]
    fn connection_string_includes_configured_keys() {
        let conn = Connection {
            host: Some("db.local".to_string()),
            port: Some(5433),
            password: Some("it's secret".to_string()),
            ..Connection::default()
        };
        assert_eq!(
            Postgres::connection_string(&conn).unwrap(),
            "dbname=alojamientos user=postgres host=db.local port=5433 password='it\\'s secret'"
        );
    }

    #[test]
    fn connection_string_requires_user() {
        let conn = Connection {
            user: None,
            ..Connection::default()
        };
        let err = Postgres::connection_string(&conn).unwrap_err();
        assert!(err.to_string().contains("needs the user field"));
    }

    #[test]
    fn copy_text_escapes_control_characters() {
        assert_eq!(copy_text("Villa Crespo"), "Villa Crespo");
        assert_eq!(copy_text("a\tb\nc\\d"), "a\\tb\\nc\\\\d");
    }

    #[test]
    fn quote_param_leaves_plain_values_alone() {
        assert_eq!(quote_param("alojamientos"), "alojamientos");
        assert_eq!(quote_param(""), "''");
        assert_eq!(quote_param("two words"), "'two words'");
    }
}
