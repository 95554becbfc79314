use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;

use crate::csv_file::read_numbered_rows;
use crate::logger::warn;

/// Column positions in `alojamientos.csv`.
pub mod column {
    pub const NRO_REGISTRO: usize = 0;
    pub const CATEGORIA: usize = 1;
    pub const NOMBRE: usize = 2;
    pub const N_HABITACIONES: usize = 3;
    pub const N_PLAZAS: usize = 4;
    pub const DOMICILIO: usize = 5;
    pub const BARRIO: usize = 6;
    pub const TELEFONO: usize = 7;
    pub const MAIL: usize = 8;
    pub const LONGITUD: usize = 9;
    pub const LATITUD: usize = 10;

    pub const COUNT: usize = 11;

    pub const NAMES: [&str; COUNT] = [
        "nro_registro",
        "categoria",
        "nombre",
        "n_habitaciones",
        "n_plazas",
        "domicilio",
        "barrio",
        "telefono",
        "mail",
        "longitud",
        "latitud",
    ];
}

/// The source file split into its header and data rows.
#[derive(Debug, Clone, Default)]
pub struct SourceTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// File line each of `rows` starts on.
    lines: Vec<usize>,
}

impl SourceTable {
    /// Read the source file and drop its first row as the header.
    pub fn read(path: &Path, delimiter: char) -> Result<SourceTable> {
        let table = SourceTable::from_numbered_rows(read_numbered_rows(path, delimiter)?);
        if table.header.len() < column::COUNT {
            warn(&format!(
                "{}: header has {} columns, expected {}",
                path.display(),
                table.header.len(),
                column::COUNT
            ));
        }
        Ok(table)
    }

    /// Rows taken as consecutive lines starting at line 1.
    #[cfg(test)]
    pub fn from_rows(rows: Vec<Vec<String>>) -> SourceTable {
        SourceTable::from_numbered_rows(rows.into_iter().enumerate().map(|(i, r)| (i + 1, r)))
    }

    pub fn from_numbered_rows<I>(rows: I) -> SourceTable
    where
        I: IntoIterator<Item = (usize, Vec<String>)>,
    {
        let mut rows = rows.into_iter();
        let header = match rows.next() {
            Some((_, header)) => header,
            None => return SourceTable::default(),
        };
        let (lines, rows) = rows.unzip();
        SourceTable {
            header,
            rows,
            lines,
        }
    }

    /// Data rows paired with their 1-based line number in the file.
    pub fn numbered_rows(&self) -> impl Iterator<Item = (usize, &Vec<String>)> {
        self.lines.iter().copied().zip(self.rows.iter())
    }

    pub fn parse_rows(&self) -> Result<Vec<SourceRow>> {
        self.numbered_rows()
            .map(|(line, fields)| SourceRow::parse(line, fields))
            .collect()
    }
}

/// One data line of the source file, numbers parsed, names still unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 1-based line in the source file, header included.
    pub line: usize,
    pub nro_registro: i64,
    pub categoria: String,
    pub nombre: String,
    pub n_habitaciones: Option<i64>,
    pub n_plazas: Option<i64>,
    pub domicilio: String,
    pub barrio: String,
    pub telefono: String,
    pub mail: String,
    pub longitud: Option<f64>,
    pub latitud: Option<f64>,
}

/// Row as written to `establecimiento`: category and neighborhood are ids.
#[derive(Debug, Clone, PartialEq)]
pub struct EstablishmentRecord {
    pub nro_registro: i64,
    pub id_categoria: Option<i64>,
    pub nombre: String,
    pub n_habitaciones: Option<i64>,
    pub n_plazas: Option<i64>,
    pub domicilio: String,
    pub id_barrio: Option<i64>,
    pub telefono: String,
    pub mail: String,
    pub longitud: Option<f64>,
    pub latitud: Option<f64>,
}

fn parse_required<T>(fields: &[String], idx: usize, line: usize) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    fields[idx]
        .trim()
        .parse::<T>()
        .with_context(|| {
            format!(
                "line {}: invalid {} {:?}",
                line,
                column::NAMES[idx],
                fields[idx]
            )
        })
}

/// Empty means absent; anything else must parse.
fn parse_optional<T>(fields: &[String], idx: usize, line: usize) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if fields[idx].is_empty() {
        return Ok(None);
    }
    parse_required(fields, idx, line).map(Some)
}

impl SourceRow {
    pub fn parse(line: usize, fields: &[String]) -> Result<SourceRow> {
        if fields.len() < column::COUNT {
            anyhow::bail!(
                "line {}: expected {} fields, found {}",
                line,
                column::COUNT,
                fields.len()
            );
        }
        Ok(SourceRow {
            line,
            nro_registro: parse_required(fields, column::NRO_REGISTRO, line)?,
            categoria: fields[column::CATEGORIA].clone(),
            nombre: fields[column::NOMBRE].clone(),
            n_habitaciones: parse_optional(fields, column::N_HABITACIONES, line)?,
            n_plazas: parse_optional(fields, column::N_PLAZAS, line)?,
            domicilio: fields[column::DOMICILIO].clone(),
            barrio: fields[column::BARRIO].clone(),
            telefono: fields[column::TELEFONO].clone(),
            mail: fields[column::MAIL].clone(),
            longitud: parse_optional(fields, column::LONGITUD, line)?,
            latitud: parse_optional(fields, column::LATITUD, line)?,
        })
    }

    pub fn into_record(
        self,
        id_categoria: Option<i64>,
        id_barrio: Option<i64>,
    ) -> EstablishmentRecord {
        EstablishmentRecord {
            nro_registro: self.nro_registro,
            id_categoria,
            nombre: self.nombre,
            n_habitaciones: self.n_habitaciones,
            n_plazas: self.n_plazas,
            domicilio: self.domicilio,
            id_barrio,
            telefono: self.telefono,
            mail: self.mail,
            longitud: self.longitud,
            latitud: self.latitud,
        }
    }
}
