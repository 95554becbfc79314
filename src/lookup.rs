use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::FilesConfig;
use crate::csv_file::{read_rows, write_rows};
use crate::logger::{debug, info};
use crate::record::{column, SourceTable};

/// The two categorical columns that become their own tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Category,
    Neighborhood,
}

impl LookupKind {
    pub const ALL: [LookupKind; 2] = [LookupKind::Category, LookupKind::Neighborhood];

    pub fn column(self) -> usize {
        match self {
            LookupKind::Category => column::CATEGORIA,
            LookupKind::Neighborhood => column::BARRIO,
        }
    }

    /// Destination table; both have `(id, nombre)`.
    pub fn table(self) -> &'static str {
        match self {
            LookupKind::Category => "categoria",
            LookupKind::Neighborhood => "barrio",
        }
    }

    pub fn file(self, files: &FilesConfig) -> &Path {
        match self {
            LookupKind::Category => &files.categories,
            LookupKind::Neighborhood => &files.neighborhoods,
        }
    }
}

/// A lookup name paired with the `nro_registro` of the row it was read from.
///
/// Only `name` feeds the generated files; `nro_registro` is carried so a
/// value can be traced back to its source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupValue {
    pub nro_registro: String,
    pub name: String,
}

/// One `(nro_registro, value)` pair per data row for the column of `kind`.
pub fn extract(table: &SourceTable, kind: LookupKind) -> Result<Vec<LookupValue>> {
    table
        .numbered_rows()
        .map(|(line, row)| -> Result<LookupValue> {
            let name = row.get(kind.column()).with_context(|| {
                format!(
                    "line {}: no {} column (found {} fields)",
                    line,
                    column::NAMES[kind.column()],
                    row.len()
                )
            })?;
            Ok(LookupValue {
                nro_registro: row[column::NRO_REGISTRO].clone(),
                name: name.clone(),
            })
        })
        .collect()
}

/// Distinct names in order of first appearance.
pub fn unique_names(values: &[LookupValue]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.name.as_str()))
        .map(|v| v.name.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub kind: LookupKind,
    pub path: PathBuf,
    pub count: usize,
}

/// Write `categories.csv` and `neighborhoods.csv` from the source file.
///
/// The source is read before anything is written, so a missing source
/// leaves existing output files untouched.
pub fn generate_lookup_files(files: &FilesConfig) -> Result<Vec<GeneratedFile>> {
    let table = SourceTable::read(&files.source, files.delimiter)?;
    info(&format!(
        "read {} data rows from {}",
        table.rows.len(),
        files.source.display()
    ));

    let mut generated = Vec::new();
    for kind in LookupKind::ALL {
        let names = unique_names(&extract(&table, kind)?);
        let path = kind.file(files).to_path_buf();
        write_rows(&path, names.iter().map(|n| [n]), files.delimiter)?;
        debug(&format!("wrote {} {} names to {}", names.len(), kind.table(), path.display()));
        generated.push(GeneratedFile {
            kind,
            path,
            count: names.len(),
        });
    }

    for file in &generated {
        if !file.path.is_file() {
            anyhow::bail!("could not generate {}, aborting", file.path.display());
        }
    }
    Ok(generated)
}

/// Statements the operator runs before `import`.
pub fn copy_instructions(files: &FilesConfig) -> Vec<String> {
    [LookupKind::Neighborhood, LookupKind::Category]
        .iter()
        .map(|kind| {
            format!(
                "COPY {}(nombre) from '{}'",
                kind.table(),
                kind.file(files).display()
            )
        })
        .collect()
}

/// Names previously written by [`generate_lookup_files`].
pub fn read_lookup_file(path: &Path, delimiter: char) -> Result<Vec<String>> {
    let rows = read_rows(path, delimiter)?;
    Ok(rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .collect())
}
