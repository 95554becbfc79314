use anyhow::Result;

use crate::config::ImportConfig;
use crate::db::{InsertSummary, Store};
use crate::logger::{debug, info};
use crate::lookup::LookupKind;
use crate::record::{EstablishmentRecord, SourceRow, SourceTable};
use crate::resolver::{IdResolver, PreloadedIds, ResolveMode, StoreLookup};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub rows: usize,
    pub unresolved_categories: usize,
    pub unresolved_neighborhoods: usize,
    /// Preloaded lookup tables that were empty, usually a skipped COPY step.
    pub empty_lookups: Vec<LookupKind>,
    pub summary: InsertSummary,
}

#[derive(Debug, Default)]
struct Resolved {
    records: Vec<EstablishmentRecord>,
    unresolved_categories: usize,
    unresolved_neighborhoods: usize,
}

/// Swap names for ids. A name with no match becomes `None`, never an error.
fn resolve_rows(rows: Vec<SourceRow>, resolver: &mut dyn IdResolver) -> Result<Resolved> {
    let mut resolved = Resolved::default();
    for row in rows {
        let id_categoria = resolver.category_id(&row.categoria)?;
        if id_categoria.is_none() {
            debug(&format!("line {}: unknown categoria {:?}", row.line, row.categoria));
            resolved.unresolved_categories += 1;
        }
        let id_barrio = resolver.neighborhood_id(&row.barrio)?;
        if id_barrio.is_none() {
            debug(&format!("line {}: unknown barrio {:?}", row.line, row.barrio));
            resolved.unresolved_neighborhoods += 1;
        }
        resolved.records.push(row.into_record(id_categoria, id_barrio));
    }
    Ok(resolved)
}

/// Parse, resolve and insert every data row of `table`.
///
/// Every row is parsed before the store is touched, so a malformed number
/// aborts the import with nothing written.
pub fn import_establishments(
    store: &mut dyn Store,
    table: &SourceTable,
    options: &ImportConfig,
) -> Result<ImportReport> {
    let rows = table.parse_rows()?;
    let count = rows.len();
    info(&format!("parsed {} establishments", count));

    let mut empty_lookups = Vec::new();
    let resolved = match options.resolve {
        ResolveMode::Preload => {
            let mut ids = PreloadedIds::load(store)?;
            debug(&format!(
                "resolving against {} categorias and {} barrios",
                ids.len(LookupKind::Category),
                ids.len(LookupKind::Neighborhood)
            ));
            empty_lookups = ids.empty_tables();
            resolve_rows(rows, &mut ids)?
        }
        ResolveMode::PerRow => resolve_rows(rows, &mut StoreLookup::new(store))?,
    };

    let summary = store.insert_establishments(&resolved.records, options.on_error)?;
    info(&format!(
        "inserted {} establishments, skipped {}",
        summary.inserted,
        summary.skipped.len()
    ));

    Ok(ImportReport {
        rows: count,
        unresolved_categories: resolved.unresolved_categories,
        unresolved_neighborhoods: resolved.unresolved_neighborhoods,
        empty_lookups,
        summary,
    })
}
