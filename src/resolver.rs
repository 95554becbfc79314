use anyhow::Result;
use clap::ValueEnum;
use serde::Deserialize;
use std::collections::HashMap;

use crate::db::Store;
use crate::logger::{info, warn};
use crate::lookup::LookupKind;

/// How category and neighborhood names are turned into ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResolveMode {
    /// Read both lookup tables once up front.
    #[default]
    Preload,
    /// Query the store for every name of every row.
    #[serde(alias = "per-row")]
    PerRow,
}

pub trait IdResolver {
    fn resolve(&mut self, kind: LookupKind, name: &str) -> Result<Option<i64>>;

    fn category_id(&mut self, name: &str) -> Result<Option<i64>> {
        self.resolve(LookupKind::Category, name)
    }

    fn neighborhood_id(&mut self, name: &str) -> Result<Option<i64>> {
        self.resolve(LookupKind::Neighborhood, name)
    }
}

/// In-memory `nombre -> id` maps for both lookup tables.
#[derive(Debug, Clone, Default)]
pub struct PreloadedIds {
    ids: HashMap<LookupKind, HashMap<String, i64>>,
}

impl PreloadedIds {
    pub fn load(store: &mut dyn Store) -> Result<Self> {
        let mut ids = HashMap::new();
        for kind in LookupKind::ALL {
            let table = store.lookup_ids(kind)?;
            if table.is_empty() {
                warn(&format!(
                    "{} is empty; was it loaded before importing?",
                    kind.table()
                ));
            }
            info(&format!("preloaded {} {} ids", table.len(), kind.table()));
            ids.insert(kind, table);
        }
        Ok(Self { ids })
    }

    pub fn len(&self, kind: LookupKind) -> usize {
        self.ids.get(&kind).map_or(0, HashMap::len)
    }

    /// Lookup tables that held no rows when loaded.
    pub fn empty_tables(&self) -> Vec<LookupKind> {
        LookupKind::ALL
            .into_iter()
            .filter(|&kind| self.len(kind) == 0)
            .collect()
    }
}

impl IdResolver for PreloadedIds {
    fn resolve(&mut self, kind: LookupKind, name: &str) -> Result<Option<i64>> {
        Ok(self.ids.get(&kind).and_then(|t| t.get(name)).copied())
    }
}

/// One store query per lookup, reusing the store's connection.
pub struct StoreLookup<'a> {
    store: &'a mut dyn Store,
}

impl<'a> StoreLookup<'a> {
    pub fn new(store: &'a mut dyn Store) -> Self {
        Self { store }
    }
}

impl IdResolver for StoreLookup<'_> {
    fn resolve(&mut self, kind: LookupKind, name: &str) -> Result<Option<i64>> {
        self.store.find_id(kind, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Sqlite;

    fn seeded() -> Sqlite {
        let mut db = Sqlite::open_in_memory_with_schema().unwrap();
        db.bulk_load(LookupKind::Category, &["Hotel".to_string(), "Hostel".to_string()])
            .unwrap();
        db.bulk_load(LookupKind::Neighborhood, &["Centro".to_string()])
            .unwrap();
        db
    }

    #[test]
    fn preloaded_and_per_row_agree() {
        let mut db = seeded();
        let mut preloaded = PreloadedIds::load(&mut db).unwrap();
        assert_eq!(preloaded.len(LookupKind::Category), 2);
        assert_eq!(preloaded.len(LookupKind::Neighborhood), 1);

        let expected = [
            preloaded.category_id("Hotel").unwrap(),
            preloaded.category_id("Hostel").unwrap(),
            preloaded.category_id("Camping").unwrap(),
            preloaded.neighborhood_id("Centro").unwrap(),
            preloaded.neighborhood_id("Hotel").unwrap(),
        ];
        assert!(expected[0].is_some());
        assert_eq!(expected[2], None);
        assert_eq!(expected[4], None);

        let mut per_row = StoreLookup::new(&mut db);
        let actual = [
            per_row.category_id("Hotel").unwrap(),
            per_row.category_id("Hostel").unwrap(),
            per_row.category_id("Camping").unwrap(),
            per_row.neighborhood_id("Centro").unwrap(),
            per_row.neighborhood_id("Hotel").unwrap(),
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn resolve_mode_accepts_both_spellings() {
        let a: ResolveMode = serde_yaml::from_str("per_row").unwrap();
        let b: ResolveMode = serde_yaml::from_str("per-row").unwrap();
        assert_eq!(a, ResolveMode::PerRow);
        assert_eq!(b, ResolveMode::PerRow);
    }
}
