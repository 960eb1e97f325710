//! Dependent select options.
//!
//! Resolution is a pure merge: the controller fetches parent records into a
//! [`LookupCache`], then [`resolve`] copies them into the option lists of the
//! matching foreign-key fields.

use std::collections::HashMap;

use crate::kind::MasterKind;
use crate::record::MasterRecord;
use crate::schema::{FieldDef, SelectOption};

/// Most recently fetched records per parent kind.
#[derive(Debug, Clone, Default)]
pub struct LookupCache {
    entries: HashMap<MasterKind, Vec<MasterRecord>>,
}

impl LookupCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the records fetched for `kind`, replacing earlier ones.
    pub fn insert(&mut self, kind: MasterKind, records: Vec<MasterRecord>) {
        self.entries.insert(kind, records);
    }

    /// Records for `kind`, if they have been fetched.
    #[must_use]
    pub fn get(&self, kind: MasterKind) -> Option<&[MasterRecord]> {
        self.entries.get(&kind).map(Vec::as_slice)
    }

    /// Whether `kind` has been fetched.
    #[must_use]
    pub fn contains(&self, kind: MasterKind) -> bool {
        self.entries.contains_key(&kind)
    }

    /// Number of kinds held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been fetched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Kinds that must be fetched to fill the select fields of `kind`.
#[must_use]
pub fn dependencies_for(kind: MasterKind) -> &'static [MasterKind] {
    kind.dependencies()
}

/// Fill the options of every foreign-key field of `kind` from `cache`.
///
/// Fields that are not foreign keys to a dependency of `kind` are returned
/// unchanged, as are foreign-key fields whose parent kind is not cached yet.
#[must_use]
pub fn resolve(kind: MasterKind, fields: &[FieldDef], cache: &LookupCache) -> Vec<FieldDef> {
    let dependencies = dependencies_for(kind);
    fields
        .iter()
        .map(|field| {
            let records = field
                .foreign_kind()
                .filter(|parent| dependencies.contains(parent))
                .and_then(|parent| cache.get(parent));
            match records {
                Some(records) => FieldDef {
                    options: records.iter().map(to_option).collect(),
                    ..field.clone()
                },
                None => field.clone(),
            }
        })
        .collect()
}

fn to_option(record: &MasterRecord) -> SelectOption {
    SelectOption {
        value: record.id.clone(),
        label: record.name().to_string(),
    }
}
