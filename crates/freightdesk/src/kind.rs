//! Master data kinds and the static dependency table between them.
//!
//! The table below is the single place that knows how kinds relate: the
//! gateways read it to decide which parents to embed into list results, and
//! the lookup resolver reads it to decide which parents populate select
//! fields. Adding a kind means adding a row here and a descriptor in
//! [`crate::schema::SchemaRegistry`].

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A category of reference data.
///
/// Also the kind argument of the CLI; its value names are the slugs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum MasterKind {
    /// Countries.
    Countries,
    /// States, each belonging to a country.
    States,
    /// Cities, optionally belonging to a state.
    Cities,
    /// Transporters, optionally located in a city.
    Transporters,
}

struct KindSpec {
    slug: &'static str,
    singular: &'static str,
    dependencies: &'static [MasterKind],
    join_depth: u8,
}

/// Indexed by `MasterKind as usize`; order must match the enum.
static KIND_TABLE: [KindSpec; 4] = [
    KindSpec {
        slug: "countries",
        singular: "country",
        dependencies: &[],
        join_depth: 0,
    },
    KindSpec {
        slug: "states",
        singular: "state",
        dependencies: &[MasterKind::Countries],
        join_depth: 1,
    },
    KindSpec {
        slug: "cities",
        singular: "city",
        dependencies: &[MasterKind::States],
        join_depth: 2,
    },
    KindSpec {
        slug: "transporters",
        singular: "transporter",
        dependencies: &[MasterKind::Cities],
        join_depth: 1,
    },
];

/// A parent collection embedded into list results, projected to its `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// The parent kind being embedded.
    pub parent: MasterKind,
    /// Grandparents embedded inside the parent.
    pub nested: Vec<Join>,
}

impl Join {
    /// Key under which the parent appears in a joined row (`country`, `state`).
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.parent.singular()
    }
}

impl MasterKind {
    /// Every kind, in declaration order. The first one is the initial tab.
    pub const ALL: [MasterKind; 4] = [
        MasterKind::Countries,
        MasterKind::States,
        MasterKind::Cities,
        MasterKind::Transporters,
    ];

    fn spec(self) -> &'static KindSpec {
        &KIND_TABLE[self as usize]
    }

    /// The first declared kind.
    #[must_use]
    pub fn first() -> Self {
        Self::ALL[0]
    }

    /// Plural slug, e.g. `countries`.
    #[must_use]
    pub fn slug(self) -> &'static str {
        self.spec().slug
    }

    /// Singular noun, e.g. `country`.
    #[must_use]
    pub fn singular(self) -> &'static str {
        self.spec().singular
    }

    /// Name of the backing collection, e.g. `master_countries`.
    #[must_use]
    pub fn collection(self) -> String {
        format!("master_{}", self.slug())
    }

    /// Name of a foreign-key field pointing at this kind, e.g. `country_id`.
    #[must_use]
    pub fn foreign_key(self) -> String {
        format!("{}_id", self.singular())
    }

    /// Kinds whose records populate this kind's select fields.
    #[must_use]
    pub fn dependencies(self) -> &'static [MasterKind] {
        self.spec().dependencies
    }

    /// How many levels of parents `list` embeds for this kind.
    #[must_use]
    pub fn join_depth(self) -> u8 {
        self.spec().join_depth
    }

    /// The join tree `list` embeds for this kind.
    #[must_use]
    pub fn joins(self) -> Vec<Join> {
        self.joins_to_depth(self.join_depth())
    }

    fn joins_to_depth(self, depth: u8) -> Vec<Join> {
        if depth == 0 {
            return Vec::new();
        }
        self.dependencies()
            .iter()
            .map(|&parent| Join {
                parent,
                nested: parent.joins_to_depth(depth - 1),
            })
            .collect()
    }

    /// Look a kind up by its singular noun (`state` → `States`).
    #[must_use]
    pub fn from_singular(singular: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.singular() == singular)
    }
}

impl fmt::Display for MasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for MasterKind {
    type Err = Error;

    /// Accepts the slug, the singular noun, or the collection name, ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let wanted = lowered.strip_prefix("master_").unwrap_or(lowered.as_str());
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == wanted || kind.singular() == wanted)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}
