//! `SQLite` table definitions for the local backend.
//!
//! Tables mirror the hosted collections: same names, same columns, text ids
//! and RFC 3339 timestamps. Foreign keys are enforced so deleting a parent
//! that is still referenced fails the way the hosted backend does.

/// Key/value table holding the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Countries.
pub const CREATE_COUNTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS master_countries (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// States, each owned by a country.
pub const CREATE_STATES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS master_states (
    id TEXT PRIMARY KEY,
    country_id TEXT NOT NULL REFERENCES master_countries(id),
    name TEXT NOT NULL,
    code TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Cities, optionally owned by a state.
pub const CREATE_CITIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS master_cities (
    id TEXT PRIMARY KEY,
    state_id TEXT REFERENCES master_states(id),
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Transporters, optionally located in a city.
pub const CREATE_TRANSPORTERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS master_transporters (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    contact_person TEXT,
    phone TEXT,
    email TEXT,
    address TEXT,
    city_id TEXT REFERENCES master_cities(id),
    gstin TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Newest-first listing indexes.
pub const CREATE_CREATED_AT_INDEXES: &str = r"
CREATE INDEX IF NOT EXISTS idx_countries_created ON master_countries(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_states_created ON master_states(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_cities_created ON master_cities(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_transporters_created ON master_transporters(created_at DESC);
";

/// Every table, parents before children.
pub const TABLE_STATEMENTS: &[&str] = &[
    CREATE_COUNTRIES_TABLE,
    CREATE_STATES_TABLE,
    CREATE_CITIES_TABLE,
    CREATE_TRANSPORTERS_TABLE,
];
