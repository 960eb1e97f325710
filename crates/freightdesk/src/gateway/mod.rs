//! Remote table gateway.
//!
//! One uniform CRUD surface over the collection backing each master kind.
//! Implementations do a single round trip per call, keep no cache, and hand
//! every error back to the caller untouched.

pub mod rest;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BackendKind, Config};
use crate::error::{Error, Result};
use crate::kind::MasterKind;
use crate::record::{MasterPayload, MasterRecord};

pub use rest::RestGateway;
pub use sqlite::SqliteGateway;

/// CRUD access to the collection of any master kind.
#[async_trait]
pub trait TableGateway: Send + Sync {
    /// Short backend name for logs and status output.
    fn backend_name(&self) -> &'static str;

    /// Every record of `kind`, newest first, with the kind's parents embedded.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached or rejects the query.
    async fn list(&self, kind: MasterKind) -> Result<Vec<MasterRecord>>;

    /// Insert `payload`; the backend assigns `id` and timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is for another kind or the insert fails.
    async fn create(&self, kind: MasterKind, payload: &MasterPayload) -> Result<MasterRecord>;

    /// Replace every payload field of record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has `id`.
    async fn update(
        &self,
        kind: MasterKind,
        id: &str,
        payload: &MasterPayload,
    ) -> Result<MasterRecord>;

    /// Remove record `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has `id`.
    async fn delete(&self, kind: MasterKind, id: &str) -> Result<()>;
}

/// Reject a payload addressed to the wrong collection.
///
/// # Errors
///
/// Returns [`Error::KindMismatch`] if `payload` is not of `kind`.
pub fn ensure_kind(kind: MasterKind, payload: &MasterPayload) -> Result<()> {
    if payload.kind() == kind {
        Ok(())
    } else {
        Err(Error::KindMismatch {
            expected: kind,
            found: payload.kind(),
        })
    }
}

/// Build the gateway selected by `config`.
///
/// # Errors
///
/// Returns an error if the backend cannot be set up (bad URL, unopenable database).
pub fn connect(config: &Config) -> Result<Arc<dyn TableGateway>> {
    match config.backend.kind {
        BackendKind::Rest => Ok(Arc::new(RestGateway::from_config(&config.backend)?)),
        BackendKind::Sqlite => Ok(Arc::new(SqliteGateway::open(config.database_path())?)),
    }
}
