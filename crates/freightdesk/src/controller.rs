//! Master controller.
//!
//! Holds the active kind, the view mode, the last fetched dataset, the lookup
//! cache and the record under edit. Gateway calls are split into a request
//! (built while borrowing the controller), a run (which only needs the
//! gateway) and an apply/finish step that commits the outcome. Loads carry a
//! generation and sequence number so a result that arrives after the user has
//! moved on is dropped instead of overwriting newer state.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::form::{self, FormData, FormView};
use crate::gateway::TableGateway;
use crate::kind::MasterKind;
use crate::list::ListView;
use crate::lookup::{self, LookupCache};
use crate::record::{MasterPayload, MasterRecord};
use crate::schema::{FieldDef, SchemaDescriptor, SchemaRegistry};

/// What the controller is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// The dataset table.
    Listing,
    /// A form; `None` creates a record, `Some` edits the given one.
    Editing(Option<MasterRecord>),
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Editing(_) => "editing",
        }
    }
}

/// A user-facing alert left behind by a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Text to show.
    pub message: String,
}

impl Notice {
    fn from_error(err: &Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    /// Return `true` to proceed.
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Whether a load outcome was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// The dataset and lookups were replaced.
    Applied,
    /// The outcome was stale and dropped.
    Discarded,
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    /// The record was removed.
    Deleted,
    /// The user declined; nothing was sent.
    Declined,
}

/// A pending fetch of a kind's dataset and its lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRequest {
    kind: MasterKind,
    generation: u64,
    seq: u64,
}

impl LoadRequest {
    /// Kind being loaded.
    #[must_use]
    pub fn kind(&self) -> MasterKind {
        self.kind
    }

    /// Fetch the dataset, then every dependency list.
    pub async fn run(self, gateway: &dyn TableGateway) -> LoadOutcome {
        LoadOutcome {
            kind: self.kind,
            generation: self.generation,
            seq: self.seq,
            result: fetch(self.kind, gateway).await,
        }
    }
}

async fn fetch(
    kind: MasterKind,
    gateway: &dyn TableGateway,
) -> Result<(Vec<MasterRecord>, LookupCache)> {
    let records = gateway.list(kind).await?;
    let mut lookups = LookupCache::new();
    for &dependency in lookup::dependencies_for(kind) {
        lookups.insert(dependency, gateway.list(dependency).await?);
    }
    Ok((records, lookups))
}

/// A finished load, ready to be applied.
#[derive(Debug)]
pub struct LoadOutcome {
    kind: MasterKind,
    generation: u64,
    seq: u64,
    result: Result<(Vec<MasterRecord>, LookupCache)>,
}

/// A validated create or update, ready to send.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    kind: MasterKind,
    target: Option<String>,
    payload: MasterPayload,
}

impl SaveRequest {
    /// Id being updated, `None` for a create.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Body that will be sent.
    #[must_use]
    pub fn payload(&self) -> &MasterPayload {
        &self.payload
    }

    /// Send the create or update.
    pub async fn run(self, gateway: &dyn TableGateway) -> SaveOutcome {
        let result = match &self.target {
            None => gateway.create(self.kind, &self.payload).await,
            Some(id) => gateway.update(self.kind, id, &self.payload).await,
        };
        SaveOutcome { result }
    }
}

/// Result of a sent save.
#[derive(Debug)]
pub struct SaveOutcome {
    result: Result<MasterRecord>,
}

/// A confirmed delete, ready to send.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    kind: MasterKind,
    id: String,
}

impl DeleteRequest {
    /// Send the delete.
    pub async fn run(self, gateway: &dyn TableGateway) -> DeleteOutcome {
        DeleteOutcome {
            result: gateway.delete(self.kind, &self.id).await,
        }
    }
}

/// Result of a sent delete.
#[derive(Debug)]
pub struct DeleteOutcome {
    result: Result<()>,
}

/// Orchestrates schema, gateway, lookups and views for one kind at a time.
pub struct MasterController {
    gateway: Arc<dyn TableGateway>,
    kind: MasterKind,
    schema: SchemaDescriptor,
    mode: Mode,
    records: Vec<MasterRecord>,
    lookups: LookupCache,
    draft: Option<FormData>,
    notice: Option<Notice>,
    in_flight: bool,
    generation: u64,
    next_seq: u64,
    applied_seq: u64,
}

impl fmt::Debug for MasterController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterController")
            .field("backend", &self.gateway.backend_name())
            .field("kind", &self.kind)
            .field("mode", &self.mode.name())
            .field("records", &self.records.len())
            .field("in_flight", &self.in_flight)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl MasterController {
    /// A controller listing the first kind, with nothing fetched yet.
    #[must_use]
    pub fn new(gateway: Arc<dyn TableGateway>) -> Self {
        let kind = MasterKind::first();
        Self {
            gateway,
            kind,
            schema: SchemaRegistry::get(kind),
            mode: Mode::Listing,
            records: Vec::new(),
            lookups: LookupCache::new(),
            draft: None,
            notice: None,
            in_flight: false,
            generation: 0,
            next_seq: 0,
            applied_seq: 0,
        }
    }

    /// A controller with the first kind already loaded.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial load fails.
    pub async fn open(gateway: Arc<dyn TableGateway>) -> Result<Self> {
        let mut controller = Self::new(gateway);
        controller.refresh().await?;
        Ok(controller)
    }

    /// The gateway mutations go through.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn TableGateway> {
        &self.gateway
    }

    /// Active kind.
    #[must_use]
    pub fn kind(&self) -> MasterKind {
        self.kind
    }

    /// Schema of the active kind.
    #[must_use]
    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// Current view.
    #[must_use]
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// Last fetched dataset.
    #[must_use]
    pub fn records(&self) -> &[MasterRecord] {
        &self.records
    }

    /// Last fetched lookup lists.
    #[must_use]
    pub fn lookups(&self) -> &LookupCache {
        &self.lookups
    }

    /// Whether a mutation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Alert left by the last failed operation.
    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Clear the alert.
    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Table of the current dataset.
    #[must_use]
    pub fn list_view(&self) -> ListView {
        ListView::new(&self.schema, &self.records)
    }

    /// Form fields of the active kind with select options filled in.
    #[must_use]
    pub fn resolved_fields(&self) -> Vec<FieldDef> {
        lookup::resolve(self.kind, &self.schema.fields, &self.lookups)
    }

    /// Switch to `kind`: back to the list, edits dropped, data and lookups
    /// cleared. Loads started before the switch are discarded on apply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while a mutation is in flight.
    pub fn select_kind(&mut self, kind: MasterKind) -> Result<LoadRequest> {
        self.ensure_idle()?;
        debug!("Switching from {} to {}", self.kind, kind);
        self.kind = kind;
        self.schema = SchemaRegistry::get(kind);
        self.mode = Mode::Listing;
        self.draft = None;
        self.notice = None;
        self.records.clear();
        self.lookups = LookupCache::new();
        self.generation += 1;
        Ok(self.load_request())
    }

    /// A reload of the active kind.
    pub fn load_request(&mut self) -> LoadRequest {
        self.next_seq += 1;
        LoadRequest {
            kind: self.kind,
            generation: self.generation,
            seq: self.next_seq,
        }
    }

    /// Commit a finished load unless a newer selection or load superseded it.
    ///
    /// # Errors
    ///
    /// Returns the fetch error of a current load; the dataset is left as it was.
    pub fn apply_load(&mut self, outcome: LoadOutcome) -> Result<LoadStatus> {
        if outcome.kind != self.kind
            || outcome.generation != self.generation
            || outcome.seq <= self.applied_seq
        {
            debug!(
                "Discarding stale {} load (generation {}, seq {})",
                outcome.kind, outcome.generation, outcome.seq
            );
            return Ok(LoadStatus::Discarded);
        }
        self.applied_seq = outcome.seq;

        match outcome.result {
            Ok((records, lookups)) => {
                debug!("Loaded {} {} records", records.len(), self.kind);
                self.records = records;
                self.lookups = lookups;
                Ok(LoadStatus::Applied)
            }
            Err(err) => Err(self.surface(err)),
        }
    }

    /// Reload the active kind and apply the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails.
    pub async fn refresh(&mut self) -> Result<LoadStatus> {
        let request = self.load_request();
        let gateway = Arc::clone(&self.gateway);
        let outcome = request.run(gateway.as_ref()).await;
        self.apply_load(outcome)
    }

    /// Switch to `kind` and load it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while a mutation is in flight, or the fetch error.
    pub async fn select(&mut self, kind: MasterKind) -> Result<LoadStatus> {
        let request = self.select_kind(kind)?;
        let gateway = Arc::clone(&self.gateway);
        let outcome = request.run(gateway.as_ref()).await;
        self.apply_load(outcome)
    }

    /// Open a blank form for a new record.
    ///
    /// # Errors
    ///
    /// Returns an error unless listing and idle.
    pub fn begin_create(&mut self) -> Result<()> {
        self.ensure_listing("create")?;
        self.ensure_idle()?;
        debug!("Creating a new {}", self.kind.singular());
        self.mode = Mode::Editing(None);
        self.draft = None;
        Ok(())
    }

    /// Open a form seeded from `record`.
    ///
    /// # Errors
    ///
    /// Returns an error unless listing and idle, or if `record` is of another kind.
    pub fn begin_edit(&mut self, record: MasterRecord) -> Result<()> {
        self.ensure_listing("edit")?;
        self.ensure_idle()?;
        if record.kind() != self.kind {
            return Err(Error::KindMismatch {
                expected: self.kind,
                found: record.kind(),
            });
        }
        debug!("Editing {} {}", self.kind.singular(), record.id);
        self.mode = Mode::Editing(Some(record));
        self.draft = None;
        Ok(())
    }

    /// Edit the record with `id` from the current dataset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the dataset has no such record.
    pub fn begin_edit_id(&mut self, id: &str) -> Result<()> {
        let record = self
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(self.kind, id))?;
        self.begin_edit(record)
    }

    /// Leave the form, dropping any edits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Busy`] while a save is in flight.
    pub fn cancel(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.mode = Mode::Listing;
        self.draft = None;
        Ok(())
    }

    /// The open form, if editing.
    ///
    /// Values come from the last submitted draft, else the record under edit,
    /// else blanks.
    #[must_use]
    pub fn form(&self) -> Option<FormView> {
        let Mode::Editing(existing) = &self.mode else {
            return None;
        };
        let mut data = FormData::blank(&self.schema);
        let title = match existing {
            None => format!("Add {}", self.schema.label),
            Some(record) => {
                data.merge(FormData::from_record(record));
                format!("Edit {}", self.schema.label)
            }
        };
        if let Some(draft) = &self.draft {
            data.merge(draft.clone());
        }
        Some(FormView::new(title, self.resolved_fields(), data))
    }

    /// Validate `data` and lock the view for sending it.
    ///
    /// The submitted values are kept as the form's draft either way; a
    /// validation failure never reaches the gateway.
    ///
    /// # Errors
    ///
    /// Returns an error unless editing and idle, or if validation fails.
    pub fn begin_save(&mut self, data: FormData) -> Result<SaveRequest> {
        let target = match &self.mode {
            Mode::Editing(existing) => existing.as_ref().map(|record| record.id.clone()),
            Mode::Listing => {
                return Err(Error::InvalidTransition {
                    action: "save",
                    state: self.mode.name(),
                })
            }
        };
        self.ensure_idle()?;

        let checked = form::validate(&self.resolved_fields(), &data)
            .and_then(|()| MasterPayload::from_form(self.kind, &data));
        self.draft = Some(data);
        let payload = checked?;

        self.in_flight = true;
        Ok(SaveRequest {
            kind: self.kind,
            target,
            payload,
        })
    }

    /// Unlock the view after a save. Success returns to the list; failure
    /// keeps the form and its values.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub fn finish_save(&mut self, outcome: SaveOutcome) -> Result<MasterRecord> {
        self.in_flight = false;
        match outcome.result {
            Ok(record) => {
                debug!("Saved {} {}", self.kind.singular(), record.id);
                self.mode = Mode::Listing;
                self.draft = None;
                self.notice = None;
                Ok(record)
            }
            Err(err) => Err(self.surface(err)),
        }
    }

    /// Validate, send and commit a save, then reload.
    ///
    /// A failed reload after a committed save leaves a notice and the
    /// previous records; the save itself still reports success.
    ///
    /// # Errors
    ///
    /// Returns the validation or gateway error of the save.
    pub async fn save(&mut self, data: FormData) -> Result<MasterRecord> {
        let request = self.begin_save(data)?;
        let gateway = Arc::clone(&self.gateway);
        let outcome = request.run(gateway.as_ref()).await;
        match self.finish_save(outcome) {
            Ok(record) => {
                self.reload_after_mutation().await;
                Ok(record)
            }
            Err(err) => {
                if err.is_not_found() {
                    self.resync().await;
                }
                Err(err)
            }
        }
    }

    /// Ask for confirmation and lock the view for deleting `id`.
    ///
    /// Returns `None` when the user declines.
    ///
    /// # Errors
    ///
    /// Returns an error unless listing and idle.
    pub fn begin_delete(
        &mut self,
        id: &str,
        confirm: &dyn Confirm,
    ) -> Result<Option<DeleteRequest>> {
        self.ensure_listing("delete")?;
        self.ensure_idle()?;

        let prompt = format!("Are you sure you want to delete this {}?", self.kind.singular());
        if !confirm.confirm(&prompt) {
            debug!("Delete of {} {} declined", self.kind.singular(), id);
            return Ok(None);
        }

        self.in_flight = true;
        Ok(Some(DeleteRequest {
            kind: self.kind,
            id: id.to_string(),
        }))
    }

    /// Unlock the view after a delete.
    ///
    /// # Errors
    ///
    /// Returns the gateway error.
    pub fn finish_delete(&mut self, outcome: DeleteOutcome) -> Result<()> {
        self.in_flight = false;
        outcome.result.map_err(|err| self.surface(err))
    }

    /// Confirm, send and commit a delete, then reload.
    ///
    /// # Errors
    ///
    /// Returns the gateway error of the delete. A missing record still
    /// triggers a reload. A failed reload after a committed delete only
    /// leaves a notice.
    pub async fn delete(&mut self, id: &str, confirm: &dyn Confirm) -> Result<DeleteStatus> {
        let Some(request) = self.begin_delete(id, confirm)? else {
            return Ok(DeleteStatus::Declined);
        };
        let gateway = Arc::clone(&self.gateway);
        let outcome = request.run(gateway.as_ref()).await;
        match self.finish_delete(outcome) {
            Ok(()) => {
                self.reload_after_mutation().await;
                Ok(DeleteStatus::Deleted)
            }
            Err(err) => {
                if err.is_not_found() {
                    self.resync().await;
                }
                Err(err)
            }
        }
    }

    async fn reload_after_mutation(&mut self) {
        if let Err(err) = self.refresh().await {
            warn!("Reload after {} change failed: {err}", self.kind);
        }
    }

    async fn resync(&mut self) {
        let notice = self.notice.take();
        if let Err(err) = self.refresh().await {
            warn!("Reload after missing record failed: {err}");
        }
        self.notice = notice;
    }

    fn surface(&mut self, err: Error) -> Error {
        warn!("{} {} failed: {err}", self.kind, self.mode.name());
        self.notice = Some(Notice::from_error(&err));
        err
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.in_flight {
            Err(Error::Busy)
        } else {
            Ok(())
        }
    }

    fn ensure_listing(&self, action: &'static str) -> Result<()> {
        match self.mode {
            Mode::Listing => Ok(()),
            Mode::Editing(_) => Err(Error::InvalidTransition {
                action,
                state: self.mode.name(),
            }),
        }
    }
}
