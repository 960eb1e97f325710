//! `freightdesk` - Master-data console for transport and logistics administration
//!
//! This library keeps the reference data of a transport business (countries,
//! states, cities and transporters) in a hosted PostgREST table backend or a
//! local `SQLite` file. A declarative schema per kind drives generic list and
//! form views; select fields are filled from the parent kinds each kind
//! depends on.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod form;
pub mod gateway;
pub mod kind;
pub mod list;
pub mod logging;
pub mod lookup;
pub mod record;
pub mod schema;

pub use config::Config;
pub use controller::MasterController;
pub use error::{Error, Result};
pub use gateway::{RestGateway, SqliteGateway, TableGateway};
pub use kind::MasterKind;
pub use logging::init_logging;
pub use record::{MasterPayload, MasterRecord};
pub use schema::{SchemaDescriptor, SchemaRegistry};
